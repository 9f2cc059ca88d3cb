//! Bot Adapters - 检索机器人实现

mod fake_bot_adapter;
mod http_bot_adapter;

pub use fake_bot_adapter::{FakeBotAdapter, FakeStep};
pub use http_bot_adapter::*;
