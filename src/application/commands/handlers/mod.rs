//! Command Handlers 实现
//!
//! 所有 CommandHandler 的具体实现

mod search_command_handlers;

pub use search_command_handlers::*;
