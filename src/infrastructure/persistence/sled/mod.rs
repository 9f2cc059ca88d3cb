//! Sled Persistence - Sled 嵌入式存储实现

mod result_outbox;

pub use result_outbox::{OutboxEntry, SledOutboxConfig, SledResultOutbox};
