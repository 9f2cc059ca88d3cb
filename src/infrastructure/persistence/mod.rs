//! Persistence Layer - 数据持久化
//!
//! SQLite（任务记录）和 Sled（结果 outbox）存储实现

pub mod sled;
pub mod sqlite;

pub use self::sled::{OutboxEntry, SledOutboxConfig, SledResultOutbox};
pub use self::sqlite::SqliteTaskRepository;
