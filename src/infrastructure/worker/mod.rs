//! Worker Layer - Background Task Processing
//!
//! 实现 SearchWorker，消费检索任务队列

mod search_worker;

pub use search_worker::{SearchWorker, SearchWorkerConfig};
