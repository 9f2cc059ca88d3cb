//! Dispatch - 子任务并发执行
//!
//! 包含：
//! - worker_pool: 进程级并发上限
//! - task_saver: 带重试的任务保存
//! - dispatcher: 扇出、超时、重试、期限与取消

mod dispatcher;
mod task_saver;
mod worker_pool;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use task_saver::TaskSaver;
pub use worker_pool::WorkerPool;
