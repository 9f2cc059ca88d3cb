//! Memory Layer - In-Memory State Management
//!
//! 实现 TaskManager，管理执行中检索任务的内存状态、取消令牌与工作队列

mod task_manager;

pub use task_manager::InMemoryTaskManager;
