//! Task Context - 检索任务限界上下文
//!
//! 职责:
//! - 任务聚合与状态机
//! - 子任务实体
//! - 失败与取消语义

mod aggregate;
mod entities;
mod errors;
mod status;
mod value_objects;

pub use aggregate::{DispatchReport, FailureReason, Task, TaskFailure};
pub use entities::{SubTask, SubTaskError, SubTaskErrorKind, SubTaskOutcome};
pub use errors::TaskError;
pub use status::{SubTaskStatus, TaskStatus};
pub use value_objects::TaskId;
