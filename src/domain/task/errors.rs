//! Task Context - Errors

use thiserror::Error;

use super::{SubTaskStatus, TaskStatus};
use crate::domain::search::DatabaseId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("非法的任务状态转换: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("任务未在执行中: {0}")]
    NotRunning(TaskStatus),

    #[error("子任务不存在: {0}")]
    UnknownSubTask(DatabaseId),

    #[error("子任务 {database} 已结束 ({status})")]
    SubTaskAlreadySettled {
        database: DatabaseId,
        status: SubTaskStatus,
    },

    #[error("子任务尚未结束: {0}")]
    SubTaskNotSettled(DatabaseId),
}
