//! 应用层错误定义
//!
//! 统一的命令/查询错误类型，只有校验与持久化错误会传到调用方

use thiserror::Error;

use crate::application::ports::{RepositoryError, TaskManagerError};
use crate::domain::search::RequestValidationError;
use crate::domain::task::TaskError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 请求校验失败
    #[error("Validation error: {0}")]
    ValidationError(#[from] RequestValidationError),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 持久化失败（已用尽重试）
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// 任务队列不可用
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

impl From<TaskManagerError> for ApplicationError {
    fn from(err: TaskManagerError) -> Self {
        match err {
            TaskManagerError::NotFound(id) => Self::not_found("Task", id),
            TaskManagerError::QueueClosed => Self::QueueUnavailable(err.to_string()),
            TaskManagerError::AlreadyExists(_) | TaskManagerError::Domain(_) => {
                Self::InvalidState(err.to_string())
            }
        }
    }
}
