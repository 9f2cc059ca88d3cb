//! Task Repository Port - 检索任务持久化
//!
//! 具体实现在 infrastructure/persistence 层（SQLite）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::{Task, TaskId};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[async_trait]
pub trait TaskRepositoryPort: Send + Sync {
    /// 保存任务（存在则覆盖）
    async fn save(&self, task: &Task) -> Result<(), RepositoryError>;

    /// 根据 ID 加载任务
    async fn load(&self, task_id: &TaskId) -> Result<Option<Task>, RepositoryError>;

    /// 查找所有未到终态的任务（按创建时间排序）
    async fn find_unfinished(&self) -> Result<Vec<Task>, RepositoryError>;
}
