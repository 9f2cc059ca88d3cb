//! Result Publisher Port - 检索结果交付
//!
//! 任务完成后把合并结果交给下游（文档抽取、索引等）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::TaskId;
use crate::domain::AggregatedResult;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// 发布结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    /// 新写入
    Published,
    /// 相同结果已存在，忽略
    Duplicate,
}

#[async_trait]
pub trait ResultPublisherPort: Send + Sync {
    /// 发布任务结果
    async fn publish(
        &self,
        task_id: &TaskId,
        result: &AggregatedResult,
    ) -> Result<PublishStatus, PublishError>;
}
