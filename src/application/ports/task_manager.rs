//! Task Manager Port - 检索任务管理
//!
//! 定义执行中任务的内存管理接口，具体实现在 infrastructure/memory 层

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::task::{Task, TaskError, TaskId};

/// Task Manager 错误
#[derive(Debug, Error)]
pub enum TaskManagerError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Task queue closed")]
    QueueClosed,

    #[error(transparent)]
    Domain(#[from] TaskError),
}

/// Task Manager Port
///
/// 单写多读：对同一任务的修改被串行化，读取者获得克隆快照
#[async_trait]
pub trait TaskManagerPort: Send + Sync {
    /// 登记任务并放入工作队列
    ///
    /// 队列满时等待（背压），队列关闭时撤销登记
    async fn submit(&self, task: Task) -> Result<TaskId, TaskManagerError>;

    /// 获取任务快照
    fn get_task(&self, task_id: &TaskId) -> Option<Task>;

    /// 在持有该任务写锁的情况下修改任务，返回修改后的快照
    ///
    /// 闭包返回错误时任务保持修改前的状态
    fn update(
        &self,
        task_id: &TaskId,
        f: &mut dyn FnMut(&mut Task) -> Result<(), TaskError>,
    ) -> Result<Task, TaskManagerError>;

    /// 触发任务的取消信号，返回任务是否存在
    fn cancel(&self, task_id: &TaskId) -> bool;

    /// 获取任务的取消令牌
    fn cancellation_token(&self, task_id: &TaskId) -> Option<CancellationToken>;

    /// 任务是否已被所有者取消
    fn is_cancelled(&self, task_id: &TaskId) -> bool {
        self.cancellation_token(task_id)
            .map(|token| token.is_cancelled())
            .unwrap_or(false)
    }

    /// 移除任务（已持久化终态后调用）
    fn remove(&self, task_id: &TaskId);

    /// 内存中的任务数
    fn active_count(&self) -> usize;
}
