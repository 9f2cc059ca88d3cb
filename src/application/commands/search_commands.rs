//! Search Commands - 检索任务相关命令

use crate::domain::search::SearchRequest;
use crate::domain::task::{TaskId, TaskStatus};

/// 提交检索命令
#[derive(Debug, Clone)]
pub struct SubmitSearch {
    pub request: SearchRequest,
}

/// 提交检索响应
#[derive(Debug, Clone)]
pub struct SubmitSearchResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// 取消任务命令
#[derive(Debug, Clone)]
pub struct CancelTask {
    pub task_id: TaskId,
}

/// 取消任务响应
#[derive(Debug, Clone)]
pub struct CancelTaskResponse {
    pub task_id: TaskId,
    /// 发出取消信号时的任务状态
    pub status: TaskStatus,
}

/// 恢复未完成任务命令（启动时执行）
#[derive(Debug, Clone, Default)]
pub struct ResumeTasks;

/// 恢复任务响应
#[derive(Debug, Clone)]
pub struct ResumeTasksResponse {
    pub task_ids: Vec<TaskId>,
}
