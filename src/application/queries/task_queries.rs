//! Task Queries

use crate::domain::task::TaskId;

/// 获取任务状态查询
#[derive(Debug, Clone)]
pub struct GetTaskStatus {
    pub task_id: TaskId,
}

/// 列出已注册数据库查询
#[derive(Debug, Clone)]
pub struct ListDatabases;
