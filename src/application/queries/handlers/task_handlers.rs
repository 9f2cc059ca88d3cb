//! Task Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{BotRoster, TaskManagerPort, TaskRepositoryPort};
use crate::application::queries::{GetTaskStatus, ListDatabases};
use crate::domain::search::DatabaseId;
use crate::domain::task::Task;

// ============================================================================
// Response DTOs
// ============================================================================

/// 已注册数据库信息
#[derive(Debug, Clone)]
pub struct DatabaseInfo {
    pub id: DatabaseId,
    pub name: &'static str,
    pub adapter: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetTaskStatus Handler
///
/// 优先读取内存中的执行快照，其次读取持久化副本
pub struct GetTaskStatusHandler {
    task_manager: Arc<dyn TaskManagerPort>,
    repository: Arc<dyn TaskRepositoryPort>,
}

impl GetTaskStatusHandler {
    pub fn new(
        task_manager: Arc<dyn TaskManagerPort>,
        repository: Arc<dyn TaskRepositoryPort>,
    ) -> Self {
        Self {
            task_manager,
            repository,
        }
    }

    pub async fn handle(&self, query: GetTaskStatus) -> Result<Task, ApplicationError> {
        if let Some(task) = self.task_manager.get_task(&query.task_id) {
            return Ok(task);
        }

        self.repository
            .load(&query.task_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Task", query.task_id.as_str()))
    }
}

/// ListDatabases Handler
pub struct ListDatabasesHandler {
    roster: BotRoster,
}

impl ListDatabasesHandler {
    pub fn new(roster: BotRoster) -> Self {
        Self { roster }
    }

    pub fn handle(&self, _query: ListDatabases) -> Vec<DatabaseInfo> {
        self.roster
            .databases()
            .into_iter()
            .map(|id| DatabaseInfo {
                id,
                name: id.display_name(),
                adapter: self.roster.adapter_name(id).unwrap_or_default(),
            })
            .collect()
    }
}
