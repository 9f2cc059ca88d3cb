//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::DatabaseInfo;
use crate::domain::aggregation::{AggregatedResult, AggregationStats, DatabaseSummary, ResultOutcome};
use crate::domain::patent::PatentRecord;
use crate::domain::search::DatabaseId;
use crate::domain::task::{SubTask, Task, TaskFailure};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Search DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TaskIdRequest {
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitSearchResponseDto {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CancelTaskResponseDto {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SubTaskDto {
    pub database: DatabaseId,
    pub status: String,
    pub attempts: u32,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl From<&SubTask> for SubTaskDto {
    fn from(sub_task: &SubTask) -> Self {
        Self {
            database: sub_task.database_id(),
            status: sub_task.status().as_str().to_string(),
            attempts: sub_task.attempts(),
            records: sub_task.raw_results().len(),
            error: sub_task.error().map(|e| e.to_string()),
            started_at: sub_task.started_at().map(|t| t.to_rfc3339()),
            finished_at: sub_task.finished_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResultDto {
    pub outcome: ResultOutcome,
    pub partial: bool,
    pub total: usize,
    pub records: Vec<PatentRecord>,
    pub database_summary: BTreeMap<DatabaseId, DatabaseSummary>,
    pub stats: AggregationStats,
}

impl From<&AggregatedResult> for SearchResultDto {
    fn from(result: &AggregatedResult) -> Self {
        Self {
            outcome: result.outcome(),
            partial: result.partial,
            total: result.records.len(),
            records: result.records.clone(),
            database_summary: result.database_summary.clone(),
            stats: result.stats.clone(),
        }
    }
}

/// 任务快照
#[derive(Debug, Serialize)]
pub struct TaskStatusDto {
    pub task_id: String,
    pub status: String,
    pub progress: u8,
    pub databases: Vec<DatabaseId>,
    pub sub_tasks: Vec<SubTaskDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SearchResultDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 快照未能持久化
    pub stale: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<&Task> for TaskStatusDto {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id().to_string(),
            status: task.status().as_str().to_string(),
            progress: task.progress(),
            databases: task.request().databases.iter().copied().collect(),
            sub_tasks: task.sub_tasks().values().map(SubTaskDto::from).collect(),
            result: task.result().map(SearchResultDto::from),
            error: task.error().cloned(),
            message: task.message().map(str::to_string),
            stale: task.persist_error().is_some(),
            created_at: task.created_at().to_rfc3339(),
            updated_at: task.updated_at().to_rfc3339(),
            completed_at: task.completed_at().map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseDto {
    pub id: DatabaseId,
    pub name: String,
    pub adapter: String,
}

impl From<DatabaseInfo> for DatabaseDto {
    fn from(info: DatabaseInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.to_string(),
            adapter: info.adapter,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseListResponse {
    pub databases: Vec<DatabaseDto>,
}
