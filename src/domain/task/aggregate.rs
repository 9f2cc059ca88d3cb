//! Task Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{
    SubTask, SubTaskError, SubTaskOutcome, SubTaskStatus, TaskError, TaskId, TaskStatus,
};
use crate::domain::aggregation::{aggregate, AggregatedResult};
use crate::domain::search::{DatabaseId, SearchRequest};

/// 任务失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// 所有子任务均未成功
    AllSubTasksFailed,
    /// 分派前的不可恢复内部错误
    Internal,
}

/// 结构化的任务失败信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub reason: FailureReason,
    pub message: String,
    /// 各数据库的失败详情
    pub details: BTreeMap<DatabaseId, SubTaskError>,
}

impl TaskFailure {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            reason: FailureReason::Internal,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }
}

/// 分派结束时的上下文
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// 所有者主动取消
    pub owner_cancelled: bool,
    /// 任务整体期限已到
    pub deadline_exceeded: bool,
}

/// Task 聚合根
///
/// 不变量:
/// - completed_at 非空当且仅当状态为终态
/// - result 仅在 completed 时存在，error 仅在 failed 时存在
/// - progress 在执行中单调不减
/// - 终态之后不再发生状态转换
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    task_id: TaskId,
    status: TaskStatus,
    progress: u8,
    request: SearchRequest,
    sub_tasks: BTreeMap<DatabaseId, SubTask>,
    result: Option<AggregatedResult>,
    error: Option<TaskFailure>,
    message: Option<String>,
    #[serde(default)]
    persist_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// 为已校验的请求创建任务，每个目标数据库一个子任务
    pub fn new(request: SearchRequest) -> Self {
        let now = Utc::now();
        let sub_tasks = request
            .databases
            .iter()
            .map(|db| (*db, SubTask::new(*db)))
            .collect();

        Self {
            task_id: TaskId::new(),
            status: TaskStatus::Pending,
            progress: 0,
            request,
            sub_tasks,
            result: None,
            error: None,
            message: None,
            persist_error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// pending → running
    pub fn start(&mut self) -> Result<(), TaskError> {
        self.transition(TaskStatus::Running)?;
        self.message = None;
        Ok(())
    }

    pub fn start_sub_task(&mut self, database: DatabaseId) -> Result<(), TaskError> {
        self.ensure_running()?;
        self.sub_task_mut(database)?.start()?;
        self.touch();
        Ok(())
    }

    pub fn record_attempt(&mut self, database: DatabaseId) -> Result<(), TaskError> {
        self.ensure_running()?;
        self.sub_task_mut(database)?.record_attempt()?;
        self.touch();
        Ok(())
    }

    /// 子任务进入终态，并重新计算进度
    pub fn settle_sub_task(
        &mut self,
        database: DatabaseId,
        outcome: SubTaskOutcome,
    ) -> Result<(), TaskError> {
        self.ensure_running()?;
        self.sub_task_mut(database)?.settle(outcome)?;

        let total = self.sub_tasks.len();
        let terminal = self.sub_tasks.values().filter(|s| s.is_terminal()).count();
        let computed = if total == 0 {
            100
        } else {
            (terminal * 100 / total) as u8
        };
        self.progress = self.progress.max(computed);
        self.touch();
        Ok(())
    }

    /// 所有子任务结束后决定任务终态
    ///
    /// - 所有者取消 → cancelled
    /// - 无成功子任务：期限已到 → cancelled，否则 → failed
    /// - 至少一个成功 → completed，附带聚合结果
    pub fn resolve(&mut self, report: DispatchReport) -> Result<TaskStatus, TaskError> {
        self.ensure_running()?;
        if let Some(open) = self.sub_tasks.values().find(|s| !s.is_terminal()) {
            return Err(TaskError::SubTaskNotSettled(open.database_id()));
        }

        let succeeded = self
            .sub_tasks
            .values()
            .filter(|s| s.status() == SubTaskStatus::Succeeded)
            .count();

        if report.owner_cancelled {
            self.finish(TaskStatus::Cancelled)?;
            self.message = Some("cancelled by owner".to_string());
        } else if succeeded == 0 && report.deadline_exceeded {
            self.finish(TaskStatus::Cancelled)?;
            self.message = Some("task deadline exceeded before any database succeeded".to_string());
        } else if succeeded == 0 {
            let details = self
                .sub_tasks
                .values()
                .filter_map(|s| s.error().map(|e| (s.database_id(), e.clone())))
                .collect();
            self.finish(TaskStatus::Failed)?;
            self.error = Some(TaskFailure {
                reason: FailureReason::AllSubTasksFailed,
                message: format!("all {} databases failed", self.sub_tasks.len()),
                details,
            });
        } else {
            let result = aggregate(self.sub_tasks.values(), self.request.options.max_results);
            self.finish(TaskStatus::Completed)?;
            if report.deadline_exceeded {
                self.message = Some("task deadline exceeded, partial result".to_string());
            }
            self.result = Some(result);
        }

        Ok(self.status)
    }

    /// 分派前的不可恢复错误：running → failed
    pub fn fail(&mut self, failure: TaskFailure) -> Result<(), TaskError> {
        self.ensure_running()?;
        self.finish(TaskStatus::Failed)?;
        self.error = Some(failure);
        Ok(())
    }

    /// 重启后恢复：执行中的子任务退回排队，返回仍需执行的数据库
    pub fn prepare_resume(&mut self) -> Vec<DatabaseId> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        for sub_task in self.sub_tasks.values_mut() {
            sub_task.reset_for_resume();
        }
        self.touch();
        self.pending_databases()
    }

    /// 尚未结束的子任务
    pub fn pending_databases(&self) -> Vec<DatabaseId> {
        self.sub_tasks
            .values()
            .filter(|s| !s.is_terminal())
            .map(|s| s.database_id())
            .collect()
    }

    pub fn set_persist_error(&mut self, error: Option<String>) {
        self.persist_error = error;
    }

    fn finish(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        self.transition(to)?;
        self.progress = 100;
        self.completed_at = Some(self.updated_at);
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        let allowed = match (self.status, to) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Running, target) => target.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), TaskError> {
        if self.status != TaskStatus::Running {
            return Err(TaskError::NotRunning(self.status));
        }
        Ok(())
    }

    fn sub_task_mut(&mut self, database: DatabaseId) -> Result<&mut SubTask, TaskError> {
        self.sub_tasks
            .get_mut(&database)
            .ok_or(TaskError::UnknownSubTask(database))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // Getters
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn sub_tasks(&self) -> &BTreeMap<DatabaseId, SubTask> {
        &self.sub_tasks
    }

    pub fn sub_task(&self, database: DatabaseId) -> Option<&SubTask> {
        self.sub_tasks.get(&database)
    }

    pub fn result(&self) -> Option<&AggregatedResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        self.error.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn persist_error(&self) -> Option<&str> {
        self.persist_error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
