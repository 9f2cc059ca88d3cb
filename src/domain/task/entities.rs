//! Task Context - Entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SubTaskStatus, TaskError};
use crate::domain::patent::PatentRecord;
use crate::domain::search::DatabaseId;

/// 子任务错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskErrorKind {
    /// 网络或暂时性故障，可重试
    Transient,
    /// 凭证错误、查询格式错误等，不重试
    Permanent,
    /// 超过子任务时限或任务期限
    Timeout,
    /// 被任务所有者取消
    Cancelled,
    /// 适配器崩溃或内部错误
    Internal,
}

impl SubTaskErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubTaskErrorKind::Transient => "transient",
            SubTaskErrorKind::Permanent => "permanent",
            SubTaskErrorKind::Timeout => "timeout",
            SubTaskErrorKind::Cancelled => "cancelled",
            SubTaskErrorKind::Internal => "internal",
        }
    }
}

/// 子任务的结构化错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskError {
    pub kind: SubTaskErrorKind,
    pub message: String,
}

impl SubTaskError {
    pub fn new(kind: SubTaskErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(SubTaskErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(SubTaskErrorKind::Permanent, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SubTaskErrorKind::Internal, message)
    }
}

impl std::fmt::Display for SubTaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

/// 子任务的最终结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubTaskOutcome {
    Succeeded(Vec<PatentRecord>),
    Failed(SubTaskError),
    TimedOut(String),
    Cancelled(String),
}

impl SubTaskOutcome {
    pub fn status(&self) -> SubTaskStatus {
        match self {
            SubTaskOutcome::Succeeded(_) => SubTaskStatus::Succeeded,
            SubTaskOutcome::Failed(_) => SubTaskStatus::Failed,
            SubTaskOutcome::TimedOut(_) => SubTaskStatus::TimedOut,
            SubTaskOutcome::Cancelled(_) => SubTaskStatus::Cancelled,
        }
    }
}

/// 子任务：一个目标数据库上的一次检索
///
/// 不变量:
/// - 仅在 succeeded 时持有结果
/// - 进入终态后不再变更
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    database_id: DatabaseId,
    status: SubTaskStatus,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    raw_results: Vec<PatentRecord>,
    error: Option<SubTaskError>,
    attempts: u32,
}

impl SubTask {
    pub fn new(database_id: DatabaseId) -> Self {
        Self {
            database_id,
            status: SubTaskStatus::Pending,
            started_at: None,
            finished_at: None,
            raw_results: Vec::new(),
            error: None,
            attempts: 0,
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), TaskError> {
        self.ensure_open()?;
        if self.status == SubTaskStatus::Pending {
            self.status = SubTaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
        Ok(())
    }

    pub(crate) fn record_attempt(&mut self) -> Result<(), TaskError> {
        self.ensure_open()?;
        self.attempts += 1;
        Ok(())
    }

    /// 进入终态，排队中（pending）的子任务也可直接结束
    pub(crate) fn settle(&mut self, outcome: SubTaskOutcome) -> Result<(), TaskError> {
        self.ensure_open()?;

        self.status = outcome.status();
        self.finished_at = Some(Utc::now());
        match outcome {
            SubTaskOutcome::Succeeded(records) => {
                self.raw_results = records;
                self.error = None;
            }
            SubTaskOutcome::Failed(error) => self.error = Some(error),
            SubTaskOutcome::TimedOut(message) => {
                self.error = Some(SubTaskError::new(SubTaskErrorKind::Timeout, message))
            }
            SubTaskOutcome::Cancelled(message) => {
                self.error = Some(SubTaskError::new(SubTaskErrorKind::Cancelled, message))
            }
        }
        Ok(())
    }

    /// 崩溃恢复：执行中的子任务退回排队状态
    pub(crate) fn reset_for_resume(&mut self) {
        if self.status == SubTaskStatus::Running {
            self.status = SubTaskStatus::Pending;
            self.started_at = None;
        }
    }

    fn ensure_open(&self) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::SubTaskAlreadySettled {
                database: self.database_id,
                status: self.status,
            });
        }
        Ok(())
    }

    // Getters
    pub fn database_id(&self) -> DatabaseId {
        self.database_id
    }

    pub fn status(&self) -> SubTaskStatus {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn raw_results(&self) -> &[PatentRecord] {
        &self.raw_results
    }

    pub fn error(&self) -> Option<&SubTaskError> {
        self.error.as_ref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
