//! Bot Adapter Port - 外部专利数据库检索机器人抽象
//!
//! 每个数据库的检索机器人协议各不相同，统一包装为 `BotAdapterPort`，
//! 具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::patent::PatentRecord;
use crate::domain::search::{DatabaseId, SearchRequest};
use crate::domain::task::{SubTaskError, SubTaskErrorKind};

/// Bot Adapter 错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// 网络、超时等暂时性故障，可由调度器重试
    #[error("Transient bot error: {0}")]
    Transient(String),

    /// 凭证错误、查询格式错误等，重试无意义
    #[error("Permanent bot error: {0}")]
    Permanent(String),

    /// 取消信号触发后停止
    #[error("Search cancelled")]
    Cancelled,
}

impl BotError {
    pub fn kind(&self) -> SubTaskErrorKind {
        match self {
            BotError::Transient(_) => SubTaskErrorKind::Transient,
            BotError::Permanent(_) => SubTaskErrorKind::Permanent,
            BotError::Cancelled => SubTaskErrorKind::Cancelled,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Transient(_))
    }
}

impl From<BotError> for SubTaskError {
    fn from(err: BotError) -> Self {
        SubTaskError::new(err.kind(), err.to_string())
    }
}

/// Bot Adapter Port
///
/// 约定:
/// - `ctx` 被取消后须尽快返回 `BotError::Cancelled`
/// - 不在内部重试，重试由调度器决定
#[async_trait]
pub trait BotAdapterPort: Send + Sync {
    /// 适配器名称（用于日志）
    fn name(&self) -> &str;

    /// 在指定数据库上执行检索
    async fn search(
        &self,
        ctx: CancellationToken,
        database: DatabaseId,
        request: &SearchRequest,
    ) -> Result<Vec<PatentRecord>, BotError>;

    /// 检查机器人是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}

/// 检索机器人名册
///
/// 启动时构建，按数据库 ID 注册适配器，之后只读
#[derive(Clone, Default)]
pub struct BotRoster {
    adapters: BTreeMap<DatabaseId, Arc<dyn BotAdapterPort>>,
}

impl BotRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册适配器，同一数据库重复注册时覆盖
    pub fn register(mut self, database: DatabaseId, adapter: Arc<dyn BotAdapterPort>) -> Self {
        self.adapters.insert(database, adapter);
        self
    }

    pub fn get(&self, database: DatabaseId) -> Option<Arc<dyn BotAdapterPort>> {
        self.adapters.get(&database).cloned()
    }

    pub fn contains(&self, database: DatabaseId) -> bool {
        self.adapters.contains_key(&database)
    }

    /// 已注册的数据库（有序）
    pub fn databases(&self) -> Vec<DatabaseId> {
        self.adapters.keys().copied().collect()
    }

    pub fn adapter_name(&self, database: DatabaseId) -> Option<String> {
        self.adapters.get(&database).map(|a| a.name().to_string())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for BotRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.adapters.iter().map(|(db, a)| (db, a.name())))
            .finish()
    }
}
