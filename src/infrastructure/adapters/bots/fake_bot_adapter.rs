//! Fake Bot Adapter - 用于测试和本地运行的检索机器人
//!
//! 按尝试次数返回预设结果，不访问任何外部服务

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BotAdapterPort, BotError};
use crate::domain::patent::PatentRecord;
use crate::domain::search::{DatabaseId, SearchRequest};

/// 单次尝试的预设行为
#[derive(Debug, Clone)]
pub enum FakeStep {
    /// 返回记录
    Records(Vec<PatentRecord>),
    /// 暂时性错误
    Transient(String),
    /// 永久错误
    Permanent(String),
    /// 一直挂起直到被取消
    Hang,
    /// 调用时 panic
    Panic(String),
}

/// Fake Bot Adapter
///
/// 第 n 次调用执行第 n 个步骤，步骤用完后重复最后一个
pub struct FakeBotAdapter {
    steps: Vec<FakeStep>,
    latency: Duration,
    calls: AtomicU32,
}

impl FakeBotAdapter {
    pub fn new(steps: Vec<FakeStep>) -> Self {
        Self {
            steps,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    /// 每次都返回同一批记录
    pub fn records(records: Vec<PatentRecord>) -> Self {
        Self::new(vec![FakeStep::Records(records)])
    }

    /// 生成 `count` 条示例记录
    pub fn sample(database: DatabaseId, count: usize) -> Self {
        let prefix = database.as_str().to_uppercase();
        let records = (0..count)
            .map(|i| {
                PatentRecord::new(database, &format!("{}{:06}", prefix, i + 1), format!("Sample patent {}", i + 1))
                    .with_abstract(format!("Sample record {} from {}", i + 1, database.display_name()))
                    .with_score(90.0 - i as f64)
            })
            .collect();
        Self::records(records)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 已被调用的次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn step(&self, index: usize) -> FakeStep {
        self.steps
            .get(index)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(FakeStep::Records(Vec::new()))
    }
}

#[async_trait]
impl BotAdapterPort for FakeBotAdapter {
    fn name(&self) -> &str {
        "fake-bot"
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        database: DatabaseId,
        _request: &SearchRequest,
    ) -> Result<Vec<PatentRecord>, BotError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let step = self.step(index);

        tracing::debug!(database = %database, attempt = index + 1, "FakeBotAdapter: running scripted step");

        if !self.latency.is_zero() {
            tokio::select! {
                _ = ctx.cancelled() => return Err(BotError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        match step {
            FakeStep::Records(records) => Ok(records),
            FakeStep::Transient(message) => Err(BotError::Transient(message)),
            FakeStep::Permanent(message) => Err(BotError::Permanent(message)),
            FakeStep::Hang => {
                ctx.cancelled().await;
                Err(BotError::Cancelled)
            }
            FakeStep::Panic(message) => panic!("{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SearchRequest {
        SearchRequest::new([DatabaseId::Uspto]).with_keywords(["battery"])
    }

    #[tokio::test]
    async fn test_steps_follow_attempts_and_repeat_last() {
        let adapter = FakeBotAdapter::new(vec![
            FakeStep::Transient("busy".to_string()),
            FakeStep::Records(vec![PatentRecord::new(DatabaseId::Uspto, "US1", "t")]),
        ]);
        let ctx = CancellationToken::new();

        let first = adapter.search(ctx.clone(), DatabaseId::Uspto, &request()).await;
        let second = adapter.search(ctx.clone(), DatabaseId::Uspto, &request()).await;
        let third = adapter.search(ctx, DatabaseId::Uspto, &request()).await;

        assert_eq!(first, Err(BotError::Transient("busy".to_string())));
        assert_eq!(second.unwrap().len(), 1);
        assert_eq!(third.unwrap().len(), 1);
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn test_hang_returns_on_cancel() {
        let adapter = Arc::new(FakeBotAdapter::new(vec![FakeStep::Hang]));
        let ctx = CancellationToken::new();

        let handle = {
            let adapter = adapter.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { adapter.search(ctx, DatabaseId::Uspto, &request()).await })
        };
        ctx.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(BotError::Cancelled));
    }

    #[tokio::test]
    async fn test_sample_records() {
        let adapter = FakeBotAdapter::sample(DatabaseId::Epo, 3);
        let records = adapter
            .search(CancellationToken::new(), DatabaseId::Epo, &request())
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].patent_number, "EPO:EPO000001");
        assert!(records[0].relevance_score > records[2].relevance_score);
    }
}
