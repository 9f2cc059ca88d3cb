//! Sled-based Result Outbox Implementation
//!
//! 已完成任务的合并结果写入 outbox，下游用 `pending()` 读取、`ack()` 确认。
//! 条目以 bincode 编码，附带记录列表的 md5 摘要，重复发布相同结果时忽略。
//! 确认后的摘要保留 7 天，过期后同一任务的重复发布会再次入箱。

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::Arc;

use crate::application::ports::{PublishError, PublishStatus, ResultPublisherPort};
use crate::domain::task::TaskId;
use crate::domain::AggregatedResult;

const ENTRY_PREFIX: &str = "outbox:";
const ACKED_PREFIX: &str = "acked:";

/// 已确认摘要的保留天数
const ACKED_RETENTION_DAYS: i64 = 7;

/// Sled outbox 配置
#[derive(Debug, Clone)]
pub struct SledOutboxConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledOutboxConfig {
    fn default() -> Self {
        Self {
            db_path: "data/outbox.sled".to_string(),
        }
    }
}

/// 内部存储条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InternalOutboxEntry {
    task_id: String,
    digest: String,
    result: AggregatedResult,
    published_at: i64,
}

/// 已确认条目的摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AckedDigest {
    digest: String,
    acked_at: i64,
}

/// 待交付的结果
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub task_id: TaskId,
    pub digest: String,
    pub result: AggregatedResult,
    pub published_at: DateTime<Utc>,
}

impl From<InternalOutboxEntry> for OutboxEntry {
    fn from(entry: InternalOutboxEntry) -> Self {
        Self {
            task_id: TaskId::from_string(entry.task_id),
            digest: entry.digest,
            result: entry.result,
            published_at: Utc
                .timestamp_millis_opt(entry.published_at)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Sled 结果 outbox
pub struct SledResultOutbox {
    db: Db,
}

impl SledResultOutbox {
    /// 创建新的 outbox 实例
    pub fn new(config: &SledOutboxConfig) -> Result<Self, PublishError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| PublishError::StorageError(e.to_string()))?;

        let outbox = Self { db };
        tracing::info!(
            db_path = %config.db_path,
            pending = outbox.pending_count(),
            "SledResultOutbox initialized"
        );
        Ok(outbox)
    }

    /// 打开现有 outbox
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PublishError> {
        let config = SledOutboxConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 记录列表的 md5 摘要
    pub fn digest(result: &AggregatedResult) -> Result<String, PublishError> {
        let bytes = bincode::serialize(&result.records)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;
        Ok(format!("{:x}", md5::compute(bytes)))
    }

    /// 待交付条目（按发布时间排序）
    pub fn pending(&self) -> Result<Vec<OutboxEntry>, PublishError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item.map_err(|e| PublishError::StorageError(e.to_string()))?;
            let entry = bincode::deserialize::<InternalOutboxEntry>(&value)
                .map_err(|e| PublishError::SerializationError(e.to_string()))?;
            entries.push(entry);
        }
        entries.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        Ok(entries.into_iter().map(OutboxEntry::from).collect())
    }

    pub fn pending_count(&self) -> usize {
        self.db.scan_prefix(ENTRY_PREFIX).count()
    }

    /// 下游确认已处理，返回条目是否存在
    ///
    /// 摘要被保留，保留期内相同结果的重复发布仍会被忽略
    pub fn ack(&self, task_id: &TaskId) -> Result<bool, PublishError> {
        let removed = self
            .db
            .remove(entry_key(task_id))
            .map_err(|e| PublishError::StorageError(e.to_string()))?;

        let Some(value) = removed else {
            return Ok(false);
        };
        let entry = bincode::deserialize::<InternalOutboxEntry>(&value)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;
        let now = Utc::now();
        let acked = AckedDigest {
            digest: entry.digest,
            acked_at: now.timestamp_millis(),
        };
        let acked_bytes = bincode::serialize(&acked)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;
        self.db
            .insert(acked_key(task_id), acked_bytes)
            .map_err(|e| PublishError::StorageError(e.to_string()))?;
        self.prune_acked(now - chrono::Duration::days(ACKED_RETENTION_DAYS))?;
        self.flush()?;

        tracing::debug!(task_id = %task_id, "Outbox entry acknowledged");
        Ok(true)
    }

    /// 删除 `cutoff` 之前确认的摘要，返回删除数量
    pub fn prune_acked(&self, cutoff: DateTime<Utc>) -> Result<usize, PublishError> {
        let cutoff = cutoff.timestamp_millis();
        let mut expired = Vec::new();
        for item in self.db.scan_prefix(ACKED_PREFIX) {
            let (key, value) = item.map_err(|e| PublishError::StorageError(e.to_string()))?;
            let acked = bincode::deserialize::<AckedDigest>(&value)
                .map_err(|e| PublishError::SerializationError(e.to_string()))?;
            if acked.acked_at < cutoff {
                expired.push(key);
            }
        }

        for key in &expired {
            self.db
                .remove(key)
                .map_err(|e| PublishError::StorageError(e.to_string()))?;
        }
        if !expired.is_empty() {
            tracing::debug!(removed = expired.len(), "Expired outbox acknowledgements pruned");
        }
        Ok(expired.len())
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), PublishError> {
        self.db
            .flush()
            .map_err(|e| PublishError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn known_digest(&self, task_id: &TaskId) -> Result<Option<String>, PublishError> {
        if let Some(value) = self
            .db
            .get(entry_key(task_id))
            .map_err(|e| PublishError::StorageError(e.to_string()))?
        {
            let entry = bincode::deserialize::<InternalOutboxEntry>(&value)
                .map_err(|e| PublishError::SerializationError(e.to_string()))?;
            return Ok(Some(entry.digest));
        }

        let Some(value) = self
            .db
            .get(acked_key(task_id))
            .map_err(|e| PublishError::StorageError(e.to_string()))?
        else {
            return Ok(None);
        };
        let acked = bincode::deserialize::<AckedDigest>(&value)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;
        Ok(Some(acked.digest))
    }
}

fn entry_key(task_id: &TaskId) -> String {
    format!("{}{}", ENTRY_PREFIX, task_id)
}

fn acked_key(task_id: &TaskId) -> String {
    format!("{}{}", ACKED_PREFIX, task_id)
}

#[async_trait]
impl ResultPublisherPort for SledResultOutbox {
    async fn publish(
        &self,
        task_id: &TaskId,
        result: &AggregatedResult,
    ) -> Result<PublishStatus, PublishError> {
        let digest = Self::digest(result)?;

        if self.known_digest(task_id)?.as_deref() == Some(digest.as_str()) {
            tracing::debug!(task_id = %task_id, digest = %digest, "Result already published");
            return Ok(PublishStatus::Duplicate);
        }

        let entry = InternalOutboxEntry {
            task_id: task_id.to_string(),
            digest: digest.clone(),
            result: result.clone(),
            published_at: Utc::now().timestamp_millis(),
        };
        let entry_bytes = bincode::serialize(&entry)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;

        self.db
            .insert(entry_key(task_id), entry_bytes)
            .map_err(|e| PublishError::StorageError(e.to_string()))?;
        self.flush()?;

        tracing::debug!(
            task_id = %task_id,
            digest = %digest,
            records = result.records.len(),
            "Result written to outbox"
        );
        Ok(PublishStatus::Published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate;
    use crate::domain::patent::PatentRecord;
    use crate::domain::search::DatabaseId;
    use crate::domain::task::{SubTask, SubTaskOutcome};
    use tempfile::tempdir;

    fn sample_result(numbers: &[&str]) -> AggregatedResult {
        let records = numbers
            .iter()
            .map(|n| PatentRecord::new(DatabaseId::Uspto, n, "title").with_score(42.0))
            .collect();
        let mut sub = SubTask::new(DatabaseId::Uspto);
        sub.settle(SubTaskOutcome::Succeeded(records)).unwrap();
        aggregate([&sub], 100)
    }

    #[tokio::test]
    async fn test_publish_and_drain() {
        let dir = tempdir().unwrap();
        let outbox = SledResultOutbox::open(dir.path().join("outbox")).unwrap();
        let task_id = TaskId::new();
        let result = sample_result(&["US1", "US2"]);

        let status = outbox.publish(&task_id, &result).await.unwrap();
        assert_eq!(status, PublishStatus::Published);

        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_id, task_id);
        assert_eq!(pending[0].result, result);

        assert!(outbox.ack(&task_id).unwrap());
        assert!(outbox.pending().unwrap().is_empty());
        assert!(!outbox.ack(&task_id).unwrap());
    }

    #[tokio::test]
    async fn test_republish_same_result_is_noop() {
        let dir = tempdir().unwrap();
        let outbox = SledResultOutbox::open(dir.path().join("outbox")).unwrap();
        let task_id = TaskId::new();
        let result = sample_result(&["US1"]);

        outbox.publish(&task_id, &result).await.unwrap();
        assert_eq!(
            outbox.publish(&task_id, &result).await.unwrap(),
            PublishStatus::Duplicate
        );

        outbox.ack(&task_id).unwrap();
        assert_eq!(
            outbox.publish(&task_id, &result).await.unwrap(),
            PublishStatus::Duplicate
        );
        assert_eq!(outbox.pending_count(), 0);

        let changed = sample_result(&["US1", "US9"]);
        assert_eq!(
            outbox.publish(&task_id, &changed).await.unwrap(),
            PublishStatus::Published
        );
    }

    #[tokio::test]
    async fn test_expired_acknowledgements_are_pruned() {
        let dir = tempdir().unwrap();
        let outbox = SledResultOutbox::open(dir.path().join("outbox")).unwrap();
        let task_id = TaskId::new();
        let result = sample_result(&["US1"]);

        outbox.publish(&task_id, &result).await.unwrap();
        outbox.ack(&task_id).unwrap();
        // 刚确认的摘要仍在保留期内
        let retention_cutoff = Utc::now() - chrono::Duration::days(ACKED_RETENTION_DAYS);
        assert_eq!(outbox.prune_acked(retention_cutoff).unwrap(), 0);

        assert_eq!(
            outbox
                .prune_acked(Utc::now() + chrono::Duration::seconds(1))
                .unwrap(),
            1
        );
        assert_eq!(outbox.db.scan_prefix(ACKED_PREFIX).count(), 0);
        assert_eq!(
            outbox.publish(&task_id, &result).await.unwrap(),
            PublishStatus::Published
        );
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outbox");
        let task_id = TaskId::new();

        {
            let outbox = SledResultOutbox::open(&path).unwrap();
            outbox.publish(&task_id, &sample_result(&["EP1"])).await.unwrap();
        }

        let reopened = SledResultOutbox::open(&path).unwrap();
        assert_eq!(reopened.pending().unwrap().len(), 1);
    }
}
