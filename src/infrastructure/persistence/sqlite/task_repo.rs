//! SQLite Task Repository

use async_trait::async_trait;
use sqlx::FromRow;

use super::DbPool;
use crate::application::ports::{RepositoryError, TaskRepositoryPort};
use crate::domain::task::{Task, TaskId};

/// SQLite Task Repository
///
/// 任务快照以 JSON 文档保存，状态、进度等列用于查询；
/// 子任务摘要同步写入 search_sub_tasks
pub struct SqliteTaskRepository {
    pool: DbPool,
}

impl SqliteTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct TaskRow {
    task_id: String,
    document: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        serde_json::from_str(&row.document).map_err(|e| {
            RepositoryError::SerializationError(format!("task {}: {}", row.task_id, e))
        })
    }
}

#[async_trait]
impl TaskRepositoryPort for SqliteTaskRepository {
    async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        let document = serde_json::to_string(task)
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;
        let databases = task
            .sub_tasks()
            .keys()
            .map(|db| db.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO search_tasks (task_id, status, progress, databases, document, created_at, updated_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(task_id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                document = excluded.document,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(task.task_id().as_str())
        .bind(task.status().as_str())
        .bind(task.progress() as i64)
        .bind(&databases)
        .bind(&document)
        .bind(task.created_at().to_rfc3339())
        .bind(task.updated_at().to_rfc3339())
        .bind(task.completed_at().map(|t| t.to_rfc3339()))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        for sub_task in task.sub_tasks().values() {
            sqlx::query(
                r#"
                INSERT INTO search_sub_tasks (task_id, database_id, status, attempts, record_count, error_message, started_at, finished_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(task_id, database_id) DO UPDATE SET
                    status = excluded.status,
                    attempts = excluded.attempts,
                    record_count = excluded.record_count,
                    error_message = excluded.error_message,
                    started_at = excluded.started_at,
                    finished_at = excluded.finished_at
                "#,
            )
            .bind(task.task_id().as_str())
            .bind(sub_task.database_id().as_str())
            .bind(sub_task.status().as_str())
            .bind(sub_task.attempts() as i64)
            .bind(sub_task.raw_results().len() as i64)
            .bind(sub_task.error().map(|e| e.to_string()))
            .bind(sub_task.started_at().map(|t| t.to_rfc3339()))
            .bind(sub_task.finished_at().map(|t| t.to_rfc3339()))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(
            task_id = %task.task_id(),
            status = %task.status(),
            progress = task.progress(),
            "Task saved"
        );
        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        let row: Option<TaskRow> =
            sqlx::query_as("SELECT task_id, document FROM search_tasks WHERE task_id = ?")
                .bind(task_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(Task::try_from).transpose()
    }

    async fn find_unfinished(&self) -> Result<Vec<Task>, RepositoryError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT task_id, document FROM search_tasks WHERE status IN ('pending', 'running') ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        rows.into_iter().map(Task::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patent::PatentRecord;
    use crate::domain::search::{DatabaseId, SearchRequest};
    use crate::domain::task::{DispatchReport, SubTaskOutcome, SubTaskStatus, TaskStatus};
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn setup() -> SqliteTaskRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteTaskRepository::new(pool)
    }

    fn new_task() -> Task {
        Task::new(
            SearchRequest::new([DatabaseId::Uspto, DatabaseId::Twpat]).with_keywords(["battery"]),
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let repo = setup().await;
        let task = new_task();

        repo.save(&task).await.unwrap();
        let loaded = repo.load(task.task_id()).await.unwrap().unwrap();

        assert_eq!(loaded.task_id(), task.task_id());
        assert_eq!(loaded.status(), TaskStatus::Pending);
        assert_eq!(loaded.sub_tasks().len(), 2);
        assert_eq!(loaded.request(), task.request());
    }

    #[tokio::test]
    async fn test_save_overwrites_existing() {
        let repo = setup().await;
        let mut task = new_task();
        repo.save(&task).await.unwrap();

        task.start().unwrap();
        let record = PatentRecord::new(DatabaseId::Uspto, "US10123456B2", "Battery").with_score(80.0);
        task.settle_sub_task(DatabaseId::Uspto, SubTaskOutcome::Succeeded(vec![record]))
            .unwrap();
        task.settle_sub_task(DatabaseId::Twpat, SubTaskOutcome::TimedOut("slow".into()))
            .unwrap();
        task.resolve(DispatchReport::default()).unwrap();
        repo.save(&task).await.unwrap();

        let loaded = repo.load(task.task_id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), TaskStatus::Completed);
        assert!(loaded.completed_at().is_some());
        assert_eq!(loaded.result().unwrap().records.len(), 1);
        assert_eq!(
            loaded.sub_task(DatabaseId::Twpat).unwrap().status(),
            SubTaskStatus::TimedOut
        );

        let (status, record_count): (String, i64) = sqlx::query_as(
            "SELECT status, record_count FROM search_sub_tasks WHERE task_id = ? AND database_id = 'uspto'",
        )
        .bind(task.task_id().as_str())
        .fetch_one(&repo.pool)
        .await
        .unwrap();
        assert_eq!(status, "succeeded");
        assert_eq!(record_count, 1);
    }

    #[tokio::test]
    async fn test_find_unfinished() {
        let repo = setup().await;

        let pending = new_task();
        repo.save(&pending).await.unwrap();

        let mut finished = new_task();
        finished.start().unwrap();
        finished
            .fail(crate::domain::task::TaskFailure::internal("boom"))
            .unwrap();
        repo.save(&finished).await.unwrap();

        let unfinished = repo.find_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].task_id(), pending.task_id());
    }

    #[tokio::test]
    async fn test_load_missing() {
        let repo = setup().await;
        assert!(repo.load(&TaskId::new()).await.unwrap().is_none());
    }
}
