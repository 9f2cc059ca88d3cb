//! Task Saver - 带有限重试的任务持久化

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{RepositoryError, TaskRepositoryPort};
use crate::domain::task::Task;

#[derive(Clone)]
pub struct TaskSaver {
    repository: Arc<dyn TaskRepositoryPort>,
    attempts: u32,
    retry_delay: Duration,
}

impl TaskSaver {
    pub fn new(repository: Arc<dyn TaskRepositoryPort>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            repository,
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    /// 保存任务，失败时按固定间隔重试，用尽后返回最后一次错误
    pub async fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        let mut attempt = 1;
        loop {
            match self.repository.save(task).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.attempts => {
                    tracing::warn!(
                        task_id = %task.task_id(),
                        attempt = attempt,
                        error = %e,
                        "Failed to save task, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        task_id = %task.task_id(),
                        attempts = attempt,
                        error = %e,
                        "Failed to save task, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}
