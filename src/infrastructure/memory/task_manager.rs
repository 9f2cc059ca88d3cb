//! In-Memory Task Manager Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{TaskManagerError, TaskManagerPort};
use crate::domain::task::{Task, TaskError, TaskId};

/// 执行中的任务条目
struct LiveTask {
    task: Task,
    cancel: CancellationToken,
}

/// 内存任务管理器
///
/// DashMap 的分片写锁把对同一任务的修改串行化
pub struct InMemoryTaskManager {
    /// task_id -> LiveTask
    tasks: DashMap<TaskId, LiveTask>,
    /// 任务队列发送端
    queue_sender: mpsc::Sender<TaskId>,
}

impl InMemoryTaskManager {
    pub fn new(queue_sender: mpsc::Sender<TaskId>) -> Self {
        Self {
            tasks: DashMap::new(),
            queue_sender,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl TaskManagerPort for InMemoryTaskManager {
    async fn submit(&self, task: Task) -> Result<TaskId, TaskManagerError> {
        let task_id = task.task_id().clone();
        if self.tasks.contains_key(&task_id) {
            return Err(TaskManagerError::AlreadyExists(task_id.to_string()));
        }

        self.tasks.insert(
            task_id.clone(),
            LiveTask {
                task,
                cancel: CancellationToken::new(),
            },
        );

        // 队列满时等待
        if let Err(e) = self.queue_sender.send(task_id.clone()).await {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to enqueue task");
            self.tasks.remove(&task_id);
            return Err(TaskManagerError::QueueClosed);
        }

        tracing::debug!(task_id = %task_id, "Task submitted");
        Ok(task_id)
    }

    fn get_task(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.get(task_id).map(|entry| entry.task.clone())
    }

    fn update(
        &self,
        task_id: &TaskId,
        f: &mut dyn FnMut(&mut Task) -> Result<(), TaskError>,
    ) -> Result<Task, TaskManagerError> {
        let mut entry = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskManagerError::NotFound(task_id.to_string()))?;

        let mut draft = entry.task.clone();
        f(&mut draft)?;

        let old_status = entry.task.status();
        entry.task = draft;
        if old_status != entry.task.status() {
            tracing::debug!(
                task_id = %task_id,
                old_status = %old_status,
                new_status = %entry.task.status(),
                "Task status changed"
            );
        }
        Ok(entry.task.clone())
    }

    fn cancel(&self, task_id: &TaskId) -> bool {
        match self.tasks.get(task_id) {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::debug!(task_id = %task_id, "Task cancellation signalled");
                true
            }
            None => false,
        }
    }

    fn cancellation_token(&self, task_id: &TaskId) -> Option<CancellationToken> {
        self.tasks.get(task_id).map(|entry| entry.cancel.clone())
    }

    fn remove(&self, task_id: &TaskId) {
        if self.tasks.remove(task_id).is_some() {
            tracing::debug!(task_id = %task_id, "Task removed from memory");
        }
    }

    fn active_count(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::search::{DatabaseId, SearchRequest};
    use crate::domain::task::TaskStatus;

    fn new_task() -> Task {
        Task::new(SearchRequest::new([DatabaseId::Uspto]).with_keywords(["battery"]))
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let (tx, mut rx) = mpsc::channel(10);
        let manager = InMemoryTaskManager::new(tx);

        let task = new_task();
        let task_id = manager.submit(task).await.unwrap();

        // Check queue
        assert_eq!(rx.try_recv().unwrap(), task_id);
        assert_eq!(manager.active_count(), 1);

        // Update
        let snapshot = manager
            .update(&task_id, &mut |t: &mut Task| t.start())
            .unwrap();
        assert_eq!(snapshot.status(), TaskStatus::Running);
        assert_eq!(manager.get_task(&task_id).unwrap().status(), TaskStatus::Running);

        // Cancel
        assert!(!manager.is_cancelled(&task_id));
        assert!(manager.cancel(&task_id));
        assert!(manager.is_cancelled(&task_id));

        manager.remove(&task_id);
        assert!(manager.get_task(&task_id).is_none());
        assert!(!manager.cancel(&task_id));
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_state() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = InMemoryTaskManager::new(tx);
        let task_id = manager.submit(new_task()).await.unwrap();

        let result = manager.update(&task_id, &mut |t: &mut Task| {
            t.start()?;
            t.start_sub_task(DatabaseId::Kipo)
        });

        assert!(matches!(result, Err(TaskManagerError::Domain(_))));
        assert_eq!(manager.get_task(&task_id).unwrap().status(), TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_submit_rejected() {
        let (tx, _rx) = mpsc::channel(10);
        let manager = InMemoryTaskManager::new(tx);
        let task = new_task();

        manager.submit(task.clone()).await.unwrap();
        assert!(matches!(
            manager.submit(task).await,
            Err(TaskManagerError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_queue_rolls_back() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let manager = InMemoryTaskManager::new(tx);

        assert!(matches!(
            manager.submit(new_task()).await,
            Err(TaskManagerError::QueueClosed)
        ));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (tx, _rx) = mpsc::channel(1);
        let manager = InMemoryTaskManager::new(tx);
        let missing = TaskId::new();

        assert!(manager.get_task(&missing).is_none());
        assert!(manager.cancellation_token(&missing).is_none());
        assert!(matches!(
            manager.update(&missing, &mut |_t: &mut Task| -> Result<(), TaskError> { Ok(()) }),
            Err(TaskManagerError::NotFound(_))
        ));
    }
}
