//! Search Worker - Background Search Task Processor

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::application::SearchCoordinator;
use crate::domain::task::TaskId;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct SearchWorkerConfig {
    /// 同时执行的最大任务数（子任务并发由工作池单独限制）
    pub max_concurrent_tasks: usize,
}

impl Default for SearchWorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 16,
        }
    }
}

/// 检索 Worker
///
/// 后台任务处理器，从队列消费任务 ID 并交给协调器执行
pub struct SearchWorker {
    config: SearchWorkerConfig,
    queue_receiver: mpsc::Receiver<TaskId>,
    coordinator: Arc<SearchCoordinator>,
}

impl SearchWorker {
    pub fn new(
        config: SearchWorkerConfig,
        queue_receiver: mpsc::Receiver<TaskId>,
        coordinator: Arc<SearchCoordinator>,
    ) -> Self {
        Self {
            config,
            queue_receiver,
            coordinator,
        }
    }

    /// 启动 Worker，队列关闭后返回
    pub async fn run(mut self) {
        tracing::info!(
            max_concurrent_tasks = self.config.max_concurrent_tasks,
            "SearchWorker started"
        );

        // 使用 semaphore 控制同时执行的任务数
        let semaphore = Arc::new(tokio::sync::Semaphore::new(
            self.config.max_concurrent_tasks.max(1),
        ));

        while let Some(task_id) = self.queue_receiver.recv().await {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to acquire semaphore permit");
                    break;
                }
            };

            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                let _permit = permit; // 持有 permit 直到任务完成
                coordinator.run_task(&task_id).await;
            });
        }

        tracing::info!("SearchWorker stopped");
    }
}
