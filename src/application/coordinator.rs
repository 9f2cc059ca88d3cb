//! Search Coordinator - 检索任务协调门面
//!
//! 唯一入口：接收请求、创建任务、调度子任务、合并结果并写入最终状态

use std::sync::Arc;

use crate::application::commands::handlers::{
    CancelTaskHandler, ResumeTasksHandler, SubmitSearchHandler,
};
use crate::application::commands::{
    CancelTask, CancelTaskResponse, ResumeTasks, SubmitSearch, SubmitSearchResponse,
};
use crate::application::dispatch::{Dispatcher, DispatcherConfig, TaskSaver, WorkerPool};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BotRoster, ResultPublisherPort, TaskManagerPort, TaskRepositoryPort,
};
use crate::application::queries::handlers::{
    DatabaseInfo, GetTaskStatusHandler, ListDatabasesHandler,
};
use crate::application::queries::{GetTaskStatus, ListDatabases};
use crate::domain::search::SearchRequest;
use crate::domain::task::{Task, TaskError, TaskFailure, TaskId, TaskStatus};

/// 持久化重试设置
#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    pub save_attempts: u32,
    pub save_retry_delay: std::time::Duration,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            save_attempts: 3,
            save_retry_delay: std::time::Duration::from_millis(500),
        }
    }
}

/// 检索协调器
pub struct SearchCoordinator {
    task_manager: Arc<dyn TaskManagerPort>,
    publisher: Arc<dyn ResultPublisherPort>,
    saver: TaskSaver,
    dispatcher: Dispatcher,
    submit_handler: SubmitSearchHandler,
    cancel_handler: CancelTaskHandler,
    resume_handler: ResumeTasksHandler,
    status_handler: GetTaskStatusHandler,
    databases_handler: ListDatabasesHandler,
}

impl SearchCoordinator {
    pub fn new(
        roster: BotRoster,
        pool: WorkerPool,
        dispatcher_config: DispatcherConfig,
        persistence: PersistenceSettings,
        task_manager: Arc<dyn TaskManagerPort>,
        repository: Arc<dyn TaskRepositoryPort>,
        publisher: Arc<dyn ResultPublisherPort>,
    ) -> Self {
        let saver = TaskSaver::new(
            repository.clone(),
            persistence.save_attempts,
            persistence.save_retry_delay,
        );
        let dispatcher = Dispatcher::new(
            dispatcher_config,
            roster.clone(),
            pool,
            task_manager.clone(),
            saver.clone(),
        );

        Self {
            submit_handler: SubmitSearchHandler::new(
                roster.clone(),
                task_manager.clone(),
                saver.clone(),
            ),
            cancel_handler: CancelTaskHandler::new(task_manager.clone(), repository.clone()),
            resume_handler: ResumeTasksHandler::new(task_manager.clone(), repository.clone()),
            status_handler: GetTaskStatusHandler::new(task_manager.clone(), repository),
            databases_handler: ListDatabasesHandler::new(roster),
            task_manager,
            publisher,
            saver,
            dispatcher,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 提交检索，立即返回任务 ID，任务经由工作队列异步执行
    pub async fn submit(&self, request: SearchRequest) -> Result<SubmitSearchResponse, ApplicationError> {
        self.submit_handler.handle(SubmitSearch { request }).await
    }

    /// 获取任务快照
    pub async fn get_status(&self, task_id: &TaskId) -> Result<Task, ApplicationError> {
        self.status_handler
            .handle(GetTaskStatus {
                task_id: task_id.clone(),
            })
            .await
    }

    /// 取消任务
    pub async fn cancel(&self, task_id: &TaskId) -> Result<CancelTaskResponse, ApplicationError> {
        self.cancel_handler
            .handle(CancelTask {
                task_id: task_id.clone(),
            })
            .await
    }

    /// 重新排入未完成的任务
    pub async fn resume_unfinished(&self) -> Result<Vec<TaskId>, ApplicationError> {
        Ok(self.resume_handler.handle(ResumeTasks).await?.task_ids)
    }

    pub fn list_databases(&self) -> Vec<DatabaseInfo> {
        self.databases_handler.handle(ListDatabases)
    }

    pub fn active_tasks(&self) -> usize {
        self.task_manager.active_count()
    }

    /// 执行一个已排队的任务直到终态（由后台 worker 调用）
    pub async fn run_task(&self, task_id: &TaskId) {
        let started = self.task_manager.update(task_id, &mut |task: &mut Task| -> Result<(), TaskError> {
            if task.status() == TaskStatus::Pending {
                task.start()?;
            }
            Ok(())
        });
        let snapshot = match started {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Task not runnable, skipping");
                return;
            }
        };
        if snapshot.is_terminal() {
            tracing::debug!(task_id = %task_id, status = %snapshot.status(), "Task already finished");
            return;
        }
        if let Err(e) = self.saver.save(&snapshot).await {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to persist running state");
        }

        let resolved = match self.dispatcher.dispatch(task_id).await {
            Ok(report) => self
                .task_manager
                .update(task_id, &mut |task: &mut Task| task.resolve(report).map(|_| ())),
            Err(e) => {
                let message = e.to_string();
                self.task_manager.update(task_id, &mut |task: &mut Task| {
                    task.fail(TaskFailure::internal(message.clone()))
                })
            }
        };

        let final_task = match resolved {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "Failed to resolve task");
                let message = e.to_string();
                match self.task_manager.update(task_id, &mut |task: &mut Task| {
                    task.fail(TaskFailure::internal(message.clone()))
                }) {
                    Ok(task) => task,
                    Err(e) => {
                        tracing::error!(task_id = %task_id, error = %e, "Task lost during execution");
                        return;
                    }
                }
            }
        };

        tracing::info!(
            task_id = %task_id,
            status = %final_task.status(),
            records = final_task.result().map(|r| r.records.len()).unwrap_or(0),
            partial = final_task.result().map(|r| r.partial).unwrap_or(false),
            "Task finished"
        );

        self.finalize(final_task).await;
    }

    /// 保存最终状态，成功后释放内存快照；完成的任务交付给下游
    async fn finalize(&self, task: Task) {
        let task_id = task.task_id().clone();

        match self.saver.save(&task).await {
            Ok(()) => self.task_manager.remove(&task_id),
            Err(e) => {
                let message = e.to_string();
                // 持久化失败时保留内存快照，轮询方可看到过期标记
                let marked = self.task_manager.update(&task_id, &mut |t: &mut Task| -> Result<(), TaskError> {
                    t.set_persist_error(Some(message.clone()));
                    Ok(())
                });
                if let Err(e) = marked {
                    tracing::error!(
                        task_id = %task_id,
                        error = %e,
                        persist_error = %message,
                        "Failed to mark task as not persisted"
                    );
                }
            }
        }

        if task.status() != TaskStatus::Completed {
            return;
        }
        let Some(result) = task.result().cloned() else {
            return;
        };

        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            match publisher.publish(&task_id, &result).await {
                Ok(status) => {
                    tracing::info!(task_id = %task_id, status = ?status, "Result published");
                }
                Err(e) => {
                    tracing::error!(task_id = %task_id, error = %e, "Failed to publish result");
                }
            }
        });
    }
}
