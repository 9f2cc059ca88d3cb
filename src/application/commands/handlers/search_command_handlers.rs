//! Search Command Handlers

use std::sync::Arc;

use crate::application::commands::search_commands::*;
use crate::application::dispatch::TaskSaver;
use crate::application::error::ApplicationError;
use crate::application::ports::{BotRoster, TaskManagerPort, TaskRepositoryPort};
use crate::domain::task::{Task, TaskStatus};

/// SubmitSearch Handler - 校验请求、创建任务并放入工作队列
pub struct SubmitSearchHandler {
    roster: BotRoster,
    task_manager: Arc<dyn TaskManagerPort>,
    saver: TaskSaver,
}

impl SubmitSearchHandler {
    pub fn new(roster: BotRoster, task_manager: Arc<dyn TaskManagerPort>, saver: TaskSaver) -> Self {
        Self {
            roster,
            task_manager,
            saver,
        }
    }

    pub async fn handle(&self, cmd: SubmitSearch) -> Result<SubmitSearchResponse, ApplicationError> {
        let request = cmd.request.validate(&self.roster.databases())?;
        let task = Task::new(request);
        let task_id = task.task_id().clone();

        // 先落盘再入队，保存失败时不创建任务
        self.saver.save(&task).await?;

        tracing::info!(
            task_id = %task_id,
            databases = ?task.request().databases,
            max_results = task.request().options.max_results,
            "Search task created"
        );

        self.task_manager.submit(task).await?;

        Ok(SubmitSearchResponse {
            task_id,
            status: TaskStatus::Pending,
        })
    }
}

/// CancelTask Handler - 触发任务的取消信号
pub struct CancelTaskHandler {
    task_manager: Arc<dyn TaskManagerPort>,
    repository: Arc<dyn TaskRepositoryPort>,
}

impl CancelTaskHandler {
    pub fn new(
        task_manager: Arc<dyn TaskManagerPort>,
        repository: Arc<dyn TaskRepositoryPort>,
    ) -> Self {
        Self {
            task_manager,
            repository,
        }
    }

    pub async fn handle(&self, cmd: CancelTask) -> Result<CancelTaskResponse, ApplicationError> {
        if let Some(task) = self.task_manager.get_task(&cmd.task_id) {
            if task.is_terminal() {
                return Err(ApplicationError::invalid_state(format!(
                    "task {} already {}",
                    cmd.task_id,
                    task.status()
                )));
            }

            self.task_manager.cancel(&cmd.task_id);
            tracing::info!(task_id = %cmd.task_id, status = %task.status(), "Task cancellation requested");

            return Ok(CancelTaskResponse {
                task_id: cmd.task_id,
                status: task.status(),
            });
        }

        match self.repository.load(&cmd.task_id).await? {
            Some(task) if task.is_terminal() => Err(ApplicationError::invalid_state(format!(
                "task {} already {}",
                cmd.task_id,
                task.status()
            ))),
            Some(_) => Err(ApplicationError::invalid_state(format!(
                "task {} is not active in this process",
                cmd.task_id
            ))),
            None => Err(ApplicationError::not_found("Task", cmd.task_id.as_str())),
        }
    }
}

/// ResumeTasks Handler - 重启后重新排入未完成的任务
pub struct ResumeTasksHandler {
    task_manager: Arc<dyn TaskManagerPort>,
    repository: Arc<dyn TaskRepositoryPort>,
}

impl ResumeTasksHandler {
    pub fn new(
        task_manager: Arc<dyn TaskManagerPort>,
        repository: Arc<dyn TaskRepositoryPort>,
    ) -> Self {
        Self {
            task_manager,
            repository,
        }
    }

    pub async fn handle(&self, _cmd: ResumeTasks) -> Result<ResumeTasksResponse, ApplicationError> {
        let unfinished = self.repository.find_unfinished().await?;
        let mut task_ids = Vec::with_capacity(unfinished.len());

        for mut task in unfinished {
            let task_id = task.task_id().clone();
            if self.task_manager.get_task(&task_id).is_some() {
                continue;
            }

            let pending = task.prepare_resume();
            tracing::info!(
                task_id = %task_id,
                status = %task.status(),
                pending = ?pending,
                "Resuming unfinished task"
            );

            self.task_manager.submit(task).await?;
            task_ids.push(task_id);
        }

        if !task_ids.is_empty() {
            tracing::info!(count = task_ids.len(), "Unfinished tasks resumed");
        }
        Ok(ResumeTasksResponse { task_ids })
    }
}
