//! Dispatcher - 子任务扇出与收敛
//!
//! 每个目标数据库一个执行单元（tokio task），统一收集在 `JoinSet` 中。
//! 任务期限、所有者取消与宽限期在同一个 `select!` 循环中处理。

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{TaskSaver, WorkerPool};
use crate::application::error::ApplicationError;
use crate::application::ports::{BotAdapterPort, BotError, BotRoster, TaskManagerPort};
use crate::domain::search::{DatabaseId, SearchRequest};
use crate::domain::task::{
    DispatchReport, SubTaskError, SubTaskErrorKind, SubTaskOutcome, Task, TaskId,
};
use crate::domain::{RetryDecision, RetryPolicy};

/// 调度器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 单个子任务的执行时限（取得工作槽位后开始计时，包含所有重试与退避）
    pub sub_task_timeout: Duration,
    /// 任务整体期限
    pub task_deadline: Duration,
    /// 发出取消信号后等待子任务返回的宽限期
    pub cancel_grace: Duration,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            sub_task_timeout: Duration::from_secs(180),
            task_deadline: Duration::from_secs(600),
            cancel_grace: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopCause {
    Owner,
    Deadline,
}

/// 调度器
///
/// 只修改自己派生的子任务，子任务错误不会向外传播
pub struct Dispatcher {
    config: DispatcherConfig,
    roster: BotRoster,
    pool: WorkerPool,
    task_manager: Arc<dyn TaskManagerPort>,
    saver: TaskSaver,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        roster: BotRoster,
        pool: WorkerPool,
        task_manager: Arc<dyn TaskManagerPort>,
        saver: TaskSaver,
    ) -> Self {
        Self {
            config,
            roster,
            pool,
            task_manager,
            saver,
        }
    }

    /// 执行任务中所有未结束的子任务，直到全部进入终态
    ///
    /// 任务须已处于 running 状态
    pub async fn dispatch(&self, task_id: &TaskId) -> Result<DispatchReport, ApplicationError> {
        let snapshot = self
            .task_manager
            .get_task(task_id)
            .ok_or_else(|| ApplicationError::not_found("Task", task_id.as_str()))?;

        let owner = self
            .task_manager
            .cancellation_token(task_id)
            .unwrap_or_default();
        let run = owner.child_token();
        let request = Arc::new(snapshot.request().clone());
        let pending = snapshot.pending_databases();

        tracing::info!(
            task_id = %task_id,
            databases = ?pending,
            deadline_secs = self.config.task_deadline.as_secs(),
            "Dispatching sub-tasks"
        );

        let mut units = JoinSet::new();
        for database in pending {
            let unit = Unit {
                task_id: task_id.clone(),
                database,
                adapter: self.roster.get(database),
                request: request.clone(),
                pool: self.pool.clone(),
                task_manager: self.task_manager.clone(),
                owner: owner.clone(),
                run: run.clone(),
                timeout: self.config.sub_task_timeout,
                grace: self.config.cancel_grace,
                retry: self.config.retry.clone(),
                prior_attempts: snapshot
                    .sub_task(database)
                    .map(|s| s.attempts())
                    .unwrap_or(0),
            };
            units.spawn(unit.run());
        }

        let deadline = Instant::now() + self.config.task_deadline;
        let mut stop_cause: Option<StopCause> = None;
        let mut grace_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                joined = units.join_next() => match joined {
                    None => break,
                    Some(Ok((database, outcome))) => self.settle(task_id, database, outcome).await,
                    Some(Err(e)) => {
                        tracing::warn!(task_id = %task_id, error = %e, "Sub-task unit aborted");
                    }
                },
                _ = owner.cancelled(), if stop_cause.is_none() => {
                    tracing::info!(
                        task_id = %task_id,
                        remaining = units.len(),
                        "Task cancelled by owner, stopping sub-tasks"
                    );
                    stop_cause = Some(StopCause::Owner);
                    run.cancel();
                    grace_deadline = Some(Instant::now() + self.config.cancel_grace);
                }
                _ = tokio::time::sleep_until(deadline), if stop_cause.is_none() => {
                    tracing::warn!(
                        task_id = %task_id,
                        remaining = units.len(),
                        "Task deadline exceeded, stopping sub-tasks"
                    );
                    stop_cause = Some(StopCause::Deadline);
                    run.cancel();
                    grace_deadline = Some(Instant::now() + self.config.cancel_grace);
                }
                _ = wait_until(grace_deadline), if grace_deadline.is_some() => {
                    tracing::warn!(
                        task_id = %task_id,
                        remaining = units.len(),
                        "Grace period elapsed, aborting remaining sub-tasks"
                    );
                    units.abort_all();
                    grace_deadline = None;
                }
            }
        }

        // 被中止的单元没有上报结果，按停止原因补齐终态
        let leftover = self
            .task_manager
            .get_task(task_id)
            .map(|task| task.pending_databases())
            .unwrap_or_default();
        for database in leftover {
            let outcome = match stop_cause {
                Some(StopCause::Owner) => SubTaskOutcome::Cancelled("cancelled by owner".to_string()),
                Some(StopCause::Deadline) => {
                    SubTaskOutcome::TimedOut("task deadline exceeded".to_string())
                }
                None => SubTaskOutcome::Failed(SubTaskError::internal(
                    "sub-task unit ended without reporting",
                )),
            };
            self.settle(task_id, database, outcome).await;
        }

        Ok(DispatchReport {
            owner_cancelled: owner.is_cancelled(),
            deadline_exceeded: stop_cause == Some(StopCause::Deadline),
        })
    }

    /// 记录子任务终态并保存检查点
    async fn settle(&self, task_id: &TaskId, database: DatabaseId, outcome: SubTaskOutcome) {
        let status = outcome.status();
        let mut outcome = Some(outcome);
        let updated = self.task_manager.update(task_id, &mut |task: &mut Task| {
            match outcome.take() {
                Some(outcome) => task.settle_sub_task(database, outcome),
                None => Ok(()),
            }
        });

        match updated {
            Ok(snapshot) => {
                tracing::info!(
                    task_id = %task_id,
                    database = %database,
                    status = %status,
                    progress = snapshot.progress(),
                    "Sub-task settled"
                );
                if let Err(e) = self.saver.save(&snapshot).await {
                    tracing::warn!(task_id = %task_id, error = %e, "Checkpoint save failed");
                }
            }
            Err(e) => {
                tracing::error!(
                    task_id = %task_id,
                    database = %database,
                    error = %e,
                    "Failed to settle sub-task"
                );
            }
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// 单个子任务的执行单元
struct Unit {
    task_id: TaskId,
    database: DatabaseId,
    adapter: Option<Arc<dyn BotAdapterPort>>,
    request: Arc<SearchRequest>,
    pool: WorkerPool,
    task_manager: Arc<dyn TaskManagerPort>,
    owner: CancellationToken,
    run: CancellationToken,
    timeout: Duration,
    grace: Duration,
    retry: RetryPolicy,
    /// 重启前已记录的尝试次数，计入重试上限
    prior_attempts: u32,
}

impl Unit {
    async fn run(self) -> (DatabaseId, SubTaskOutcome) {
        let database = self.database;
        (database, self.execute().await)
    }

    async fn execute(self) -> SubTaskOutcome {
        let Some(adapter) = self.adapter.clone() else {
            tracing::warn!(
                task_id = %self.task_id,
                database = %self.database,
                "No bot registered for database"
            );
            return SubTaskOutcome::Failed(SubTaskError::permanent(format!(
                "no bot registered for database {}",
                self.database
            )));
        };

        let max_attempts = self.retry.max_attempts();
        if self.prior_attempts >= max_attempts {
            tracing::warn!(
                task_id = %self.task_id,
                database = %self.database,
                attempts = self.prior_attempts,
                "Retry budget already spent before restart"
            );
            // 恢复前仍在执行，说明之前的失败都是暂时性错误
            return SubTaskOutcome::Failed(SubTaskError::transient(format!(
                "gave up after {} attempts before restart",
                self.prior_attempts
            )));
        }

        // 排队等待槽位不计入子任务时限
        let _permit = tokio::select! {
            permit = self.pool.acquire() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    return SubTaskOutcome::Failed(SubTaskError::internal(format!(
                        "worker pool closed: {e}"
                    )));
                }
            },
            _ = self.run.cancelled() => return self.stopped_outcome(),
        };

        let database = self.database;
        if let Err(e) = self
            .task_manager
            .update(&self.task_id, &mut |task: &mut Task| task.start_sub_task(database))
        {
            tracing::warn!(
                task_id = %self.task_id,
                database = %database,
                error = %e,
                "Failed to mark sub-task running"
            );
        }

        // 子任务自己的令牌：超时只停止本子任务的机器人
        let ctx = self.run.child_token();
        let attempts = self.attempt_loop(adapter.as_ref(), &ctx);
        tokio::pin!(attempts);

        match tokio::time::timeout(self.timeout, &mut attempts).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    database = %database,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Sub-task timed out, stopping bot"
                );
                ctx.cancel();
                if tokio::time::timeout(self.grace, &mut attempts).await.is_err() {
                    tracing::warn!(
                        task_id = %self.task_id,
                        database = %database,
                        grace_ms = self.grace.as_millis() as u64,
                        "Bot did not stop within grace period"
                    );
                }
                SubTaskOutcome::TimedOut(format!("sub-task timeout of {:?} exceeded", self.timeout))
            }
        }
    }

    /// `ctx` 为 `run` 的子令牌，任务级停止信号同样会传到这里
    async fn attempt_loop(
        &self,
        adapter: &dyn BotAdapterPort,
        ctx: &CancellationToken,
    ) -> SubTaskOutcome {
        let database = self.database;
        let mut attempts = self.prior_attempts;

        loop {
            if ctx.is_cancelled() {
                return self.stopped_outcome();
            }

            attempts += 1;
            if let Err(e) = self
                .task_manager
                .update(&self.task_id, &mut |task: &mut Task| task.record_attempt(database))
            {
                tracing::debug!(task_id = %self.task_id, error = %e, "Failed to record attempt");
            }

            tracing::debug!(
                task_id = %self.task_id,
                database = %database,
                attempt = attempts,
                adapter = adapter.name(),
                "Calling bot adapter"
            );

            let call = AssertUnwindSafe(adapter.search(ctx.clone(), database, &self.request))
                .catch_unwind()
                .await;

            let err = match call {
                Ok(Ok(records)) => {
                    tracing::info!(
                        task_id = %self.task_id,
                        database = %database,
                        attempt = attempts,
                        records = records.len(),
                        "Bot search succeeded"
                    );
                    return SubTaskOutcome::Succeeded(records);
                }
                Ok(Err(BotError::Cancelled)) => return self.stopped_outcome(),
                Ok(Err(e)) => e,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        task_id = %self.task_id,
                        database = %database,
                        attempt = attempts,
                        panic = %message,
                        "Bot adapter panicked"
                    );
                    return SubTaskOutcome::Failed(SubTaskError::internal(format!(
                        "bot adapter panicked: {message}"
                    )));
                }
            };

            match self.retry.decide(attempts, err.kind()) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        database = %database,
                        attempt = attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Transient bot error, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancelled() => return self.stopped_outcome(),
                    }
                }
                RetryDecision::GiveUp => {
                    tracing::warn!(
                        task_id = %self.task_id,
                        database = %database,
                        attempt = attempts,
                        error = %err,
                        "Bot search failed"
                    );
                    return SubTaskOutcome::Failed(err.into());
                }
            }
        }
    }

    /// 收到停止信号后的终态：所有者取消为 cancelled，期限到达为 timed_out
    fn stopped_outcome(&self) -> SubTaskOutcome {
        if self.owner.is_cancelled() {
            SubTaskOutcome::Cancelled("cancelled by owner".to_string())
        } else if self.run.is_cancelled() {
            SubTaskOutcome::TimedOut("task deadline exceeded".to_string())
        } else {
            SubTaskOutcome::Failed(SubTaskError::new(
                SubTaskErrorKind::Cancelled,
                "bot stopped without a cancellation request",
            ))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
