//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BotAdapter、TaskManager、TaskRepository、ResultPublisher）
//! - dispatch: 子任务调度（工作池、超时、重试、期限、取消）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - coordinator: 检索协调门面
//! - error: 应用层错误定义

pub mod commands;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    CancelTask, CancelTaskResponse, ResumeTasks, ResumeTasksResponse, SubmitSearch,
    SubmitSearchResponse,
    // Handlers
    handlers::{CancelTaskHandler, ResumeTasksHandler, SubmitSearchHandler},
};

pub use coordinator::{PersistenceSettings, SearchCoordinator};

pub use dispatch::{Dispatcher, DispatcherConfig, TaskSaver, WorkerPool};

pub use error::ApplicationError;

pub use ports::{
    // Bot adapter
    BotAdapterPort,
    BotError,
    BotRoster,
    // Result publisher
    PublishError,
    PublishStatus,
    ResultPublisherPort,
    // Task manager
    TaskManagerError,
    TaskManagerPort,
    // Task repository
    RepositoryError,
    TaskRepositoryPort,
};

pub use queries::{
    GetTaskStatus, ListDatabases,
    // Handlers
    handlers::{DatabaseInfo, GetTaskStatusHandler, ListDatabasesHandler},
};
