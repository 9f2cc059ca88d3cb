//! Patent Coordinator - 多数据库专利检索任务协调
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Search Context: 检索请求与校验
//! - Patent Context: 专利记录与号码规范化
//! - Task Context: 任务/子任务状态机
//! - 结果合并与重试策略（纯函数）
//!
//! 应用层 (application/):
//! - Ports: BotAdapter, TaskManager, TaskRepository, ResultPublisher
//! - Dispatch: 工作池、超时、重试、期限与取消
//! - Commands / Queries: CQRS 处理器
//! - SearchCoordinator: 协调门面
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API
//! - Memory: TaskManager 内存实现与工作队列
//! - Worker: SearchWorker 后台任务处理
//! - Persistence: SQLite 任务存储 + Sled 结果发件箱
//! - Adapters: HTTP / Fake 检索机器人

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
