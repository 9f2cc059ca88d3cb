//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod bot_adapter;
mod result_publisher;
mod task_manager;
mod task_repository;

pub use bot_adapter::{BotAdapterPort, BotError, BotRoster};
pub use result_publisher::{PublishError, PublishStatus, ResultPublisherPort};
pub use task_manager::{TaskManagerError, TaskManagerPort};
pub use task_repository::{RepositoryError, TaskRepositoryPort};
