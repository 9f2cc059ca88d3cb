//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Search Context: 检索请求与校验
//! - Patent Context: 专利记录与号码规范化
//! - Task Context: 检索任务状态机
//!
//! 以及纯函数形式的结果合并与重试策略。

pub mod aggregation;
pub mod patent;
pub mod retry;
pub mod search;
pub mod task;

pub use aggregation::{aggregate, AggregatedResult, AggregationStats, DatabaseSummary, ResultOutcome};
pub use retry::{RetryDecision, RetryPolicy};
