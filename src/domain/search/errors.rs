//! Search Context - Errors

use chrono::NaiveDate;
use thiserror::Error;

use super::DatabaseId;

/// 检索请求校验错误
///
/// 在任务创建之前拒绝，不会重试
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("至少需要指定一个目标数据库")]
    NoTargetDatabases,

    #[error("不支持的数据库: {0}")]
    UnsupportedDatabase(DatabaseId),

    #[error("必须提供关键字、专利号码或筛选条件其中之一")]
    MissingCriteria,

    #[error("无效的日期范围: {start} 晚于 {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("无效的最大结果数: {0} (允许 1..=1000)")]
    InvalidMaxResults(usize),
}
