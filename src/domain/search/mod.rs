//! Search Context - 检索请求限界上下文
//!
//! 职责:
//! - 检索请求建模
//! - 数据库标识与结果选项
//! - 请求校验（任务创建前）

mod errors;
mod request;
mod value_objects;

pub use errors::RequestValidationError;
pub use request::SearchRequest;
pub use value_objects::{DatabaseId, DateRange, SearchOptions, MAX_RESULTS_LIMIT};
