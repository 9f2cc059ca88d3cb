//! Patent Context - 专利记录限界上下文
//!
//! 职责:
//! - 专利记录建模
//! - 跨数据库号码规范化

mod canonical;
mod record;

pub use canonical::canonical_number;
pub use record::PatentRecord;
