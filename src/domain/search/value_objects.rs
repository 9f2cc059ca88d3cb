//! Search Context - Value Objects

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 专利数据库标识
///
/// 排序按声明顺序，聚合与持久化时依赖这一确定顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseId {
    /// 中华民国专利检索系统
    Twpat,
    /// 美国专利商标局
    Uspto,
    /// 欧洲专利局
    Epo,
    /// 世界知识产权组织
    Wipo,
    /// 日本特许厅
    #[serde(alias = "jpo")]
    Jpat,
    /// 中国国家知识产权局
    Cnipa,
    /// 韩国特许厅
    Kipo,
}

impl DatabaseId {
    pub const ALL: [DatabaseId; 7] = [
        DatabaseId::Twpat,
        DatabaseId::Uspto,
        DatabaseId::Epo,
        DatabaseId::Wipo,
        DatabaseId::Jpat,
        DatabaseId::Cnipa,
        DatabaseId::Kipo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseId::Twpat => "twpat",
            DatabaseId::Uspto => "uspto",
            DatabaseId::Epo => "epo",
            DatabaseId::Wipo => "wipo",
            DatabaseId::Jpat => "jpat",
            DatabaseId::Cnipa => "cnipa",
            DatabaseId::Kipo => "kipo",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twpat" => Some(DatabaseId::Twpat),
            "uspto" => Some(DatabaseId::Uspto),
            "epo" => Some(DatabaseId::Epo),
            "wipo" => Some(DatabaseId::Wipo),
            "jpat" | "jpo" => Some(DatabaseId::Jpat),
            "cnipa" => Some(DatabaseId::Cnipa),
            "kipo" => Some(DatabaseId::Kipo),
            _ => None,
        }
    }

    /// 展示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            DatabaseId::Twpat => "Taiwan Patent Search System",
            DatabaseId::Uspto => "United States Patent and Trademark Office",
            DatabaseId::Epo => "European Patent Office",
            DatabaseId::Wipo => "World Intellectual Property Organization",
            DatabaseId::Jpat => "Japan Patent Office",
            DatabaseId::Cnipa => "China National Intellectual Property Administration",
            DatabaseId::Kipo => "Korean Intellectual Property Office",
        }
    }
}

impl std::fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 日期范围（闭区间，两端均可省略）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// 起始日期晚于结束日期
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

/// 单次检索的最大结果数上限
pub const MAX_RESULTS_LIMIT: usize = 1000;

fn default_max_results() -> usize {
    100
}

/// 检索结果选项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// 聚合后保留的最大结果数
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// 是否包含全文
    #[serde(default)]
    pub include_full_text: bool,

    /// 是否包含图片
    #[serde(default)]
    pub include_images: bool,

    /// 是否包含申请专利范围
    #[serde(default)]
    pub include_claims: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            include_full_text: false,
            include_images: false,
            include_claims: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_id_parsing() {
        assert_eq!(DatabaseId::from_str("USPTO"), Some(DatabaseId::Uspto));
        assert_eq!(DatabaseId::from_str(" twpat "), Some(DatabaseId::Twpat));
        assert_eq!(DatabaseId::from_str("jpo"), Some(DatabaseId::Jpat));
        assert_eq!(DatabaseId::from_str("google"), None);

        for id in DatabaseId::ALL {
            assert_eq!(DatabaseId::from_str(id.as_str()), Some(id));
        }
    }

    #[test]
    fn test_database_id_serde_alias() {
        let id: DatabaseId = serde_json::from_str("\"jpo\"").unwrap();
        assert_eq!(id, DatabaseId::Jpat);
        assert_eq!(serde_json::to_string(&DatabaseId::Jpat).unwrap(), "\"jpat\"");
    }

    #[test]
    fn test_date_range() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        let range = DateRange::new(Some(d("2020-01-01")), Some(d("2020-12-31")));
        assert!(!range.is_inverted());
        assert!(range.contains(d("2020-06-01")));
        assert!(!range.contains(d("2021-01-01")));

        let inverted = DateRange::new(Some(d("2021-01-01")), Some(d("2020-01-01")));
        assert!(inverted.is_inverted());

        let open = DateRange::new(None, Some(d("2020-01-01")));
        assert!(open.contains(d("1999-01-01")));
    }
}
