//! Search Context - SearchRequest

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{DatabaseId, DateRange, RequestValidationError, SearchOptions, MAX_RESULTS_LIMIT};

/// 专利检索请求
///
/// 被接受之后不可变：任务只以只读方式持有它
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// 检索关键字
    #[serde(default)]
    pub keywords: Vec<String>,

    /// 专利号码
    #[serde(default)]
    pub patent_number: Option<String>,

    /// 申请人筛选
    #[serde(default)]
    pub applicants: Vec<String>,

    /// 发明人筛选
    #[serde(default)]
    pub inventors: Vec<String>,

    /// IPC 分类筛选
    #[serde(default)]
    pub ipc_classes: Vec<String>,

    /// 日期范围
    #[serde(default)]
    pub date_range: Option<DateRange>,

    /// 目标数据库（去重）
    pub databases: BTreeSet<DatabaseId>,

    /// 结果选项
    #[serde(default)]
    pub options: SearchOptions,
}

impl SearchRequest {
    pub fn new(databases: impl IntoIterator<Item = DatabaseId>) -> Self {
        Self {
            keywords: Vec::new(),
            patent_number: None,
            applicants: Vec::new(),
            inventors: Vec::new(),
            ipc_classes: Vec::new(),
            date_range: None,
            databases: databases.into_iter().collect(),
            options: SearchOptions::default(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_patent_number(mut self, number: impl Into<String>) -> Self {
        self.patent_number = Some(number.into());
        self
    }

    pub fn with_applicants<I, S>(mut self, applicants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicants = applicants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.options.max_results = max_results;
        self
    }

    /// 是否提供了任何检索条件
    pub fn has_criteria(&self) -> bool {
        !self.keywords.is_empty()
            || self.patent_number.is_some()
            || !self.applicants.is_empty()
            || !self.inventors.is_empty()
            || !self.ipc_classes.is_empty()
    }

    /// 规范化并校验请求
    ///
    /// 去除空白条目后依次检查：目标数据库、是否受支持、检索条件、日期范围、结果数上限。
    /// `supported` 为启动时注册的数据库名册。
    pub fn validate(mut self, supported: &[DatabaseId]) -> Result<Self, RequestValidationError> {
        self.keywords = clean_terms(self.keywords);
        self.applicants = clean_terms(self.applicants);
        self.inventors = clean_terms(self.inventors);
        self.ipc_classes = clean_terms(self.ipc_classes)
            .into_iter()
            .map(|class| class.to_uppercase())
            .collect();
        self.patent_number = self
            .patent_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if self.databases.is_empty() {
            return Err(RequestValidationError::NoTargetDatabases);
        }

        if let Some(unsupported) = self.databases.iter().find(|db| !supported.contains(db)) {
            return Err(RequestValidationError::UnsupportedDatabase(*unsupported));
        }

        if !self.has_criteria() {
            return Err(RequestValidationError::MissingCriteria);
        }

        if let Some(range) = &self.date_range {
            if let (Some(start), Some(end)) = (range.start, range.end) {
                if start > end {
                    return Err(RequestValidationError::InvalidDateRange { start, end });
                }
            }
        }

        if self.options.max_results == 0 || self.options.max_results > MAX_RESULTS_LIMIT {
            return Err(RequestValidationError::InvalidMaxResults(
                self.options.max_results,
            ));
        }

        Ok(self)
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ROSTER: [DatabaseId; 3] = [DatabaseId::Uspto, DatabaseId::Twpat, DatabaseId::Epo];

    #[test]
    fn test_valid_request_is_normalized() {
        let request = SearchRequest::new([DatabaseId::Uspto, DatabaseId::Twpat, DatabaseId::Uspto])
            .with_keywords(["  artificial intelligence ", "", "artificial intelligence", "人工智慧"])
            .with_patent_number("   ");

        let request = request.validate(&ROSTER).unwrap();

        assert_eq!(request.databases.len(), 2);
        assert_eq!(request.keywords, vec!["artificial intelligence", "人工智慧"]);
        assert_eq!(request.patent_number, None);
    }

    #[test]
    fn test_no_databases_rejected() {
        let request = SearchRequest::new([]).with_keywords(["battery"]);
        assert_eq!(
            request.validate(&ROSTER),
            Err(RequestValidationError::NoTargetDatabases)
        );
    }

    #[test]
    fn test_unsupported_database_rejected() {
        let request = SearchRequest::new([DatabaseId::Kipo]).with_keywords(["battery"]);
        assert_eq!(
            request.validate(&ROSTER),
            Err(RequestValidationError::UnsupportedDatabase(DatabaseId::Kipo))
        );
    }

    #[test]
    fn test_missing_criteria_rejected() {
        let request = SearchRequest::new([DatabaseId::Uspto]).with_keywords(["  "]);
        assert_eq!(
            request.validate(&ROSTER),
            Err(RequestValidationError::MissingCriteria)
        );
    }

    #[test]
    fn test_applicant_filter_counts_as_criteria() {
        let request = SearchRequest::new([DatabaseId::Uspto]).with_applicants(["ACME Corp"]);
        assert!(request.validate(&ROSTER).is_ok());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let request = SearchRequest::new([DatabaseId::Uspto])
            .with_keywords(["battery"])
            .with_date_range(DateRange::new(Some(start), Some(end)));

        assert_eq!(
            request.validate(&ROSTER),
            Err(RequestValidationError::InvalidDateRange { start, end })
        );
    }

    #[test]
    fn test_max_results_bounds() {
        let base = SearchRequest::new([DatabaseId::Uspto]).with_keywords(["battery"]);

        assert_eq!(
            base.clone().with_max_results(0).validate(&ROSTER),
            Err(RequestValidationError::InvalidMaxResults(0))
        );
        assert_eq!(
            base.clone().with_max_results(1001).validate(&ROSTER),
            Err(RequestValidationError::InvalidMaxResults(1001))
        );
        assert!(base.with_max_results(1000).validate(&ROSTER).is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{"keywords": ["solar"], "databases": ["uspto", "jpo"]}"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.options.max_results, 100);
        assert!(request.databases.contains(&DatabaseId::Jpat));
        assert!(request.date_range.is_none());
    }
}
