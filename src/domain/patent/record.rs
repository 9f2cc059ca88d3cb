//! Patent Context - PatentRecord

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::canonical_number;
use crate::domain::search::DatabaseId;

/// 单笔专利记录
///
/// `patent_number` 带数据库前缀（如 `USPTO:US10123456`），
/// `canonical_number` 用于跨数据库去重。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatentRecord {
    pub patent_number: String,
    pub canonical_number: String,
    pub title: String,
    #[serde(default)]
    pub applicants: Vec<String>,
    #[serde(default)]
    pub inventors: Vec<String>,
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub ipc_classes: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    pub source_database: DatabaseId,
    /// 找到该专利的数据库集合（合并后为并集）
    pub sources: BTreeSet<DatabaseId>,
    /// 相关度 0-100
    pub relevance_score: f64,
}

impl PatentRecord {
    /// 由数据库返回的原始号码创建记录
    pub fn new(source: DatabaseId, raw_number: &str, title: impl Into<String>) -> Self {
        let raw_number = raw_number.trim();
        let unqualified = match raw_number.rfind(':') {
            Some(pos) => raw_number[pos + 1..].trim(),
            None => raw_number,
        };

        Self {
            patent_number: format!("{}:{}", source.as_str().to_uppercase(), unqualified),
            canonical_number: canonical_number(raw_number),
            title: title.into(),
            applicants: Vec::new(),
            inventors: Vec::new(),
            application_date: None,
            publication_date: None,
            ipc_classes: Vec::new(),
            abstract_text: String::new(),
            source_database: source,
            sources: BTreeSet::from([source]),
            relevance_score: 0.0,
        }
    }

    pub fn with_applicants(mut self, applicants: Vec<String>) -> Self {
        self.applicants = applicants;
        self
    }

    pub fn with_inventors(mut self, inventors: Vec<String>) -> Self {
        self.inventors = inventors;
        self
    }

    pub fn with_application_date(mut self, date: Option<NaiveDate>) -> Self {
        self.application_date = date;
        self
    }

    pub fn with_publication_date(mut self, date: Option<NaiveDate>) -> Self {
        self.publication_date = date;
        self
    }

    pub fn with_ipc_classes(mut self, classes: Vec<String>) -> Self {
        self.ipc_classes = classes;
        self
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// 设置相关度，超出 0-100 时截断
    pub fn with_score(mut self, score: f64) -> Self {
        self.relevance_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 100.0) };
        self
    }

    /// 已填写的可选字段数
    pub fn populated_fields(&self) -> usize {
        [
            !self.applicants.is_empty(),
            !self.inventors.is_empty(),
            self.application_date.is_some(),
            self.publication_date.is_some(),
            !self.ipc_classes.is_empty(),
            !self.abstract_text.is_empty(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }

    /// 记录丰富度：摘要长度、IPC 分类数、已填写字段数，按字典序比较
    pub fn richness(&self) -> (usize, usize, usize) {
        (
            self.abstract_text.chars().count(),
            self.ipc_classes.len(),
            self.populated_fields(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_qualified() {
        let record = PatentRecord::new(DatabaseId::Uspto, "US10123456B2", "Battery cell");

        assert_eq!(record.patent_number, "USPTO:US10123456B2");
        assert_eq!(record.canonical_number, "US10123456");
        assert_eq!(record.sources, BTreeSet::from([DatabaseId::Uspto]));
    }

    #[test]
    fn test_requalifies_prefixed_number() {
        let record = PatentRecord::new(DatabaseId::Twpat, "twpat: TWI654321B", "散热模组");
        assert_eq!(record.patent_number, "TWPAT:TWI654321B");
        assert_eq!(record.canonical_number, "TWI654321");
    }

    #[test]
    fn test_score_is_clamped() {
        let record = PatentRecord::new(DatabaseId::Epo, "EP1", "x");
        assert_eq!(record.clone().with_score(120.0).relevance_score, 100.0);
        assert_eq!(record.clone().with_score(-3.0).relevance_score, 0.0);
        assert_eq!(record.with_score(f64::NAN).relevance_score, 0.0);
    }

    #[test]
    fn test_richness_ordering() {
        let plain = PatentRecord::new(DatabaseId::Epo, "EP1", "x");
        let rich = plain
            .clone()
            .with_abstract("A longer abstract")
            .with_ipc_classes(vec!["H01M".into()]);

        assert!(rich.richness() > plain.richness());
        assert_eq!(rich.populated_fields(), 2);
    }

    #[test]
    fn test_abstract_serialized_name() {
        let record = PatentRecord::new(DatabaseId::Wipo, "WO2020123456", "x").with_abstract("abc");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["abstract"], "abc");
        assert_eq!(json["source_database"], "wipo");
    }
}
