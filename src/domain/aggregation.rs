//! Result Aggregation - 结果合并与去重
//!
//! 按规范专利号分组合并各数据库的成功结果，排序并截断。
//! 对相同输入总是产生相同输出。

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::patent::PatentRecord;
use crate::domain::search::DatabaseId;
use crate::domain::task::{SubTask, SubTaskError, SubTaskStatus};

/// 单个数据库的贡献概要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub status: SubTaskStatus,
    /// 该数据库返回的原始记录数
    pub contributed: usize,
    pub error: Option<SubTaskError>,
}

/// 合并统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationStats {
    /// 所有成功数据库的原始记录总数
    pub total_found: usize,
    /// 截断前去重后的记录数
    pub merged_count: usize,
    pub deduplication_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOutcome {
    Complete,
    Partial,
}

/// 合并后的检索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub records: Vec<PatentRecord>,
    pub database_summary: BTreeMap<DatabaseId, DatabaseSummary>,
    /// 存在未成功的子任务
    pub partial: bool,
    pub stats: AggregationStats,
}

impl AggregatedResult {
    pub fn outcome(&self) -> ResultOutcome {
        if self.partial {
            ResultOutcome::Partial
        } else {
            ResultOutcome::Complete
        }
    }
}

/// 合并子任务结果
pub fn aggregate<'a>(
    sub_tasks: impl IntoIterator<Item = &'a SubTask>,
    max_results: usize,
) -> AggregatedResult {
    let mut database_summary = BTreeMap::new();
    let mut groups: BTreeMap<String, Vec<&PatentRecord>> = BTreeMap::new();
    let mut total_found = 0;
    let mut partial = false;

    for sub_task in sub_tasks {
        let succeeded = sub_task.status() == SubTaskStatus::Succeeded;
        partial |= !succeeded;

        // 无法规范化的号码不能去重，直接丢弃
        let identifiable: Vec<&PatentRecord> = if succeeded {
            sub_task
                .raw_results()
                .iter()
                .filter(|record| !record.canonical_number.is_empty())
                .collect()
        } else {
            Vec::new()
        };
        let contributed = identifiable.len();
        database_summary.insert(
            sub_task.database_id(),
            DatabaseSummary {
                status: sub_task.status(),
                contributed,
                error: sub_task.error().cloned(),
            },
        );

        if !succeeded {
            continue;
        }
        total_found += contributed;
        for record in identifiable {
            groups
                .entry(record.canonical_number.clone())
                .or_default()
                .push(record);
        }
    }

    let merged_count = groups.len();
    let mut records: Vec<PatentRecord> = groups.into_values().map(merge_group).collect();
    records.sort_by(compare_records);
    records.truncate(max_results);

    let deduplication_ratio = if total_found == 0 {
        0.0
    } else {
        (total_found - merged_count) as f64 / total_found as f64
    };

    AggregatedResult {
        records,
        database_summary,
        partial,
        stats: AggregationStats {
            total_found,
            merged_count,
            deduplication_ratio,
        },
    }
}

/// 合并同一专利的多个副本
///
/// 保留最丰富的副本，并列时取 (来源数据库, 专利号) 最小者；
/// 其余副本补齐空字段，来源取并集，相关度取最大值。
fn merge_group(mut copies: Vec<&PatentRecord>) -> PatentRecord {
    copies.sort_by(|a, b| {
        a.source_database
            .cmp(&b.source_database)
            .then_with(|| a.patent_number.cmp(&b.patent_number))
    });

    let mut best = 0;
    for (index, copy) in copies.iter().enumerate().skip(1) {
        if copy.richness() > copies[best].richness() {
            best = index;
        }
    }

    let mut merged = copies[best].clone();
    for (index, other) in copies.iter().enumerate() {
        if index == best {
            continue;
        }
        fill_missing(&mut merged, other);
        merged.sources.extend(other.sources.iter().copied());
        if other.relevance_score > merged.relevance_score {
            merged.relevance_score = other.relevance_score;
        }
    }
    merged
}

fn fill_missing(target: &mut PatentRecord, other: &PatentRecord) {
    if target.abstract_text.is_empty() {
        target.abstract_text = other.abstract_text.clone();
    }
    if target.application_date.is_none() {
        target.application_date = other.application_date;
    }
    if target.publication_date.is_none() {
        target.publication_date = other.publication_date;
    }
    if target.applicants.is_empty() {
        target.applicants = other.applicants.clone();
    }
    if target.inventors.is_empty() {
        target.inventors = other.inventors.clone();
    }
    if target.ipc_classes.is_empty() {
        target.ipc_classes = other.ipc_classes.clone();
    }
}

/// 相关度降序，申请日升序（无日期排最后），规范号字典序
fn compare_records(a: &PatentRecord, b: &PatentRecord) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| match (a.application_date, b.application_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.canonical_number.cmp(&b.canonical_number))
}
