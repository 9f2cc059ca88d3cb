//! HTTP Bot Adapter - 通过自动化控制台驱动检索机器人
//!
//! 实现 BotAdapterPort trait，每个数据库对应控制台上的一个机器人
//!
//! 控制台 API:
//! POST {control_room}/v3/activity/orchestrator/execution
//!   Request: {"fileId": "...", "botInput": {"targetDatabase": "...", "searchParameters": {...}, "options": {...}}}
//!   Response: {"deploymentId": "..."}
//! GET  {control_room}/v3/activity/orchestrator/execution/{id}
//!   Response: {"status": "running|completed|failed|...", "botOutput": {"results": [...]}, "error": "...", "retryable": false}
//! POST {control_room}/v3/activity/orchestrator/execution/{id}/cancel

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BotAdapterPort, BotError};
use crate::domain::patent::PatentRecord;
use crate::domain::search::{DatabaseId, SearchOptions, SearchRequest};

/// 提交执行请求体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionRequest<'a> {
    file_id: &'a str,
    bot_input: BotInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BotInput<'a> {
    target_database: DatabaseId,
    search_parameters: SearchParameters<'a>,
    options: &'a SearchOptions,
}

#[derive(Debug, Serialize)]
struct SearchParameters<'a> {
    keywords: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    patent_number: Option<&'a str>,
    applicants: &'a [String],
    inventors: &'a [String],
    ipc_classes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionCreated {
    deployment_id: String,
}

/// 执行状态响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    bot_output: Option<BotOutput>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    retryable: bool,
}

#[derive(Debug, Deserialize)]
struct BotOutput {
    #[serde(default)]
    results: Vec<BotRecord>,
}

/// 机器人输出的单条专利
#[derive(Debug, Deserialize)]
struct BotRecord {
    #[serde(default, alias = "patentNumber")]
    patent_number: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "abstract")]
    abstract_text: String,
    #[serde(default)]
    applicants: Vec<String>,
    #[serde(default)]
    inventors: Vec<String>,
    #[serde(default, alias = "applicationDate")]
    application_date: Option<String>,
    #[serde(default, alias = "publicationDate")]
    publication_date: Option<String>,
    #[serde(default, alias = "ipcClasses")]
    ipc_classes: Vec<String>,
    #[serde(default, alias = "relevanceScore")]
    relevance_score: Option<f64>,
}

/// 远端执行的阶段
#[derive(Debug, PartialEq, Eq)]
enum ExecutionPhase {
    InFlight,
    Succeeded,
    Failed,
}

fn phase_of(status: &str) -> Option<ExecutionPhase> {
    match status.trim().to_ascii_lowercase().as_str() {
        "running" | "in_progress" | "queued" | "pending" => Some(ExecutionPhase::InFlight),
        "completed" | "success" => Some(ExecutionPhase::Succeeded),
        "failed" | "error" | "cancelled" => Some(ExecutionPhase::Failed),
        _ => None,
    }
}

/// HTTP Bot Adapter 配置
#[derive(Debug, Clone)]
pub struct HttpBotAdapterConfig {
    /// 控制台基础 URL
    pub control_room_url: String,
    /// API Key（X-Authorization）
    pub api_key: String,
    /// 数据库 → 机器人文件 ID
    pub bot_ids: BTreeMap<DatabaseId, String>,
    /// 状态轮询间隔
    pub poll_interval: Duration,
    /// 单个 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for HttpBotAdapterConfig {
    fn default() -> Self {
        Self {
            control_room_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            bot_ids: BTreeMap::new(),
            poll_interval: Duration::from_secs(5),
            request_timeout_secs: 30,
        }
    }
}

impl HttpBotAdapterConfig {
    pub fn new(control_room_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            control_room_url: control_room_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_bot(mut self, database: DatabaseId, bot_id: impl Into<String>) -> Self {
        self.bot_ids.insert(database, bot_id.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

/// HTTP Bot Adapter
pub struct HttpBotAdapter {
    client: Client,
    config: HttpBotAdapterConfig,
}

impl HttpBotAdapter {
    pub fn new(config: HttpBotAdapterConfig) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BotError::Permanent(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn execution_url(&self) -> String {
        format!(
            "{}/v3/activity/orchestrator/execution",
            self.config.control_room_url
        )
    }

    fn status_url(&self, execution_id: &str) -> String {
        format!("{}/{}", self.execution_url(), execution_id)
    }

    fn cancel_url(&self, execution_id: &str) -> String {
        format!("{}/{}/cancel", self.execution_url(), execution_id)
    }

    fn health_url(&self) -> String {
        format!("{}/v1/health", self.config.control_room_url)
    }

    async fn submit(
        &self,
        bot_id: &str,
        database: DatabaseId,
        request: &SearchRequest,
    ) -> Result<String, BotError> {
        let body = ExecutionRequest {
            file_id: bot_id,
            bot_input: BotInput {
                target_database: database,
                search_parameters: SearchParameters {
                    keywords: &request.keywords,
                    patent_number: request.patent_number.as_deref(),
                    applicants: &request.applicants,
                    inventors: &request.inventors,
                    ipc_classes: &request.ipc_classes,
                    date_from: request.date_range.and_then(|r| r.start),
                    date_to: request.date_range.and_then(|r| r.end),
                },
                options: &request.options,
            },
        };

        let response = self
            .client
            .post(self.execution_url())
            .header("X-Authorization", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &error_text));
        }

        let created: ExecutionCreated = response
            .json()
            .await
            .map_err(|e| BotError::Permanent(format!("Malformed execution response: {}", e)))?;
        Ok(created.deployment_id)
    }

    async fn fetch_status(&self, execution_id: &str) -> Result<ExecutionStatus, BotError> {
        let response = self
            .client
            .get(self.status_url(execution_id))
            .header("X-Authorization", &self.config.api_key)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| BotError::Permanent(format!("Malformed status payload: {}", e)))
    }

    /// 尽力通知控制台停止执行，失败只记录日志
    async fn cancel_remote(&self, execution_id: &str) {
        let result = self
            .client
            .post(self.cancel_url(execution_id))
            .header("X-Authorization", &self.config.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(execution_id = %execution_id, "Remote execution cancelled");
            }
            Ok(response) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    status = %response.status(),
                    "Remote cancellation rejected"
                );
            }
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Remote cancellation failed");
            }
        }
    }
}

/// 在取消信号触发时放弃等待
async fn until_cancelled<T, F>(ctx: &CancellationToken, fut: F) -> Result<T, BotError>
where
    F: Future<Output = Result<T, BotError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(BotError::Cancelled),
        result = fut => result,
    }
}

fn map_transport_error(e: reqwest::Error) -> BotError {
    if e.is_timeout() {
        BotError::Transient(format!("Control room request timed out: {}", e))
    } else if e.is_connect() {
        BotError::Transient(format!("Cannot connect to control room: {}", e))
    } else {
        BotError::Transient(e.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &str) -> BotError {
    let message = format!("HTTP {}: {}", status, body);
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        BotError::Transient(message)
    } else {
        BotError::Permanent(message)
    }
}

/// 宽松解析日期，只取前 10 个字符（YYYY-MM-DD）
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// 将机器人输出转换为领域记录，缺少专利号的条目被丢弃
fn into_records(database: DatabaseId, output: BotOutput) -> Vec<PatentRecord> {
    output
        .results
        .into_iter()
        .map(|r| {
            PatentRecord::new(database, r.patent_number.trim(), r.title)
                .with_abstract(r.abstract_text)
                .with_applicants(r.applicants)
                .with_inventors(r.inventors)
                .with_application_date(parse_date(r.application_date.as_deref()))
                .with_publication_date(parse_date(r.publication_date.as_deref()))
                .with_ipc_classes(r.ipc_classes)
                .with_score(r.relevance_score.unwrap_or(0.0))
        })
        // 规范化后为空的专利号无法去重
        .filter(|record| !record.canonical_number.is_empty())
        .collect()
}

/// 解释一次状态响应；`None` 表示仍在执行
fn interpret(
    database: DatabaseId,
    status: ExecutionStatus,
) -> Option<Result<Vec<PatentRecord>, BotError>> {
    match phase_of(&status.status) {
        Some(ExecutionPhase::InFlight) => None,
        Some(ExecutionPhase::Succeeded) => Some(match status.bot_output {
            Some(output) => Ok(into_records(database, output)),
            None => Err(BotError::Permanent(
                "Execution completed without bot output".to_string(),
            )),
        }),
        Some(ExecutionPhase::Failed) => {
            let message = format!(
                "Bot execution {}: {}",
                status.status.to_ascii_lowercase(),
                status.error.unwrap_or_else(|| "no details".to_string())
            );
            Some(Err(if status.retryable {
                BotError::Transient(message)
            } else {
                BotError::Permanent(message)
            }))
        }
        None => Some(Err(BotError::Permanent(format!(
            "Unknown execution status: {}",
            status.status
        )))),
    }
}

#[async_trait]
impl BotAdapterPort for HttpBotAdapter {
    fn name(&self) -> &str {
        "http-bot"
    }

    async fn search(
        &self,
        ctx: CancellationToken,
        database: DatabaseId,
        request: &SearchRequest,
    ) -> Result<Vec<PatentRecord>, BotError> {
        let bot_id = self
            .config
            .bot_ids
            .get(&database)
            .ok_or_else(|| BotError::Permanent(format!("No bot configured for {}", database)))?;

        tracing::debug!(
            url = %self.execution_url(),
            database = %database,
            bot_id = %bot_id,
            "Submitting bot execution"
        );

        let execution_id = until_cancelled(&ctx, self.submit(bot_id, database, request)).await?;

        tracing::info!(
            database = %database,
            execution_id = %execution_id,
            "Bot execution submitted"
        );

        loop {
            let polled = until_cancelled(&ctx, async {
                tokio::time::sleep(self.config.poll_interval).await;
                self.fetch_status(&execution_id).await
            })
            .await;

            let status = match polled {
                Ok(status) => status,
                Err(e) => {
                    // 已提交的执行不能留在远端继续运行
                    self.cancel_remote(&execution_id).await;
                    return Err(e);
                }
            };

            if let Some(outcome) = interpret(database, status) {
                match &outcome {
                    Ok(records) => tracing::info!(
                        database = %database,
                        execution_id = %execution_id,
                        records = records.len(),
                        "Bot execution completed"
                    ),
                    Err(e) => tracing::warn!(
                        database = %database,
                        execution_id = %execution_id,
                        error = %e,
                        "Bot execution failed"
                    ),
                }
                return outcome;
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    fn status(json: &str) -> ExecutionStatus {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = HttpBotAdapterConfig::new("http://control-room:8080/", "secret")
            .with_bot(DatabaseId::Uspto, "bots/uspto_search")
            .with_timeout(10);

        assert_eq!(config.control_room_url, "http://control-room:8080");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(
            config.bot_ids.get(&DatabaseId::Uspto).map(String::as_str),
            Some("bots/uspto_search")
        );
    }

    #[test]
    fn test_urls() {
        let adapter = HttpBotAdapter::new(HttpBotAdapterConfig::new("http://cr", "k")).unwrap();
        assert_eq!(
            adapter.status_url("d-1"),
            "http://cr/v3/activity/orchestrator/execution/d-1"
        );
        assert_eq!(
            adapter.cancel_url("d-1"),
            "http://cr/v3/activity/orchestrator/execution/d-1/cancel"
        );
    }

    #[test]
    fn test_running_status_keeps_polling() {
        assert!(interpret(DatabaseId::Uspto, status(r#"{"status": "IN_PROGRESS"}"#)).is_none());
        assert!(interpret(DatabaseId::Uspto, status(r#"{"status": "queued"}"#)).is_none());
    }

    #[test]
    fn test_completed_payload_maps_to_records() {
        let payload = r#"{
            "status": "completed",
            "botOutput": {"results": [
                {
                    "patentNumber": "US10123456B2",
                    "title": "Battery cell",
                    "abstract": "A cell with a solid electrolyte.",
                    "applicants": ["ACME Corp"],
                    "applicationDate": "2019-04-02T00:00:00",
                    "ipcClasses": ["H01M 10/05"],
                    "relevanceScore": 87.5
                },
                {"patent_number": "  ", "title": "dropped"},
                {"patentNumber": "--", "title": "dropped too"}
            ]}
        }"#;

        let records = interpret(DatabaseId::Uspto, status(payload)).unwrap().unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.canonical_number, "US10123456");
        assert_eq!(record.title, "Battery cell");
        assert_eq!(record.applicants, vec!["ACME Corp"]);
        assert_eq!(record.application_date, NaiveDate::from_ymd_opt(2019, 4, 2));
        assert_eq!(record.publication_date, None);
        assert_eq!(record.relevance_score, 87.5);
        assert_eq!(record.source_database, DatabaseId::Uspto);
    }

    #[test]
    fn test_completed_without_output_is_permanent() {
        let outcome = interpret(DatabaseId::Epo, status(r#"{"status": "success"}"#)).unwrap();
        assert!(matches!(outcome, Err(BotError::Permanent(_))));
    }

    #[test]
    fn test_failed_status_honours_retryable_flag() {
        let permanent = interpret(
            DatabaseId::Twpat,
            status(r#"{"status": "failed", "error": "login rejected"}"#),
        )
        .unwrap();
        assert!(matches!(permanent, Err(BotError::Permanent(m)) if m.contains("login rejected")));

        let transient = interpret(
            DatabaseId::Twpat,
            status(r#"{"status": "error", "error": "site busy", "retryable": true}"#),
        )
        .unwrap();
        assert!(matches!(transient, Err(BotError::Transient(_))));
    }

    #[test]
    fn test_unknown_status_is_permanent() {
        let outcome = interpret(DatabaseId::Wipo, status(r#"{"status": "exploded"}"#)).unwrap();
        assert!(matches!(outcome, Err(BotError::Permanent(_))));
    }

    #[test]
    fn test_http_status_classification() {
        assert!(map_status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(map_status_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(map_status_error(StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(!map_status_error(StatusCode::UNAUTHORIZED, "bad key").is_transient());
        assert!(!map_status_error(StatusCode::BAD_REQUEST, "").is_transient());
    }

    #[test]
    fn test_parse_date_is_lenient() {
        assert_eq!(parse_date(Some("2020-01-31")), NaiveDate::from_ymd_opt(2020, 1, 31));
        assert_eq!(parse_date(Some("31/01/2020")), None);
        assert_eq!(parse_date(None), None);
    }

    #[tokio::test]
    async fn test_unconfigured_database_is_permanent() {
        let adapter = HttpBotAdapter::new(HttpBotAdapterConfig::new("http://127.0.0.1:9", "k")).unwrap();
        let request = SearchRequest::new([DatabaseId::Kipo]).with_keywords(["battery"]);

        let result = adapter
            .search(CancellationToken::new(), DatabaseId::Kipo, &request)
            .await;

        assert!(matches!(result, Err(BotError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_submit() {
        let adapter = HttpBotAdapter::new(
            HttpBotAdapterConfig::new("http://10.255.255.1", "k").with_bot(DatabaseId::Uspto, "bot"),
        )
        .unwrap();
        let request = SearchRequest::new([DatabaseId::Uspto]).with_keywords(["battery"]);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result = adapter.search(ctx, DatabaseId::Uspto, &request).await;

        assert_eq!(result, Err(BotError::Cancelled));
    }

    /// 本地模拟控制台：提交成功，状态查询一直 503
    async fn failing_control_room() -> (String, Arc<Mutex<Vec<String>>>) {
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let recorder = cancelled.clone();
        let app = Router::new()
            .route(
                "/v3/activity/orchestrator/execution",
                post(|| async { Json(serde_json::json!({"deploymentId": "d-42"})) }),
            )
            .route(
                "/v3/activity/orchestrator/execution/:id",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            )
            .route(
                "/v3/activity/orchestrator/execution/:id/cancel",
                post(move |Path(id): Path<String>| async move {
                    recorder.lock().unwrap().push(id);
                    StatusCode::OK
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), cancelled)
    }

    #[tokio::test]
    async fn test_poll_failure_cancels_remote_execution() {
        let (url, cancelled) = failing_control_room().await;
        let adapter = HttpBotAdapter::new(
            HttpBotAdapterConfig::new(url, "k")
                .with_bot(DatabaseId::Uspto, "bot")
                .with_poll_interval(Duration::from_millis(10)),
        )
        .unwrap();
        let request = SearchRequest::new([DatabaseId::Uspto]).with_keywords(["battery"]);

        let result = adapter
            .search(CancellationToken::new(), DatabaseId::Uspto, &request)
            .await;

        assert!(matches!(result, Err(BotError::Transient(_))));
        assert_eq!(*cancelled.lock().unwrap(), vec!["d-42".to_string()]);
    }
}
