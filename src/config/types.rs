//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::application::{DispatcherConfig, PersistenceSettings};
use crate::domain::search::DatabaseId;
use crate::domain::RetryPolicy;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 子任务调度配置
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// 任务持久化重试配置
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 结果发件箱配置
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// 工作队列配置
    #[serde(default)]
    pub queue: QueueConfig,

    /// 检索机器人配置
    #[serde(default)]
    pub bots: BotsConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 调度配置
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherSettings {
    /// 全局工作池大小（同时执行的子任务数）
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// 单个子任务执行时限（秒）
    #[serde(default = "default_sub_task_timeout")]
    pub sub_task_timeout_secs: u64,

    /// 任务整体期限（秒）
    #[serde(default = "default_task_deadline")]
    pub task_deadline_secs: u64,

    /// 取消后的宽限期（秒）
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_secs: u64,

    /// 暂时性错误的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 首次退避（毫秒）
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// 退避倍数
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,

    /// 退避上限（毫秒）
    #[serde(default = "default_backoff_cap")]
    pub backoff_cap_ms: u64,
}

fn default_pool_size() -> usize {
    8
}

fn default_sub_task_timeout() -> u64 {
    180
}

fn default_task_deadline() -> u64 {
    600
}

fn default_cancel_grace() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base() -> u64 {
    2_000
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_backoff_cap() -> u64 {
    30_000
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            sub_task_timeout_secs: default_sub_task_timeout(),
            task_deadline_secs: default_task_deadline(),
            cancel_grace_secs: default_cancel_grace(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base(),
            backoff_factor: default_backoff_factor(),
            backoff_cap_ms: default_backoff_cap(),
        }
    }
}

impl DispatcherSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.backoff_cap_ms),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            sub_task_timeout: Duration::from_secs(self.sub_task_timeout_secs),
            task_deadline: Duration::from_secs(self.task_deadline_secs),
            cancel_grace: Duration::from_secs(self.cancel_grace_secs),
            retry: self.retry_policy(),
        }
    }
}

/// 持久化配置
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// 单次保存的最大尝试次数
    #[serde(default = "default_save_attempts")]
    pub save_attempts: u32,

    /// 保存重试间隔（毫秒）
    #[serde(default = "default_save_retry_delay")]
    pub save_retry_delay_ms: u64,
}

fn default_save_attempts() -> u32 {
    3
}

fn default_save_retry_delay() -> u64 {
    500
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_attempts: default_save_attempts(),
            save_retry_delay_ms: default_save_retry_delay(),
        }
    }
}

impl PersistenceConfig {
    pub fn settings(&self) -> PersistenceSettings {
        PersistenceSettings {
            save_attempts: self.save_attempts,
            save_retry_delay: Duration::from_millis(self.save_retry_delay_ms),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/patent_coordinator.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 结果发件箱配置
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// sled 数据目录
    #[serde(default = "default_outbox_path")]
    pub path: String,
}

fn default_outbox_path() -> String {
    "data/outbox.sled".to_string()
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            path: default_outbox_path(),
        }
    }
}

/// 工作队列配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// 队列容量，满时提交会等待
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// 同时执行的最大任务数
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_concurrent_tasks() -> usize {
    16
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
        }
    }
}

/// 机器人运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    /// 通过控制台驱动真实机器人
    Http,
    /// 本地假数据
    Fake,
}

impl BotMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotMode::Http => "http",
            BotMode::Fake => "fake",
        }
    }
}

/// 检索机器人配置
#[derive(Debug, Clone, Deserialize)]
pub struct BotsConfig {
    #[serde(default = "default_bot_mode")]
    pub mode: BotMode,

    /// 控制台基础 URL
    #[serde(default)]
    pub control_room_url: String,

    /// 控制台 API Key
    #[serde(default)]
    pub api_key: String,

    /// 执行状态轮询间隔（秒）
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// 单个 HTTP 请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// 数据库 ID → 机器人 ID
    #[serde(default = "default_roster")]
    pub roster: BTreeMap<String, String>,

    /// fake 模式下每个数据库返回的记录数
    #[serde(default = "default_fake_records")]
    pub fake_records: usize,

    /// fake 模式下的模拟延迟（毫秒）
    #[serde(default = "default_fake_latency")]
    pub fake_latency_ms: u64,
}

fn default_bot_mode() -> BotMode {
    BotMode::Fake
}

fn default_poll_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_roster() -> BTreeMap<String, String> {
    [
        ("twpat", "twpat-search-bot-v1"),
        ("uspto", "uspto-search-bot-v1"),
        ("epo", "epo-search-bot-v1"),
        ("wipo", "wipo-search-bot-v1"),
    ]
    .into_iter()
    .map(|(db, bot)| (db.to_string(), bot.to_string()))
    .collect()
}

fn default_fake_records() -> usize {
    5
}

fn default_fake_latency() -> u64 {
    500
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            mode: default_bot_mode(),
            control_room_url: String::new(),
            api_key: String::new(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            roster: default_roster(),
            fake_records: default_fake_records(),
            fake_latency_ms: default_fake_latency(),
        }
    }
}

impl BotsConfig {
    /// 解析名册，返回第一个无法识别的数据库 ID
    pub fn parsed_roster(&self) -> Result<BTreeMap<DatabaseId, String>, String> {
        self.roster
            .iter()
            .map(|(db, bot)| {
                DatabaseId::from_str(db)
                    .map(|id| (id, bot.clone()))
                    .ok_or_else(|| db.clone())
            })
            .collect()
    }

    /// 日志中显示的 API Key
    pub fn masked_api_key(&self) -> String {
        match self.api_key.chars().count() {
            0 => "<unset>".to_string(),
            n if n <= 4 => "****".to_string(),
            _ => {
                let head: String = self.api_key.chars().take(4).collect();
                format!("{}****", head)
            }
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
