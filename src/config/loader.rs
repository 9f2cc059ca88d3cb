//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, BotMode};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "PATCOORD";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `PATCOORD_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `PATCOORD_SERVER__PORT=8080`
/// - `PATCOORD_DISPATCHER__POOL_SIZE=16`
/// - `PATCOORD_BOTS__MODE=http`
/// - `PATCOORD_BOTS__API_KEY=...`（设置任何名册条目都会替换整个默认名册）
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 标量默认值；名册默认值由 serde 提供，避免与文件中的名册合并
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("dispatcher.pool_size", 8)?
        .set_default("dispatcher.sub_task_timeout_secs", 180)?
        .set_default("dispatcher.task_deadline_secs", 600)?
        .set_default("dispatcher.cancel_grace_secs", 5)?
        .set_default("dispatcher.max_retries", 2)?
        .set_default("dispatcher.backoff_base_ms", 2_000)?
        .set_default("dispatcher.backoff_factor", 2)?
        .set_default("dispatcher.backoff_cap_ms", 30_000)?
        .set_default("persistence.save_attempts", 3)?
        .set_default("persistence.save_retry_delay_ms", 500)?
        .set_default("database.path", "data/patent_coordinator.db")?
        .set_default("database.max_connections", 5)?
        .set_default("outbox.path", "data/outbox.sled")?
        .set_default("queue.capacity", 256)?
        .set_default("queue.max_concurrent_tasks", 16)?
        .set_default("bots.mode", "fake")?
        .set_default("bots.poll_interval_secs", 5)?
        .set_default("bots.request_timeout_secs", 30)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    let dispatcher = &config.dispatcher;
    if dispatcher.pool_size == 0 {
        return Err(invalid("Dispatcher pool size cannot be 0"));
    }
    if dispatcher.sub_task_timeout_secs == 0 || dispatcher.task_deadline_secs == 0 {
        return Err(invalid("Dispatcher timeouts cannot be 0"));
    }
    if dispatcher.backoff_factor < 1 {
        return Err(invalid("Backoff factor must be at least 1"));
    }
    if dispatcher.backoff_cap_ms < dispatcher.backoff_base_ms {
        return Err(invalid("Backoff cap cannot be smaller than backoff base"));
    }

    if config.persistence.save_attempts == 0 {
        return Err(invalid("Persistence save attempts cannot be 0"));
    }

    if config.database.path.is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }
    if config.outbox.path.is_empty() {
        return Err(invalid("Outbox path cannot be empty"));
    }

    if config.queue.capacity == 0 || config.queue.max_concurrent_tasks == 0 {
        return Err(invalid("Queue capacity and concurrency cannot be 0"));
    }

    let bots = &config.bots;
    if bots.roster.is_empty() {
        return Err(invalid("Bot roster cannot be empty"));
    }
    bots.parsed_roster()
        .map_err(|db| invalid(format!("Unknown database in bot roster: {}", db)))?;
    if bots.mode == BotMode::Http {
        if bots.control_room_url.is_empty() {
            return Err(invalid("Control room URL is required in http mode"));
        }
        if bots.poll_interval_secs == 0 || bots.request_timeout_secs == 0 {
            return Err(invalid("Bot poll interval and request timeout cannot be 0"));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    let dispatcher = &config.dispatcher;
    let bots = &config.bots;

    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Worker Pool Size: {}", dispatcher.pool_size);
    tracing::info!(
        "Sub-task Timeout: {}s, Task Deadline: {}s, Cancel Grace: {}s",
        dispatcher.sub_task_timeout_secs,
        dispatcher.task_deadline_secs,
        dispatcher.cancel_grace_secs
    );
    tracing::info!(
        "Retries: {} (backoff {}ms x{} cap {}ms)",
        dispatcher.max_retries,
        dispatcher.backoff_base_ms,
        dispatcher.backoff_factor,
        dispatcher.backoff_cap_ms
    );
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Outbox: {}", config.outbox.path);
    tracing::info!(
        "Queue Capacity: {}, Max Concurrent Tasks: {}",
        config.queue.capacity,
        config.queue.max_concurrent_tasks
    );
    tracing::info!("Bot Mode: {}", bots.mode.as_str());
    if bots.mode == BotMode::Http {
        tracing::info!("Control Room: {}", bots.control_room_url);
        tracing::info!("API Key: {}", bots.masked_api_key());
    }
    for (database, bot) in &bots.roster {
        tracing::info!("Bot: {} -> {}", database, bot);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_pool() {
        let mut config = AppConfig::default();
        config.dispatcher.pool_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_backoff_factor() {
        let mut config = AppConfig::default();
        config.dispatcher.backoff_factor = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_unknown_database() {
        let mut config = AppConfig::default();
        config
            .bots
            .roster
            .insert("espacenet".to_string(), "bot".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("espacenet"));
    }

    #[test]
    fn test_validation_error_for_empty_roster() {
        let mut config = AppConfig::default();
        config.bots.roster.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_http_mode_requires_control_room() {
        let mut config = AppConfig::default();
        config.bots.mode = BotMode::Http;
        assert!(validate_config(&config).is_err());

        config.bots.control_room_url = "https://control-room.example.com".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[dispatcher]
pool_size = 3

[bots]
mode = "fake"

[bots.roster]
uspto = "uspto-bot"
jpo = "jpo-bot"
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.dispatcher.pool_size, 3);
        assert_eq!(config.dispatcher.task_deadline_secs, 600);
        assert_eq!(config.bots.roster.len(), 2);
        assert_eq!(config.bots.parsed_roster().unwrap().len(), 2);
    }
}
