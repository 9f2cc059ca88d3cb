//! Patent Coordinator - 多数据库专利检索任务协调服务
//!
//! 启动顺序: 配置 → 日志 → SQLite → 发件箱 → 机器人名册 → 协调器 → Worker → 恢复未完成任务 → HTTP

use std::sync::Arc;
use std::time::Duration;

use patent_coordinator::application::{BotAdapterPort, BotRoster, SearchCoordinator, WorkerPool};
use patent_coordinator::config::{load_config, print_config, AppConfig, BotMode};
use patent_coordinator::infrastructure::adapters::{
    FakeBotAdapter, HttpBotAdapter, HttpBotAdapterConfig,
};
use patent_coordinator::infrastructure::http::{AppState, HttpServer, ServerConfig};
use patent_coordinator::infrastructure::memory::InMemoryTaskManager;
use patent_coordinator::infrastructure::persistence::sled::{SledOutboxConfig, SledResultOutbox};
use patent_coordinator::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteTaskRepository,
};
use patent_coordinator::infrastructure::worker::{SearchWorker, SearchWorkerConfig};
use tokio::sync::mpsc;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},patent_coordinator={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// 按配置构建机器人名册
fn build_roster(config: &AppConfig) -> anyhow::Result<BotRoster> {
    let bots = &config.bots;
    let entries = bots
        .parsed_roster()
        .map_err(|db| anyhow::anyhow!("Unknown database in bot roster: {}", db))?;

    let mut roster = BotRoster::new();
    match bots.mode {
        BotMode::Http => {
            let mut http_config = HttpBotAdapterConfig::new(&bots.control_room_url, &bots.api_key)
                .with_poll_interval(Duration::from_secs(bots.poll_interval_secs))
                .with_timeout(bots.request_timeout_secs);
            for (database, bot_id) in &entries {
                http_config = http_config.with_bot(*database, bot_id);
            }
            let adapter: Arc<dyn BotAdapterPort> = Arc::new(HttpBotAdapter::new(http_config)?);
            for database in entries.keys() {
                roster = roster.register(*database, adapter.clone());
            }
        }
        BotMode::Fake => {
            let latency = Duration::from_millis(bots.fake_latency_ms);
            for database in entries.keys() {
                let adapter = FakeBotAdapter::sample(*database, bots.fake_records).with_latency(latency);
                roster = roster.register(*database, adapter.arc());
            }
        }
    }

    Ok(roster)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Patent Coordinator - 多数据库专利检索协调服务");
    print_config(&config);

    // 确保数据目录存在
    for path in [&config.database.path, &config.outbox.path] {
        if let Some(parent) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;
    let repository = Arc::new(SqliteTaskRepository::new(pool));

    // 结果发件箱
    let outbox = SledResultOutbox::new(&SledOutboxConfig {
        db_path: config.outbox.path.clone(),
    })?
    .arc();
    tracing::info!(pending = outbox.pending_count(), "Result outbox opened");

    let roster = build_roster(&config)?;
    tracing::info!(databases = ?roster.databases(), "Bot roster ready");
    for database in roster.databases() {
        if let Some(adapter) = roster.get(database) {
            if !adapter.health_check().await {
                tracing::warn!(database = %database, adapter = adapter.name(), "Bot not reachable at startup");
            }
        }
    }

    // 创建任务队列与内存任务管理器
    let (task_tx, task_rx) = mpsc::channel(config.queue.capacity);
    let task_manager = InMemoryTaskManager::new(task_tx).arc();

    let coordinator = SearchCoordinator::new(
        roster,
        WorkerPool::new(config.dispatcher.pool_size),
        config.dispatcher.dispatcher_config(),
        config.persistence.settings(),
        task_manager,
        repository,
        outbox,
    )
    .arc();

    // 启动 Worker
    let worker = SearchWorker::new(
        SearchWorkerConfig {
            max_concurrent_tasks: config.queue.max_concurrent_tasks,
        },
        task_rx,
        coordinator.clone(),
    );
    tokio::spawn(worker.run());

    // 恢复上次进程中未完成的任务
    match coordinator.resume_unfinished().await {
        Ok(resumed) => tracing::info!(count = resumed.len(), "Startup resume finished"),
        Err(e) => tracing::error!(error = %e, "Failed to resume unfinished tasks"),
    }

    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let server = HttpServer::new(server_config, AppState::new(coordinator));

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
