//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping              GET   健康检查
//! - /api/search/submit     POST  提交检索（异步执行，返回 task_id）
//! - /api/search/status     POST  查询任务快照
//! - /api/search/cancel     POST  取消任务
//! - /api/search/databases  GET   列出已注册的数据库

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/search", search_routes())
}

/// Search 路由
fn search_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/submit", post(handlers::submit_search))
        .route("/status", post(handlers::get_search_status))
        .route("/cancel", post(handlers::cancel_search))
        .route("/databases", get(handlers::list_databases))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    use crate::application::{
        BotRoster, DispatcherConfig, PersistenceSettings, SearchCoordinator, WorkerPool,
    };
    use crate::domain::search::DatabaseId;
    use crate::domain::task::TaskId;
    use crate::infrastructure::adapters::FakeBotAdapter;
    use crate::infrastructure::memory::InMemoryTaskManager;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
    use crate::infrastructure::persistence::{SledResultOutbox, SqliteTaskRepository};

    struct TestApp {
        router: Router,
        // 保持队列和 sled 目录存活
        _queue: mpsc::Receiver<TaskId>,
        _dir: TempDir,
    }

    async fn setup() -> TestApp {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let dir = TempDir::new().unwrap();
        let outbox = SledResultOutbox::open(dir.path().join("outbox")).unwrap();
        let (tx, rx) = mpsc::channel(8);

        let roster = BotRoster::new()
            .register(DatabaseId::Uspto, FakeBotAdapter::sample(DatabaseId::Uspto, 3).arc())
            .register(DatabaseId::Twpat, FakeBotAdapter::sample(DatabaseId::Twpat, 2).arc());

        let coordinator = SearchCoordinator::new(
            roster,
            WorkerPool::new(4),
            DispatcherConfig::default(),
            PersistenceSettings::default(),
            InMemoryTaskManager::new(tx).arc(),
            Arc::new(SqliteTaskRepository::new(pool)),
            outbox.arc(),
        )
        .arc();

        TestApp {
            router: create_routes().with_state(Arc::new(AppState::new(coordinator))),
            _queue: rx,
            _dir: dir,
        }
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> Value {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let app = setup().await;
        let body = call(&app.router, "GET", "/api/ping", None).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "patent-coordinator");
        assert_eq!(body["active_tasks"], 0);
        assert_eq!(body["databases"], 2);
    }

    #[tokio::test]
    async fn test_submit_then_status() {
        let app = setup().await;
        let submitted = call(
            &app.router,
            "POST",
            "/api/search/submit",
            Some(json!({"keywords": ["solid state battery"], "databases": ["uspto", "twpat"]})),
        )
        .await;

        assert_eq!(submitted["errno"], 0);
        assert_eq!(submitted["data"]["status"], "pending");
        let task_id = submitted["data"]["task_id"].as_str().unwrap().to_string();

        let status = call(
            &app.router,
            "POST",
            "/api/search/status",
            Some(json!({ "task_id": task_id })),
        )
        .await;

        assert_eq!(status["errno"], 0);
        assert_eq!(status["data"]["status"], "pending");
        assert_eq!(status["data"]["progress"], 0);
        assert_eq!(status["data"]["sub_tasks"].as_array().unwrap().len(), 2);
        assert_eq!(status["data"]["stale"], false);
        assert!(status["data"].get("result").is_none());
    }

    #[tokio::test]
    async fn test_invalid_request_is_bad_request() {
        let app = setup().await;
        let body = call(
            &app.router,
            "POST",
            "/api/search/submit",
            Some(json!({"keywords": [], "databases": ["uspto"]})),
        )
        .await;

        assert_eq!(body["errno"], 400);
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_unregistered_database_is_bad_request() {
        let app = setup().await;
        let body = call(
            &app.router,
            "POST",
            "/api/search/submit",
            Some(json!({"keywords": ["battery"], "databases": ["kipo"]})),
        )
        .await;

        assert_eq!(body["errno"], 400);
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let app = setup().await;
        let body = call(
            &app.router,
            "POST",
            "/api/search/status",
            Some(json!({"task_id": "missing"})),
        )
        .await;
        assert_eq!(body["errno"], 404);

        let body = call(
            &app.router,
            "POST",
            "/api/search/cancel",
            Some(json!({"task_id": "missing"})),
        )
        .await;
        assert_eq!(body["errno"], 404);
    }

    #[tokio::test]
    async fn test_cancel_live_task() {
        let app = setup().await;
        let submitted = call(
            &app.router,
            "POST",
            "/api/search/submit",
            Some(json!({"patent_number": "US10123456", "databases": ["uspto"]})),
        )
        .await;
        let task_id = submitted["data"]["task_id"].as_str().unwrap().to_string();

        let body = call(
            &app.router,
            "POST",
            "/api/search/cancel",
            Some(json!({ "task_id": task_id })),
        )
        .await;

        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["task_id"], task_id);
    }

    #[tokio::test]
    async fn test_list_databases() {
        let app = setup().await;
        let body = call(&app.router, "GET", "/api/search/databases", None).await;

        let databases = body["data"]["databases"].as_array().unwrap();
        assert_eq!(databases.len(), 2);
        assert_eq!(databases[0]["id"], "twpat");
        assert_eq!(databases[0]["adapter"], "fake-bot");
        assert_eq!(databases[1]["id"], "uspto");
    }
}
