//! HTTP Middleware - 请求日志

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::{Duration, Instant};

/// 超过该耗时的请求记为慢请求
const SLOW_REQUEST: Duration = Duration::from_secs(2);

/// 记录 4xx/5xx 响应与慢请求
///
/// 业务错误（errno != 0）走 HTTP 200，由 `ApiError::into_response` 记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    let latency_ms = elapsed.as_millis() as u64;

    match status {
        500..=599 => tracing::error!(%method, %path, status, latency_ms, "Request failed"),
        400..=499 => tracing::warn!(%method, %path, status, latency_ms, "Request rejected"),
        _ if elapsed > SLOW_REQUEST => {
            tracing::warn!(%method, %path, status, latency_ms, "Slow request")
        }
        _ => {}
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::post,
        Router,
    };
    use tower::util::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/api/search/submit", post(|| async { "{}" }))
            .route("/api/search/cancel", post(|| async { StatusCode::CONFLICT }))
            .route(
                "/api/search/status",
                post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            )
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    async fn status_of(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_status_codes_pass_through_unchanged() {
        assert_eq!(status_of("/api/search/submit").await, StatusCode::OK);
        assert_eq!(status_of("/api/search/cancel").await, StatusCode::CONFLICT);
        assert_eq!(
            status_of("/api/search/status").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of("/api/unknown").await, StatusCode::NOT_FOUND);
    }
}
