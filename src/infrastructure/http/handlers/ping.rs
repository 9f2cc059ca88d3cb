//! Ping Handler - 存活检查

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::infrastructure::http::state::AppState;

#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// 内存中尚未落盘终态的任务数
    pub active_tasks: usize,
    /// 已注册机器人的数据库数
    pub databases: usize,
}

pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    let coordinator = &state.coordinator;
    Json(PingResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        active_tasks: coordinator.active_tasks(),
        databases: coordinator.list_databases().len(),
    })
}
