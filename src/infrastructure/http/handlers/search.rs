//! Search Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::domain::search::SearchRequest;
use crate::domain::task::TaskId;
use crate::infrastructure::http::dto::{
    ApiResponse, CancelTaskResponseDto, DatabaseDto, DatabaseListResponse, SubmitSearchResponseDto,
    TaskIdRequest, TaskStatusDto,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 提交检索（立即返回 task_id）
pub async fn submit_search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<ApiResponse<SubmitSearchResponseDto>>, ApiError> {
    let result = state.coordinator.submit(req).await?;

    Ok(Json(ApiResponse::success(SubmitSearchResponseDto {
        task_id: result.task_id.to_string(),
        status: result.status.as_str().to_string(),
    })))
}

/// 查询任务快照
pub async fn get_search_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskIdRequest>,
) -> Result<Json<ApiResponse<TaskStatusDto>>, ApiError> {
    let task = state
        .coordinator
        .get_status(&TaskId::from_string(req.task_id))
        .await?;

    Ok(Json(ApiResponse::success(TaskStatusDto::from(&task))))
}

/// 取消任务
pub async fn cancel_search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskIdRequest>,
) -> Result<Json<ApiResponse<CancelTaskResponseDto>>, ApiError> {
    let result = state
        .coordinator
        .cancel(&TaskId::from_string(req.task_id))
        .await?;

    Ok(Json(ApiResponse::success(CancelTaskResponseDto {
        task_id: result.task_id.to_string(),
        status: result.status.as_str().to_string(),
    })))
}

/// 列出已注册的数据库
pub async fn list_databases(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<DatabaseListResponse>> {
    let databases = state
        .coordinator
        .list_databases()
        .into_iter()
        .map(DatabaseDto::from)
        .collect();

    Json(ApiResponse::success(DatabaseListResponse { databases }))
}
