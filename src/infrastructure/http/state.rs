//! Application State

use std::sync::Arc;

use crate::application::SearchCoordinator;

/// 应用状态
///
/// 所有命令/查询都经由协调器门面
pub struct AppState {
    pub coordinator: Arc<SearchCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<SearchCoordinator>) -> Self {
        Self { coordinator }
    }
}
