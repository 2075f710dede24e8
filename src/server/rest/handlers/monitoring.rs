use axum::{extract::State, Json};
use std::sync::Arc;

use crate::docker::PortUsage;
use crate::monitor::{collect_system_stats, SystemStats};
use crate::server::rest::error::ApiResult;
use crate::shared::models::AppState;

pub async fn get_port_info(State(state): State<Arc<AppState>>) -> Json<PortUsage> {
    Json(state.manager.port_usage())
}

pub async fn get_system_stats() -> ApiResult<Json<SystemStats>> {
    let stats = collect_system_stats().await?;
    Ok(Json(stats))
}
