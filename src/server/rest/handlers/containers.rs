use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;

use crate::docker::{ContainerRecord, ContainerStatsSnapshot};
use crate::server::rest::error::ApiResult;
use crate::shared::models::{AppState, CreateContainerRequest, MessageResponse};

pub async fn create_container(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateContainerRequest>, JsonRejection>,
) -> ApiResult<Json<ContainerRecord>> {
    let Json(request) = body?;
    let image = request
        .image
        .as_deref()
        .unwrap_or_else(|| state.manager.default_image());

    let record = state
        .manager
        .create_container(image, request.name.as_deref())
        .await?;
    Ok(Json(record))
}

pub async fn list_containers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ContainerRecord>>> {
    Ok(Json(state.manager.list_containers(true).await?))
}

pub async fn list_running_containers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ContainerRecord>>> {
    Ok(Json(state.manager.list_containers(false).await?))
}

pub async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerRecord>> {
    Ok(Json(state.manager.get_container(&id).await?))
}

pub async fn get_container_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContainerStatsSnapshot>> {
    Ok(Json(state.manager.get_container_stats(&id).await?))
}

pub async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.manager.stop_container(&id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Container {id} stopped successfully"
    ))))
}

pub async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.manager.start_container(&id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Container {id} started successfully"
    ))))
}

pub async fn remove_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.manager.remove_container(&id).await?;
    Ok(Json(MessageResponse::new(format!(
        "Container {id} removed successfully"
    ))))
}
