use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::server::rest::{
    handlers, logging_middleware::request_logging_middleware, openapi::ApiDoc,
};
use crate::shared::models::{AppState, HealthResponse};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/version", get(version))
        // Container endpoints
        .route("/containers", get(handlers::containers::list_containers))
        .route("/containers/running", get(handlers::containers::list_running_containers))
        .route("/containers/create", post(handlers::containers::create_container))
        .route("/containers/{id}", get(handlers::containers::get_container))
        .route("/containers/{id}", delete(handlers::containers::remove_container))
        .route("/containers/{id}/stats", get(handlers::containers::get_container_stats))
        .route("/containers/{id}/stop", post(handlers::containers::stop_container))
        .route("/containers/{id}/start", post(handlers::containers::start_container))
        // Monitoring endpoints
        .route("/ports", get(handlers::monitoring::get_port_info))
        .route("/system/stats", get(handlers::monitoring::get_system_stats))
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Docker Orchestration API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/containers",
            "/containers/running",
            "/containers/create",
            "/containers/{id}",
            "/containers/{id}/stats",
            "/containers/{id}/stop",
            "/containers/{id}/start",
            "/ports",
            "/system/stats",
        ],
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let docker = if state.manager.is_available().await {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        docker: docker.to_string(),
        timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
    })
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
