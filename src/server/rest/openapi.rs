use utoipa::OpenApi;

use crate::docker::{ContainerRecord, ContainerStatsSnapshot, ContainerStatus, PortUsage};
use crate::monitor::SystemStats;
use crate::server::rest::error::{ErrorDetails, ErrorResponse};
use crate::shared::models::{CreateContainerRequest, HealthResponse, MessageResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::server::rest::openapi::health,
        crate::server::rest::openapi::create_container,
        crate::server::rest::openapi::list_containers,
        crate::server::rest::openapi::list_running_containers,
        crate::server::rest::openapi::get_container,
        crate::server::rest::openapi::get_container_stats,
        crate::server::rest::openapi::stop_container,
        crate::server::rest::openapi::start_container,
        crate::server::rest::openapi::remove_container,
        crate::server::rest::openapi::get_port_info,
        crate::server::rest::openapi::get_system_stats,
    ),
    components(
        schemas(
            ContainerRecord,
            ContainerStatus,
            ContainerStatsSnapshot,
            CreateContainerRequest,
            MessageResponse,
            HealthResponse,
            PortUsage,
            SystemStats,
            ErrorResponse,
            ErrorDetails,
        )
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Container Management", description = "Container lifecycle and statistics"),
        (name = "Monitoring", description = "Port pool and host usage"),
    ),
    info(
        title = "Docker Orchestration API",
        version = "1.0.0",
        description = "Container management with automatic host port allocation and monitoring",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Service is up; reports engine reachability", body = HealthResponse),
    ),
)]
#[allow(dead_code)]
pub async fn health() {}

// Container endpoints
#[utoipa::path(
    post,
    path = "/containers/create",
    tag = "Container Management",
    request_body = CreateContainerRequest,
    responses(
        (status = 200, description = "Container launched on a free host port", body = ContainerRecord),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Engine unavailable, no free port, or launch failed", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn create_container() {}

#[utoipa::path(
    get,
    path = "/containers",
    tag = "Container Management",
    responses(
        (status = 200, description = "All containers, running or not", body = Vec<ContainerRecord>),
        (status = 500, description = "Engine unavailable", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn list_containers() {}

#[utoipa::path(
    get,
    path = "/containers/running",
    tag = "Container Management",
    responses(
        (status = 200, description = "Running containers", body = Vec<ContainerRecord>),
        (status = 500, description = "Engine unavailable", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn list_running_containers() {}

#[utoipa::path(
    get,
    path = "/containers/{id}",
    tag = "Container Management",
    params(
        ("id" = String, Path, description = "Container id, id prefix or name")
    ),
    responses(
        (status = 200, description = "Container details", body = ContainerRecord),
        (status = 404, description = "Container not found", body = ErrorResponse),
        (status = 500, description = "Engine unavailable", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn get_container() {}

#[utoipa::path(
    get,
    path = "/containers/{id}/stats",
    tag = "Container Management",
    params(
        ("id" = String, Path, description = "Container id, id prefix or name")
    ),
    responses(
        (status = 200, description = "Current resource usage", body = ContainerStatsSnapshot),
        (status = 404, description = "Container not found", body = ErrorResponse),
        (status = 500, description = "No stats available", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn get_container_stats() {}

#[utoipa::path(
    post,
    path = "/containers/{id}/stop",
    tag = "Container Management",
    params(
        ("id" = String, Path, description = "Container id, id prefix or name")
    ),
    responses(
        (status = 200, description = "Container stopped and its port released", body = MessageResponse),
        (status = 404, description = "Container not found", body = ErrorResponse),
        (status = 500, description = "Stop failed", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn stop_container() {}

#[utoipa::path(
    post,
    path = "/containers/{id}/start",
    tag = "Container Management",
    params(
        ("id" = String, Path, description = "Container id, id prefix or name")
    ),
    responses(
        (status = 200, description = "Container started on its previous binding", body = MessageResponse),
        (status = 404, description = "Container not found", body = ErrorResponse),
        (status = 500, description = "Start failed", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn start_container() {}

#[utoipa::path(
    delete,
    path = "/containers/{id}",
    tag = "Container Management",
    params(
        ("id" = String, Path, description = "Container id, id prefix or name")
    ),
    responses(
        (status = 200, description = "Container removed", body = MessageResponse),
        (status = 404, description = "Container not found", body = ErrorResponse),
        (status = 500, description = "Removal failed", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn remove_container() {}

// Monitoring endpoints
#[utoipa::path(
    get,
    path = "/ports",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Reserved host ports and pool size", body = PortUsage),
    ),
)]
#[allow(dead_code)]
pub async fn get_port_info() {}

#[utoipa::path(
    get,
    path = "/system/stats",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Host CPU, memory and disk usage", body = SystemStats),
        (status = 500, description = "Sampling failed", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn get_system_stats() {}
