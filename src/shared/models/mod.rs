use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::docker::ContainerLifecycleManager;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateContainerRequest {
    /// Falls back to the configured default image
    pub image: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub docker: String,
    pub timestamp: f64,
}

// Application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ContainerLifecycleManager>,
}
