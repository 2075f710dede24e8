use bollard::errors::Error as DockerError;
use thiserror::Error;

use super::ports::PortsExhausted;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Docker service not available: {0}")]
    RuntimeUnavailable(String),

    #[error(transparent)]
    ResourceExhausted(#[from] PortsExhausted),

    #[error("Container not found: {0}")]
    NotFound(String),

    #[error("Failed to create container from {image}: {source}")]
    LaunchFailed {
        image: String,
        #[source]
        source: DockerError,
    },

    #[error("Failed to {action} {target}: {source}")]
    OperationFailed {
        action: &'static str,
        target: String,
        #[source]
        source: DockerError,
    },

    #[error("Stats unavailable for container {id}: {reason}")]
    StatsUnavailable { id: String, reason: String },

    #[error("Unreadable engine data for container {id}: {reason}")]
    Mapping { id: String, reason: String },
}

impl LifecycleError {
    /// Turns an engine failure on an existing container into `NotFound` or `OperationFailed`.
    pub fn from_engine(action: &'static str, id: &str, source: DockerError) -> Self {
        if is_not_found(&source) {
            LifecycleError::NotFound(id.to_string())
        } else {
            LifecycleError::OperationFailed {
                action,
                target: format!("container {id}"),
                source,
            }
        }
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::RuntimeUnavailable(_) => "RUNTIME_UNAVAILABLE",
            LifecycleError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            LifecycleError::NotFound(_) => "NOT_FOUND",
            LifecycleError::LaunchFailed { .. } => "LAUNCH_FAILED",
            LifecycleError::OperationFailed { .. } => "OPERATION_FAILED",
            LifecycleError::StatsUnavailable { .. } => "STATS_UNAVAILABLE",
            LifecycleError::Mapping { .. } => "MAPPING_ERROR",
        }
    }
}

pub fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// The engine answers 304 when a container is already in the requested state.
pub fn is_not_modified(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;
