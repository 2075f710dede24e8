use clap::Args;
use std::time::Duration;

use crate::docker::{DockerConfig, LifecycleConfig, PortRange};

/// Runtime settings. Every field can come from a flag or the matching environment variable.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address the API server binds to
    #[arg(short = 'H', long, env = "API_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the API server listens on
    #[arg(short, long, env = "API_PORT", default_value_t = 9000)]
    pub port: u16,

    /// First host port handed out to containers
    #[arg(long, env = "PORT_START", default_value_t = 8000)]
    pub port_start: u16,

    /// End of the host port window (exclusive)
    #[arg(long, env = "PORT_END", default_value_t = 9000)]
    pub port_end: u16,

    /// Docker engine address (unix socket path or tcp:// URL)
    #[arg(long, env = "DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Timeout for engine requests, in seconds
    #[arg(long, env = "DOCKER_TIMEOUT", default_value_t = 30)]
    pub docker_timeout: u64,

    /// Seconds the engine waits for a container to exit before killing it
    #[arg(long, env = "STOP_TIMEOUT", default_value_t = 10)]
    pub stop_timeout: i64,

    /// Image used when a create request names none
    #[arg(long, env = "DEFAULT_IMAGE", default_value = "base-api-server:latest")]
    pub default_image: String,

    /// Port the launched servers listen on inside their container
    #[arg(long, env = "CONTAINER_PORT", default_value_t = 5000)]
    pub container_port: u16,

    /// Wait after launching a container before reading its state, in milliseconds
    #[arg(long, env = "STARTUP_SETTLE_MS", default_value_t = 2000)]
    pub startup_settle_ms: u64,

    /// Re-reserve ports held by managed containers at startup
    #[arg(long, env = "RECONCILE_PORTS", default_value_t = true, action = clap::ArgAction::Set)]
    pub reconcile_ports: bool,

    /// Directory for rolling log files
    #[arg(long, env = "LOG_DIR", default_value = "./logs")]
    pub log_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9000,
            port_start: 8000,
            port_end: 9000,
            docker_host: None,
            docker_timeout: 30,
            stop_timeout: 10,
            default_image: "base-api-server:latest".to_string(),
            container_port: 5000,
            startup_settle_ms: 2000,
            reconcile_ports: true,
            log_dir: "./logs".to_string(),
        }
    }
}

impl Settings {
    pub fn port_range(&self) -> Result<PortRange, crate::docker::PortError> {
        PortRange::new(self.port_start, self.port_end)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn docker(&self) -> DockerConfig {
        DockerConfig {
            host: self.docker_host.clone(),
            timeout_secs: self.docker_timeout,
            stop_timeout_secs: self.stop_timeout,
        }
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            default_image: self.default_image.clone(),
            container_port: self.container_port,
            settle_delay: Duration::from_millis(self.startup_settle_ms),
            ..Default::default()
        }
    }
}
