use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, Stats, StatsOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerInspectResponse, ContainerSummary, HostConfig, PortBinding};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::stream::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Everything needed to launch one detached container with a single published port.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub container_port: String,
    pub host_port: u16,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuSample {
    pub total_usage: u64,
    pub system_usage: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Raw counters for one container: the current reading plus the one taken just before it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSample {
    pub cpu: CpuSample,
    pub precpu: CpuSample,
    pub memory_usage: Option<u64>,
    pub memory_limit: Option<u64>,
    pub networks: HashMap<String, NetworkCounters>,
}

impl From<Stats> for StatsSample {
    fn from(stats: Stats) -> Self {
        Self {
            cpu: CpuSample {
                total_usage: stats.cpu_stats.cpu_usage.total_usage,
                system_usage: stats.cpu_stats.system_cpu_usage,
            },
            precpu: CpuSample {
                total_usage: stats.precpu_stats.cpu_usage.total_usage,
                system_usage: stats.precpu_stats.system_cpu_usage,
            },
            memory_usage: stats.memory_stats.usage,
            memory_limit: stats.memory_stats.limit,
            networks: stats
                .networks
                .unwrap_or_default()
                .into_iter()
                .map(|(name, net)| {
                    (
                        name,
                        NetworkCounters {
                            rx_bytes: net.rx_bytes,
                            tx_bytes: net.tx_bytes,
                        },
                    )
                })
                .collect(),
        }
    }
}

/// The engine calls the lifecycle manager depends on. Errors are passed through untouched.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<(), DockerError>;
    /// Creates and starts a container, returning its full id.
    async fn run(&self, spec: RunSpec) -> Result<String, DockerError>;
    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError>;
    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, DockerError>;
    async fn stats(&self, id: &str) -> Result<StatsSample, DockerError>;
    async fn start(&self, id: &str) -> Result<(), DockerError>;
    async fn stop(&self, id: &str) -> Result<(), DockerError>;
    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError>;
}

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Unix socket path or `tcp://`/`http://` address. `None` uses the local defaults.
    pub host: Option<String>,
    pub timeout_secs: u64,
    pub stop_timeout_secs: i64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: 30,
            stop_timeout_secs: 10,
        }
    }
}

pub struct DockerClient {
    docker: Docker,
    stop_timeout_secs: i64,
}

impl DockerClient {
    /// Builds the engine handle. Does not contact the daemon; use `ping` for that.
    pub fn connect(config: &DockerConfig) -> Result<Self> {
        let docker = match config.host.as_deref() {
            Some(addr) if addr.starts_with("tcp://") || addr.starts_with("http://") => {
                Docker::connect_with_http(addr, config.timeout_secs, &API_DEFAULT_VERSION)
            }
            Some(addr) => {
                let path = addr.strip_prefix("unix://").unwrap_or(addr);
                Docker::connect_with_socket(path, config.timeout_secs, &API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_local_defaults(),
        }
        .context("Failed to set up Docker client")?;

        Ok(Self {
            docker,
            stop_timeout_secs: config.stop_timeout_secs,
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn ping(&self) -> Result<(), DockerError> {
        self.docker.ping().await.map(|_| ())
    }

    async fn run(&self, spec: RunSpec) -> Result<String, DockerError> {
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            spec.container_port.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(spec.container_port.clone(), HashMap::new());

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env),
            labels: Some(spec.labels),
            exposed_ports: Some(exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self.docker.create_container(Some(options), config).await?;
        debug!("Created container {} with ID: {}", spec.name, response.id);

        if let Err(e) = self
            .docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Never leave a created-but-unstartable container holding the port binding.
            if let Err(cleanup) = self
                .docker
                .remove_container(
                    &response.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
            {
                warn!(
                    container = %response.id,
                    host_port = spec.host_port,
                    "Failed to remove container that could not start: {}",
                    cleanup
                );
            }
            return Err(e);
        }

        info!(container = %response.id, image = %spec.image, "Started container");
        Ok(response.id)
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        self.docker.list_containers(Some(options)).await
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
    }

    async fn stats(&self, id: &str) -> Result<StatsSample, DockerError> {
        // one_shot must stay off: the daemon only fills precpu_stats when it takes two readings.
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = self.docker.stats(id, Some(options));
        match stream.next().await {
            Some(stats) => stats.map(StatsSample::from),
            None => Err(DockerError::DockerResponseServerError {
                status_code: 500,
                message: format!("No stats returned for container {id}"),
            }),
        }
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        let options = StopContainerOptions {
            t: self.stop_timeout_secs,
        };
        self.docker.stop_container(id, Some(options)).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await
    }
}
