use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{ContainerRuntime, RunSpec};
use super::container::{
    host_ports, is_running, short_id, ContainerRecord, ContainerStatsSnapshot, HOST_PORT_LABEL,
    MANAGED_LABEL,
};
use super::error::{is_not_found, is_not_modified, LifecycleError, LifecycleResult};
use super::ports::{PortAllocator, PortUsage};

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub default_image: String,
    /// Internal port every launched server listens on.
    pub container_port: u16,
    /// Pause after launch before the container is re-read.
    pub settle_delay: Duration,
    pub name_prefix: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_image: "base-api-server:latest".to_string(),
            container_port: 5000,
            settle_delay: Duration::from_secs(2),
            name_prefix: "api-server".to_string(),
        }
    }
}

/// Creates, observes and tears down containers, keeping the port pool in step
/// with what the engine actually has bound.
///
/// Holds no lock around engine calls; only the allocator's set is guarded, and
/// only for the duration of a reserve or release.
pub struct ContainerLifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    ports: PortAllocator,
    config: LifecycleConfig,
}

impl ContainerLifecycleManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        ports: PortAllocator,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            runtime,
            ports,
            config,
        }
    }

    pub fn default_image(&self) -> &str {
        &self.config.default_image
    }

    pub async fn is_available(&self) -> bool {
        self.runtime.ping().await.is_ok()
    }

    async fn ensure_available(&self) -> LifecycleResult<()> {
        self.runtime
            .ping()
            .await
            .map_err(|e| LifecycleError::RuntimeUnavailable(e.to_string()))
    }

    pub async fn create_container(
        &self,
        image: &str,
        name: Option<&str>,
    ) -> LifecycleResult<ContainerRecord> {
        self.ensure_available().await?;

        let host_port = self.ports.reserve()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("{}-{}", self.config.name_prefix, Utc::now().timestamp_millis()),
        };

        let mut labels = HashMap::new();
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());
        labels.insert(HOST_PORT_LABEL.to_string(), host_port.to_string());

        let spec = RunSpec {
            image: image.to_string(),
            name: name.clone(),
            container_port: format!("{}/tcp", self.config.container_port),
            host_port,
            env: vec![format!("HOST_PORT={host_port}")],
            labels,
        };

        let id = match self.runtime.run(spec).await {
            Ok(id) => id,
            Err(e) => {
                self.ports.release(host_port);
                warn!(image, name = %name, host_port, "Launch failed, port returned to pool: {}", e);
                return Err(LifecycleError::LaunchFailed {
                    image: image.to_string(),
                    source: e,
                });
            }
        };

        self.ports.assign(host_port, &id);
        info!(container = %short_id(&id), name = %name, host_port, "Created container");

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let info = self
            .runtime
            .inspect(&id)
            .await
            .map_err(|e| LifecycleError::from_engine("inspect", &id, e))?;
        ContainerRecord::try_from(info)
    }

    pub async fn list_containers(&self, include_stopped: bool) -> LifecycleResult<Vec<ContainerRecord>> {
        self.ensure_available().await?;

        let summaries = self
            .runtime
            .list(include_stopped)
            .await
            .map_err(|source| LifecycleError::OperationFailed {
                action: "list",
                target: "containers".to_string(),
                source,
            })?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else {
                continue;
            };
            let info = match self.runtime.inspect(&id).await {
                Ok(info) => info,
                Err(e) => {
                    // Removed between list and inspect, or transiently unreadable.
                    warn!(container = %short_id(&id), "Skipping container in listing: {}", e);
                    continue;
                }
            };
            match ContainerRecord::try_from(info) {
                Ok(record) => records.push(record),
                Err(e) => warn!(container = %short_id(&id), "Skipping container in listing: {}", e),
            }
        }

        Ok(records)
    }

    pub async fn get_container(&self, id: &str) -> LifecycleResult<ContainerRecord> {
        self.ensure_available().await?;

        let info = self
            .runtime
            .inspect(id)
            .await
            .map_err(|e| LifecycleError::from_engine("inspect", id, e))?;
        ContainerRecord::try_from(info)
    }

    pub async fn get_container_stats(&self, id: &str) -> LifecycleResult<ContainerStatsSnapshot> {
        self.ensure_available().await?;

        let info = self
            .runtime
            .inspect(id)
            .await
            .map_err(|e| LifecycleError::from_engine("inspect", id, e))?;

        if !is_running(&info) {
            return Err(LifecycleError::StatsUnavailable {
                id: id.to_string(),
                reason: "container is not running".to_string(),
            });
        }

        let sample = self.runtime.stats(id).await.map_err(|e| {
            if is_not_found(&e) {
                LifecycleError::NotFound(id.to_string())
            } else {
                LifecycleError::StatsUnavailable {
                    id: id.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let container_id = info.id.as_deref().map(short_id).unwrap_or(id);
        let name = info
            .name
            .as_deref()
            .unwrap_or_default()
            .trim_start_matches('/');
        let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        ContainerStatsSnapshot::from_sample(container_id, name, &sample, timestamp).map_err(
            |reason| LifecycleError::StatsUnavailable {
                id: id.to_string(),
                reason,
            },
        )
    }

    /// Stops the container and, if it was running, returns its host ports to the pool.
    pub async fn stop_container(&self, id: &str) -> LifecycleResult<()> {
        self.ensure_available().await?;

        let info = self
            .runtime
            .inspect(id)
            .await
            .map_err(|e| LifecycleError::from_engine("inspect", id, e))?;
        let was_running = is_running(&info);
        let owner = info.id.as_deref().unwrap_or(id);
        let bound = host_ports(&info);

        match self.runtime.stop(id).await {
            Ok(()) => {}
            Err(e) if is_not_modified(&e) => {
                // Someone else stopped it and already settled its ports.
                debug!(container = %id, "Container already stopped");
                return Ok(());
            }
            Err(e) => return Err(LifecycleError::from_engine("stop", id, e)),
        }

        if was_running {
            self.release_ports(owner, &bound);
        }

        info!(container = %id, "Stopped container");
        Ok(())
    }

    /// Starts a stopped container. Its previous port binding is reused, not reserved again.
    pub async fn start_container(&self, id: &str) -> LifecycleResult<()> {
        self.ensure_available().await?;

        match self.runtime.start(id).await {
            Ok(()) => {}
            Err(e) if is_not_modified(&e) => debug!(container = %id, "Container already running"),
            Err(e) => return Err(LifecycleError::from_engine("start", id, e)),
        }

        info!(container = %id, "Started container");
        Ok(())
    }

    pub async fn remove_container(&self, id: &str) -> LifecycleResult<()> {
        self.ensure_available().await?;

        let info = self
            .runtime
            .inspect(id)
            .await
            .map_err(|e| LifecycleError::from_engine("inspect", id, e))?;
        let running = is_running(&info);
        let owner = info.id.as_deref().unwrap_or(id);

        self.runtime
            .remove(id, running)
            .await
            .map_err(|e| LifecycleError::from_engine("remove", id, e))?;

        // Only ports still assigned to this container go back; a port freed by an
        // earlier stop may have been handed out again.
        self.release_ports(owner, &host_ports(&info));

        info!(container = %id, "Removed container");
        Ok(())
    }

    pub fn port_usage(&self) -> PortUsage {
        self.ports.usage()
    }

    /// Re-reserves ports still bound by managed containers that outlived a previous process.
    pub async fn reconcile_ports(&self) -> LifecycleResult<usize> {
        self.ensure_available().await?;

        let summaries = self
            .runtime
            .list(false)
            .await
            .map_err(|source| LifecycleError::OperationFailed {
                action: "list",
                target: "containers".to_string(),
                source,
            })?;

        let mut claimed = 0;
        for summary in summaries {
            let managed = summary
                .labels
                .as_ref()
                .and_then(|l| l.get(MANAGED_LABEL))
                .is_some_and(|v| v == "true");
            if !managed {
                continue;
            }

            let Some(owner) = summary.id.as_deref() else {
                continue;
            };
            let ports = summary
                .ports
                .iter()
                .flatten()
                .filter_map(|p| p.public_port);
            for port in ports {
                if self.ports.claim(port, owner) {
                    claimed += 1;
                    debug!(port, container = %short_id(owner), "Reclaimed port");
                }
            }
        }

        info!(claimed, range = %self.ports.range(), "Port pool reconciled with running containers");
        Ok(claimed)
    }

    fn release_ports(&self, owner: &str, ports: &BTreeSet<u16>) {
        let range = self.ports.range();
        for &port in ports.iter().filter(|p| range.contains(**p)) {
            if self.ports.release_owned(port, owner) {
                info!(container = %short_id(owner), port, "Released port");
            }
        }
    }
}
