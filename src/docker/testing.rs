//! In-memory engine used by the manager and router tests.

use async_trait::async_trait;
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerConfig, ContainerInspectResponse, ContainerState, ContainerStateStatusEnum,
    ContainerSummary, HostConfig, NetworkSettings, Port, PortBinding, PortMap, PortTypeEnum,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::client::{ContainerRuntime, CpuSample, RunSpec, StatsSample};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub name: String,
    pub image: String,
    pub container_port: String,
    pub host_port: u16,
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub status: ContainerStateStatusEnum,
    /// Inspect returns a response without state, which normalization rejects.
    pub corrupt: bool,
}

impl FakeContainer {
    pub fn running(name: &str, host_port: u16) -> Self {
        Self {
            name: name.to_string(),
            image: "base-api-server:latest".to_string(),
            container_port: "5000/tcp".to_string(),
            host_port,
            env: Vec::new(),
            labels: HashMap::new(),
            status: ContainerStateStatusEnum::RUNNING,
            corrupt: false,
        }
    }

    pub fn managed(mut self) -> Self {
        self.labels
            .insert("dockyard.managed".to_string(), "true".to_string());
        self
    }

    fn is_running(&self) -> bool {
        self.status == ContainerStateStatusEnum::RUNNING
    }

    fn port_map(&self) -> PortMap {
        let mut map = HashMap::new();
        map.insert(
            self.container_port.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(self.host_port.to_string()),
            }]),
        );
        map
    }
}

#[derive(Default)]
struct FakeState {
    containers: BTreeMap<String, FakeContainer>,
    stats: HashMap<String, StatsSample>,
    unavailable: bool,
    fail_run: Option<String>,
    fail_remove: Option<String>,
    next_id: u64,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

fn server_error(status_code: u16, message: impl Into<String>) -> DockerError {
    DockerError::DockerResponseServerError {
        status_code,
        message: message.into(),
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Makes every subsequent `run` fail with the given engine message.
    pub fn fail_runs(&self, message: &str) {
        self.state.lock().unwrap().fail_run = Some(message.to_string());
    }

    /// Makes every subsequent `remove` fail with the given engine message.
    pub fn fail_removes(&self, message: &str) {
        self.state.lock().unwrap().fail_remove = Some(message.to_string());
    }

    /// Inserts a container as if something else had created it. Returns its full id.
    pub fn insert(&self, container: FakeContainer) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("c{:011}{}", state.next_id, "0".repeat(52));
        state.containers.insert(id.clone(), container);
        id
    }

    pub fn set_stats(&self, id: &str, sample: StatsSample) {
        let mut state = self.state.lock().unwrap();
        if let Some(key) = Self::resolve(&state, id) {
            state.stats.insert(key, sample);
        }
    }

    pub fn container(&self, id: &str) -> Option<FakeContainer> {
        let state = self.state.lock().unwrap();
        Self::resolve(&state, id).map(|key| state.containers[&key].clone())
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    // Same lookup rules as the engine: full id, id prefix, or name.
    fn resolve(state: &FakeState, id: &str) -> Option<String> {
        let name = id.trim_start_matches('/');
        state
            .containers
            .iter()
            .find(|(key, c)| key.as_str() == id || key.starts_with(id) || c.name == name)
            .map(|(key, _)| key.clone())
    }

    fn record(state: &mut FakeState, call: String) -> Result<(), DockerError> {
        state.calls.push(call);
        if state.unavailable {
            return Err(server_error(500, "Cannot connect to the Docker daemon"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeEngine {
    async fn ping(&self) -> Result<(), DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, "ping".to_string())
    }

    async fn run(&self, spec: RunSpec) -> Result<String, DockerError> {
        {
            let mut state = self.state.lock().unwrap();
            Self::record(&mut state, format!("run {}", spec.name))?;
            if let Some(message) = state.fail_run.clone() {
                return Err(server_error(404, message));
            }
            if state.containers.values().any(|c| c.name == spec.name) {
                return Err(server_error(409, format!("name {} already in use", spec.name)));
            }
        }

        Ok(self.insert(FakeContainer {
            name: spec.name,
            image: spec.image,
            container_port: spec.container_port,
            host_port: spec.host_port,
            env: spec.env,
            labels: spec.labels,
            status: ContainerStateStatusEnum::RUNNING,
            corrupt: false,
        }))
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("list all={all}"))?;

        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| all || c.is_running())
            .map(|(id, c)| ContainerSummary {
                id: Some(id.clone()),
                names: Some(vec![format!("/{}", c.name)]),
                image: Some(c.image.clone()),
                state: Some(c.status.to_string()),
                labels: Some(c.labels.clone()),
                ports: c.is_running().then(|| {
                    vec![Port {
                        ip: Some("0.0.0.0".to_string()),
                        private_port: 5000,
                        public_port: Some(c.host_port),
                        typ: Some(PortTypeEnum::TCP),
                    }]
                }),
                ..Default::default()
            })
            .collect())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("inspect {id}"))?;
        let key = Self::resolve(&state, id)
            .ok_or_else(|| server_error(404, format!("No such container: {id}")))?;
        let c = &state.containers[&key];

        Ok(ContainerInspectResponse {
            id: Some(key.clone()),
            name: Some(format!("/{}", c.name)),
            created: Some("2026-10-16T10:00:00.000000000Z".to_string()),
            image: Some("sha256:0123456789".to_string()),
            config: Some(ContainerConfig {
                image: Some(c.image.clone()),
                env: Some(c.env.clone()),
                labels: Some(c.labels.clone()),
                ..Default::default()
            }),
            state: (!c.corrupt).then(|| ContainerState {
                status: Some(c.status),
                running: Some(c.is_running()),
                ..Default::default()
            }),
            host_config: Some(HostConfig {
                port_bindings: Some(c.port_map()),
                ..Default::default()
            }),
            // Live bindings only exist while the container runs.
            network_settings: Some(NetworkSettings {
                ports: c.is_running().then(|| c.port_map()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn stats(&self, id: &str) -> Result<StatsSample, DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("stats {id}"))?;
        let key = Self::resolve(&state, id)
            .ok_or_else(|| server_error(404, format!("No such container: {id}")))?;

        if !state.containers[&key].is_running() {
            return Ok(StatsSample::default());
        }
        Ok(state.stats.get(&key).cloned().unwrap_or_else(|| StatsSample {
            cpu: CpuSample {
                total_usage: 0,
                system_usage: Some(0),
            },
            memory_usage: Some(0),
            ..Default::default()
        }))
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("start {id}"))?;
        let key = Self::resolve(&state, id)
            .ok_or_else(|| server_error(404, format!("No such container: {id}")))?;
        let container = state.containers.get_mut(&key).unwrap();
        if container.is_running() {
            return Err(server_error(304, "container already started"));
        }
        container.status = ContainerStateStatusEnum::RUNNING;
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("stop {id}"))?;
        let key = Self::resolve(&state, id)
            .ok_or_else(|| server_error(404, format!("No such container: {id}")))?;
        let container = state.containers.get_mut(&key).unwrap();
        if !container.is_running() {
            return Err(server_error(304, "container already stopped"));
        }
        container.status = ContainerStateStatusEnum::EXITED;
        Ok(())
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError> {
        let mut state = self.state.lock().unwrap();
        Self::record(&mut state, format!("remove {id} force={force}"))?;
        let key = Self::resolve(&state, id)
            .ok_or_else(|| server_error(404, format!("No such container: {id}")))?;
        if let Some(message) = state.fail_remove.clone() {
            return Err(server_error(500, message));
        }
        if state.containers[&key].is_running() && !force {
            return Err(server_error(409, "cannot remove a running container"));
        }
        state.containers.remove(&key);
        state.stats.remove(&key);
        Ok(())
    }
}

/// Wraps a `FakeEngine` and parks the first `stop` or `remove` call before it reaches
/// the engine, so a test can interleave other operations with one that already
/// inspected the container.
pub struct GatedRuntime {
    inner: Arc<FakeEngine>,
    gated: &'static str,
    armed: AtomicBool,
    entered: Notify,
    open: Notify,
}

impl GatedRuntime {
    pub fn new(inner: Arc<FakeEngine>, gated: &'static str) -> Self {
        Self {
            inner,
            gated,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            open: Notify::new(),
        }
    }

    /// Resolves once the gated call is parked.
    pub async fn parked(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.open.notify_one();
    }

    async fn pass(&self, call: &str) {
        if call == self.gated && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.open.notified().await;
        }
    }
}

#[async_trait]
impl ContainerRuntime for GatedRuntime {
    async fn ping(&self) -> Result<(), DockerError> {
        self.inner.ping().await
    }

    async fn run(&self, spec: RunSpec) -> Result<String, DockerError> {
        self.inner.run(spec).await
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        self.inner.list(all).await
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.inner.inspect(id).await
    }

    async fn stats(&self, id: &str) -> Result<StatsSample, DockerError> {
        self.inner.stats(id).await
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        self.inner.start(id).await
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        self.pass("stop").await;
        self.inner.stop(id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError> {
        self.pass("remove").await;
        self.inner.remove(id, force).await
    }
}
