use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum, PortMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;

use super::client::StatsSample;
use super::error::{LifecycleError, LifecycleResult};

pub const MANAGED_LABEL: &str = "dockyard.managed";
pub const HOST_PORT_LABEL: &str = "dockyard.host-port";
pub const PRIMARY_INTERFACE: &str = "eth0";

const SHORT_ID_LEN: usize = 12;
const MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Exited,
    Unknown,
}

impl From<ContainerStateStatusEnum> for ContainerStatus {
    fn from(status: ContainerStateStatusEnum) -> Self {
        match status {
            ContainerStateStatusEnum::CREATED => ContainerStatus::Created,
            ContainerStateStatusEnum::RUNNING => ContainerStatus::Running,
            ContainerStateStatusEnum::PAUSED => ContainerStatus::Paused,
            ContainerStateStatusEnum::EXITED | ContainerStateStatusEnum::DEAD => {
                ContainerStatus::Exited
            }
            _ => ContainerStatus::Unknown,
        }
    }
}

/// Normalized view of one engine container. A snapshot, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub image: String,
    /// `"5000/tcp"` to `"0.0.0.0:8000"`.
    pub ports: BTreeMap<String, String>,
    pub created: String,
    pub state: String,
}

impl TryFrom<ContainerInspectResponse> for ContainerRecord {
    type Error = LifecycleError;

    fn try_from(info: ContainerInspectResponse) -> LifecycleResult<Self> {
        let full_id = info.id.clone().ok_or_else(|| LifecycleError::Mapping {
            id: "<unknown>".to_string(),
            reason: "missing container id".to_string(),
        })?;
        let id = short_id(&full_id).to_string();

        let engine_status = info
            .state
            .as_ref()
            .and_then(|s| s.status)
            .ok_or_else(|| LifecycleError::Mapping {
                id: id.clone(),
                reason: "missing state".to_string(),
            })?;

        let name = info
            .name
            .as_deref()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();

        let image = info
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .filter(|i| !i.is_empty())
            .or_else(|| info.image.clone())
            .unwrap_or_default();

        let mut ports = BTreeMap::new();
        if let Some(live) = info.network_settings.as_ref().and_then(|n| n.ports.as_ref()) {
            for (internal, bindings) in live {
                for binding in bindings.iter().flatten() {
                    ports.insert(
                        internal.clone(),
                        format!(
                            "{}:{}",
                            binding.host_ip.as_deref().unwrap_or_default(),
                            binding.host_port.as_deref().unwrap_or_default()
                        ),
                    );
                }
            }
        }

        Ok(Self {
            id,
            name,
            status: ContainerStatus::from(engine_status),
            image,
            ports,
            created: info.created.clone().unwrap_or_default(),
            state: engine_status.to_string(),
        })
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

pub fn is_running(info: &ContainerInspectResponse) -> bool {
    info.state.as_ref().is_some_and(|s| {
        s.running == Some(true) || s.status == Some(ContainerStateStatusEnum::RUNNING)
    })
}

/// Every host port the container publishes, live or configured.
///
/// Live bindings disappear from `NetworkSettings` once a container stops, so the
/// configured `HostConfig.PortBindings` are read as well.
pub fn host_ports(info: &ContainerInspectResponse) -> BTreeSet<u16> {
    let live = info.network_settings.as_ref().and_then(|n| n.ports.as_ref());
    let configured = info.host_config.as_ref().and_then(|h| h.port_bindings.as_ref());

    live.into_iter()
        .chain(configured)
        .flat_map(bound_ports)
        .collect()
}

fn bound_ports(map: &PortMap) -> impl Iterator<Item = u16> + '_ {
    map.values()
        .flatten()
        .flatten()
        .filter_map(|b| b.host_port.as_deref())
        .filter_map(|p| p.parse().ok())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContainerStatsSnapshot {
    pub container_id: String,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_usage: String,
    pub memory_limit: String,
    pub memory_percent: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub network_rx: String,
    pub network_tx: String,
    pub timestamp: f64,
}

impl ContainerStatsSnapshot {
    /// Derives metrics from one engine sample. Fails only when the engine sent no
    /// usable current reading (typically a container that is not running).
    pub fn from_sample(
        container_id: &str,
        name: &str,
        sample: &StatsSample,
        timestamp: f64,
    ) -> Result<Self, String> {
        if sample.cpu.system_usage.is_none() {
            return Err("engine returned no CPU reading".to_string());
        }
        let memory_usage = sample
            .memory_usage
            .ok_or_else(|| "engine returned no memory reading".to_string())?;
        let memory_limit = sample.memory_limit.unwrap_or(0);

        let net = sample
            .networks
            .get(PRIMARY_INTERFACE)
            .copied()
            .unwrap_or_default();

        Ok(Self {
            container_id: container_id.to_string(),
            name: name.to_string(),
            cpu_percent: round2(cpu_percent(sample)),
            memory_usage_bytes: memory_usage,
            memory_limit_bytes: memory_limit,
            memory_usage: megabytes(memory_usage),
            memory_limit: megabytes(memory_limit),
            memory_percent: round2(memory_percent(memory_usage, memory_limit)),
            network_rx_bytes: net.rx_bytes,
            network_tx_bytes: net.tx_bytes,
            network_rx: megabytes(net.rx_bytes),
            network_tx: megabytes(net.tx_bytes),
            timestamp,
        })
    }
}

pub fn cpu_percent(sample: &StatsSample) -> f64 {
    let (Some(system), Some(presystem)) = (sample.cpu.system_usage, sample.precpu.system_usage)
    else {
        return 0.0;
    };

    let system_delta = system as f64 - presystem as f64;
    if system_delta <= 0.0 {
        return 0.0;
    }
    let cpu_delta = sample.cpu.total_usage as f64 - sample.precpu.total_usage as f64;
    (cpu_delta / system_delta * 100.0).max(0.0)
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / MB)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::client::{CpuSample, NetworkCounters};
    use bollard::models::{ContainerConfig, ContainerState, HostConfig, NetworkSettings, PortBinding};
    use std::collections::HashMap;

    fn binding(ip: &str, port: &str) -> PortBinding {
        PortBinding {
            host_ip: Some(ip.to_string()),
            host_port: Some(port.to_string()),
        }
    }

    fn running_container() -> ContainerInspectResponse {
        let mut ports: PortMap = HashMap::new();
        ports.insert(
            "5000/tcp".to_string(),
            Some(vec![binding("0.0.0.0", "8042"), binding("::", "8042")]),
        );
        ports.insert("6000/udp".to_string(), None);

        ContainerInspectResponse {
            id: Some("0123456789abcdef0123".to_string()),
            name: Some("/api-server-1".to_string()),
            created: Some("2026-10-16T10:00:00Z".to_string()),
            image: Some("sha256:deadbeef".to_string()),
            config: Some(ContainerConfig {
                image: Some("base-api-server:latest".to_string()),
                ..Default::default()
            }),
            state: Some(ContainerState {
                status: Some(ContainerStateStatusEnum::RUNNING),
                running: Some(true),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn sample(cpu: (u64, u64), precpu: (u64, u64)) -> StatsSample {
        StatsSample {
            cpu: CpuSample {
                total_usage: cpu.0,
                system_usage: Some(cpu.1),
            },
            precpu: CpuSample {
                total_usage: precpu.0,
                system_usage: Some(precpu.1),
            },
            memory_usage: Some(50 * 1024 * 1024),
            memory_limit: Some(200 * 1024 * 1024),
            networks: HashMap::new(),
        }
    }

    #[test]
    fn normalizes_inspect_response() {
        let record = ContainerRecord::try_from(running_container()).unwrap();

        assert_eq!(record.id, "0123456789ab");
        assert_eq!(record.name, "api-server-1");
        assert_eq!(record.status, ContainerStatus::Running);
        assert_eq!(record.state, "running");
        assert_eq!(record.image, "base-api-server:latest");
        assert_eq!(record.created, "2026-10-16T10:00:00Z");
        assert_eq!(record.ports.len(), 1);
        assert_eq!(record.ports["5000/tcp"], ":::8042");
    }

    #[test]
    fn image_falls_back_to_image_id() {
        let mut info = running_container();
        info.config = None;
        let record = ContainerRecord::try_from(info).unwrap();
        assert_eq!(record.image, "sha256:deadbeef");
    }

    #[test]
    fn missing_state_is_a_mapping_error() {
        let mut info = running_container();
        info.state = None;
        let err = ContainerRecord::try_from(info).unwrap_err();
        assert!(matches!(err, LifecycleError::Mapping { ref id, .. } if id == "0123456789ab"));
    }

    #[test]
    fn engine_states_map_to_lifecycle_status() {
        assert_eq!(ContainerStatus::from(ContainerStateStatusEnum::CREATED), ContainerStatus::Created);
        assert_eq!(ContainerStatus::from(ContainerStateStatusEnum::PAUSED), ContainerStatus::Paused);
        assert_eq!(ContainerStatus::from(ContainerStateStatusEnum::EXITED), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from(ContainerStateStatusEnum::DEAD), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from(ContainerStateStatusEnum::RESTARTING), ContainerStatus::Unknown);
        assert_eq!(serde_json::to_string(&ContainerStatus::Running).unwrap(), "\"running\"");
    }

    #[test]
    fn host_ports_merge_live_and_configured_bindings() {
        let mut info = running_container();
        let mut configured: PortMap = HashMap::new();
        configured.insert("5000/tcp".to_string(), Some(vec![binding("", "8042")]));
        configured.insert("7000/tcp".to_string(), Some(vec![binding("", "8100"), binding("", "")]));
        info.host_config = Some(HostConfig {
            port_bindings: Some(configured),
            ..Default::default()
        });

        assert_eq!(host_ports(&info).into_iter().collect::<Vec<_>>(), vec![8042, 8100]);

        info.network_settings = None;
        assert_eq!(host_ports(&info).into_iter().collect::<Vec<_>>(), vec![8042, 8100]);
    }

    #[test]
    fn running_detection() {
        let mut info = running_container();
        assert!(is_running(&info));
        info.state = Some(ContainerState {
            status: Some(ContainerStateStatusEnum::EXITED),
            running: Some(false),
            ..Default::default()
        });
        assert!(!is_running(&info));
    }

    #[test]
    fn cpu_percent_from_deltas() {
        assert_eq!(cpu_percent(&sample((200, 2000), (100, 1000))), 10.0);
        assert_eq!(cpu_percent(&sample((200, 1000), (100, 1000))), 0.0);

        let mut no_previous = sample((200, 2000), (0, 0));
        no_previous.precpu.system_usage = None;
        assert_eq!(cpu_percent(&no_previous), 0.0);
    }

    #[test]
    fn memory_percent_guards_zero_limit() {
        assert_eq!(memory_percent(50, 200), 25.0);
        assert_eq!(memory_percent(50, 0), 0.0);
    }

    #[test]
    fn snapshot_reads_primary_interface() {
        let mut s = sample((200, 2000), (100, 1000));
        s.networks.insert(
            "eth0".to_string(),
            NetworkCounters {
                rx_bytes: 3 * 1024 * 1024,
                tx_bytes: 1024 * 1024 / 2,
            },
        );
        s.networks.insert(
            "eth1".to_string(),
            NetworkCounters {
                rx_bytes: 99,
                tx_bytes: 99,
            },
        );

        let snap = ContainerStatsSnapshot::from_sample("abc", "web", &s, 1.5).unwrap();
        assert_eq!(snap.cpu_percent, 10.0);
        assert_eq!(snap.memory_percent, 25.0);
        assert_eq!(snap.memory_usage, "50.00 MB");
        assert_eq!(snap.memory_limit, "200.00 MB");
        assert_eq!(snap.network_rx_bytes, 3 * 1024 * 1024);
        assert_eq!(snap.network_rx, "3.00 MB");
        assert_eq!(snap.network_tx, "0.50 MB");
        assert_eq!(snap.timestamp, 1.5);
    }

    #[test]
    fn snapshot_defaults_missing_interface_to_zero() {
        let snap =
            ContainerStatsSnapshot::from_sample("abc", "web", &sample((1, 2), (0, 1)), 0.0).unwrap();
        assert_eq!(snap.network_rx_bytes, 0);
        assert_eq!(snap.network_tx_bytes, 0);
    }

    #[test]
    fn snapshot_requires_current_reading() {
        let mut s = sample((200, 2000), (100, 1000));
        s.cpu.system_usage = None;
        assert!(ContainerStatsSnapshot::from_sample("abc", "web", &s, 0.0).is_err());

        let mut s = sample((200, 2000), (100, 1000));
        s.memory_usage = None;
        assert!(ContainerStatsSnapshot::from_sample("abc", "web", &s, 0.0).is_err());
    }
}
