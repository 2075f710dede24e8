mod client;
mod container;
mod error;
mod lifecycle;
mod ports;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{ContainerRuntime, DockerClient, DockerConfig};
pub use container::{ContainerRecord, ContainerStatsSnapshot, ContainerStatus};
pub use error::LifecycleError;
pub use lifecycle::{ContainerLifecycleManager, LifecycleConfig};
pub use ports::{PortAllocator, PortError, PortRange, PortUsage};
