use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, TcpListener};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("Invalid port range {start}-{end}: start must be below end")]
    InvalidRange { start: u16, end: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No available ports in range {0}")]
pub struct PortsExhausted(pub PortRange);

/// Half-open window `[start, end)` of host ports handed out to containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Result<Self, PortError> {
        if start >= end {
            return Err(PortError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.end - self.start)
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port < self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortUsage {
    pub used_ports: Vec<u16>,
    pub available_range: String,
    pub total_ports: usize,
}

/// Host-level check run on every candidate port before it is handed out.
pub type PortProbe = fn(u16) -> bool;

fn bind_probe(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// Reserved ports map to the full id of the container bound to them, or `None`
/// while the container is still being launched.
type Reservations = BTreeMap<u16, Option<String>>;

pub struct PortAllocator {
    range: PortRange,
    reserved: Mutex<Reservations>,
    probe: PortProbe,
}

impl PortAllocator {
    pub fn new(range: PortRange) -> Self {
        Self::with_probe(range, bind_probe)
    }

    pub fn with_probe(range: PortRange, probe: PortProbe) -> Self {
        Self {
            range,
            reserved: Mutex::new(BTreeMap::new()),
            probe,
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    // Every update is a single map operation, so a panic cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Reservations> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves the lowest port that is neither tracked nor bound on the host.
    pub fn reserve(&self) -> Result<u16, PortsExhausted> {
        let mut reserved = self.lock();

        for port in self.range.start..self.range.end {
            if reserved.contains_key(&port) {
                continue;
            }
            if !(self.probe)(port) {
                debug!(port, "Port is held outside the pool, skipping");
                continue;
            }
            reserved.insert(port, None);
            return Ok(port);
        }

        Err(PortsExhausted(self.range))
    }

    /// Records which container a freshly reserved port was handed to.
    pub fn assign(&self, port: u16, owner: &str) -> bool {
        match self.lock().get_mut(&port) {
            Some(slot) => {
                *slot = Some(owner.to_string());
                true
            }
            None => false,
        }
    }

    /// Marks a port already bound by a managed container as reserved, without probing.
    /// Returns false when the port lies outside the range or was already tracked.
    pub fn claim(&self, port: u16, owner: &str) -> bool {
        if !self.range.contains(port) {
            return false;
        }
        let mut reserved = self.lock();
        if reserved.contains_key(&port) {
            return false;
        }
        reserved.insert(port, Some(owner.to_string()));
        true
    }

    /// Returns a port to the pool. Unknown ports are ignored.
    pub fn release(&self, port: u16) -> bool {
        self.lock().remove(&port).is_some()
    }

    /// Releases `port` only while it is still assigned to `owner`. A port that was
    /// freed and handed to another container in the meantime is left alone.
    pub fn release_owned(&self, port: u16, owner: &str) -> bool {
        let mut reserved = self.lock();
        match reserved.get(&port) {
            Some(Some(current)) if current == owner => {
                reserved.remove(&port);
                true
            }
            _ => false,
        }
    }

    pub fn reserved(&self) -> Vec<u16> {
        self.lock().keys().copied().collect()
    }

    pub fn usage(&self) -> PortUsage {
        PortUsage {
            used_ports: self.reserved(),
            available_range: self.range.to_string(),
            total_ports: self.range.capacity(),
        }
    }
}
