use std::net::{IpAddr, SocketAddrV4};

use super::{discovery::DEFAULT_GROUP, server};

pub const DEFAULT_PORT: u16 = 8081;

/// Where a render node finds its coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorLocation {
    /// Fixed `host:port`.
    Static(String),
    /// Listen on `group`, then dial the announcer on `port`.
    Discover { group: SocketAddrV4, port: u16 },
}

impl Default for CoordinatorLocation {
    fn default() -> Self {
        CoordinatorLocation::Discover {
            group: DEFAULT_GROUP,
            port: server::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Worker {
    /// Reported as the node's hostname.
    pub name: String,
    pub address: String,
    pub port: u16,
    pub coordinator: CoordinatorLocation,
    /// Address the coordinator should dial back; detected when `None`.
    pub advertise: Option<IpAddr>,
    /// Evaluator threads; available parallelism when `None`.
    pub threads: Option<usize>,
}

impl Worker {
    pub fn new(name: String, address: String, port: u16) -> Self {
        Self {
            name,
            address,
            port,
            coordinator: CoordinatorLocation::default(),
            advertise: None,
            threads: None,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
