use serde::{Deserialize, Serialize};

/// Identity of a registered render node. `address:port` is where the node
/// serves Configure and Compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub hostname: String,
    pub address: String,
    pub port: u16,
}

impl WorkerRecord {
    pub fn new(hostname: String, address: String, port: u16) -> Self {
        Self {
            hostname,
            address,
            port,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl std::fmt::Display for WorkerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.hostname, self.address, self.port)
    }
}
