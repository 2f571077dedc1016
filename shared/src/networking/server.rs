use std::{net::SocketAddrV4, path::PathBuf, time::Duration};

use crate::models::render_job::RenderSettings;

use super::discovery::DEFAULT_GROUP;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_QUALITY: u8 = 90;

/// How coordinates reach a render node during Compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// The node derives coordinates from its job's partition.
    #[default]
    WorkerGenerated,
    /// The coordinator pushes every coordinate over the stream.
    CoordinatorStreamed,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub address: String,
    pub port: u16,
    pub required_workers: usize,
    pub settings: RenderSettings,
    /// Multicast group to announce on; `None` disables discovery.
    pub discovery: Option<SocketAddrV4>,
    pub registration_timeout: Option<Duration>,
    pub dispatch: DispatchMode,
    pub output: PathBuf,
    pub quality: u8,
}

impl Server {
    pub fn new(address: String, port: u16, required_workers: usize, settings: RenderSettings) -> Self {
        Self {
            address,
            port,
            required_workers,
            settings,
            discovery: Some(DEFAULT_GROUP),
            registration_timeout: None,
            dispatch: DispatchMode::default(),
            output: PathBuf::from("output.jpeg"),
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
