use std::{net::SocketAddrV4, path::PathBuf, time::Duration};

use clap::Parser;
use shared::networking::{
    discovery::DEFAULT_GROUP,
    server::{DispatchMode, Server, DEFAULT_PORT, DEFAULT_QUALITY},
};

use super::scene::SceneArgs;

/// 🖥️ Server Command
///
/// This command is used to configure and 🚀 start the coordinator.
#[derive(Parser, Debug)]
#[command(name = "server", about = "🚀 Start and configure the coordinator.", long_about = None)]
pub struct ServerCommand {
    /// 📌 Server IP address
    ///
    /// Specify the IP address 🌐 where the coordinator will listen for registrations.
    #[arg(short, long, value_name = "ADDRESS", default_value = "0.0.0.0")]
    pub address: String,

    /// 🚪 Server port
    ///
    /// Define the port number 🎛️ on which the coordinator will listen.
    #[arg(short, long, value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// 👷 Number of workers to wait for before rendering
    #[arg(short, long, value_name = "COUNT", default_value_t = 1)]
    pub workers: usize,

    #[command(flatten)]
    pub scene: SceneArgs,

    /// 🖼️ Output image, format inferred from the extension
    #[arg(short, long, value_name = "FILE", default_value = "output.jpeg")]
    pub output: PathBuf,

    /// 🎚️ JPEG quality, 1 to 100
    #[arg(long, value_name = "QUALITY", default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,

    /// 📡 Multicast group to announce the coordinator on
    #[arg(long, value_name = "GROUP", default_value_t = DEFAULT_GROUP)]
    pub group: SocketAddrV4,

    /// 🔇 Do not announce; workers must be given the coordinator address
    #[arg(long)]
    pub no_discovery: bool,

    /// ⏱️ Give up if the workers have not all registered after this many seconds
    #[arg(long, value_name = "SECS")]
    pub registration_timeout: Option<u64>,

    /// 📤 Push every coordinate to the workers instead of letting them derive their own
    #[arg(long)]
    pub stream_coordinates: bool,
}

impl ServerCommand {
    pub fn into_server(self) -> Server {
        let mut server = Server::new(self.address, self.port, self.workers, self.scene.settings());
        server.discovery = (!self.no_discovery).then_some(self.group);
        server.registration_timeout = self.registration_timeout.map(Duration::from_secs);
        server.output = self.output;
        server.quality = self.quality;
        if self.stream_coordinates {
            server.dispatch = DispatchMode::CoordinatorStreamed;
        }
        server
    }
}
