use std::net::{IpAddr, SocketAddrV4};

use clap::Parser;
use shared::networking::{
    discovery::DEFAULT_GROUP,
    server,
    worker::{CoordinatorLocation, Worker, DEFAULT_PORT},
};

/// 👷 Worker Command
#[derive(Parser, Debug)]
pub struct WorkerCommand {
    /// Name reported to the coordinator, defaults to `HOSTNAME`
    #[arg(short, long)]
    pub name: Option<String>,

    #[arg(short, long, default_value = "0.0.0.0")]
    pub address: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Coordinator `host:port`; discovered over multicast when omitted
    #[arg(short, long, value_name = "HOST:PORT")]
    pub coordinator: Option<String>,

    /// Coordinator port to dial once discovered
    #[arg(long, default_value_t = server::DEFAULT_PORT)]
    pub coordinator_port: u16,

    /// Address the coordinator should dial back
    #[arg(long, value_name = "IP")]
    pub advertise: Option<IpAddr>,

    #[arg(long, default_value_t = DEFAULT_GROUP)]
    pub group: SocketAddrV4,

    /// Evaluator threads, defaults to the number of CPUs
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl WorkerCommand {
    pub fn into_worker(self) -> Worker {
        let name = self.name.unwrap_or_else(::worker::default_name);
        let mut worker = Worker::new(name, self.address, self.port);
        worker.coordinator = match self.coordinator {
            Some(endpoint) => CoordinatorLocation::Static(endpoint),
            None => CoordinatorLocation::Discover {
                group: self.group,
                port: self.coordinator_port,
            },
        };
        worker.advertise = self.advertise;
        worker.threads = self.threads;
        worker
    }
}
