use clap::Subcommand;

use self::{render::RenderCommand, server::ServerCommand, worker::WorkerCommand};

pub mod render;
pub mod scene;
pub mod server;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 🚀 Start Server
    ///
    /// Wait for workers to register, split the image between them and
    /// assemble their results.
    Server(ServerCommand),

    /// 👷 Worker Mode
    ///
    /// Register with a coordinator and compute the pixels it assigns.
    Worker(WorkerCommand),

    /// 🧮 Local Render
    ///
    /// Render the whole image in this process.
    Render(RenderCommand),
}
