use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use shared::{
    compute::strategy::{render, Strategy, DEFAULT_MAX_TASKS},
    env, logger,
    networking::server::DEFAULT_QUALITY,
    sink::{FileSink, ImageSink},
};
use tokio::time::Instant;

use super::scene::SceneArgs;

/// 🧮 Render Command
///
/// Renders the whole image in this process, no workers involved.
#[derive(Parser, Debug)]
pub struct RenderCommand {
    #[command(flatten)]
    pub scene: SceneArgs,

    /// ⚙️ Concurrency strategy: sequential, unbounded, bounded or pooled
    #[arg(short, long, default_value_t = Strategy::Pooled)]
    pub strategy: Strategy,

    /// 🚦 Concurrent tasks allowed by the bounded strategy
    #[arg(long, default_value_t = DEFAULT_MAX_TASKS)]
    pub max_tasks: usize,

    #[arg(short, long, value_name = "FILE", default_value = "output.jpeg")]
    pub output: PathBuf,

    #[arg(long, value_name = "QUALITY", default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,
}

impl RenderCommand {
    fn strategy(&self) -> Strategy {
        match self.strategy {
            Strategy::Bounded { .. } => Strategy::Bounded {
                max_tasks: self.max_tasks,
            },
            other => other,
        }
    }
}

pub async fn run_render(command: RenderCommand) {
    env::init();
    logger::init();

    let settings = command.scene.settings();
    if let Err(e) = settings.validate() {
        error!("Invalid render settings: {}", e);
        return;
    }
    let sink = match FileSink::new(command.output.clone(), command.quality) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Invalid output: {}", e);
            return;
        }
    };

    let strategy = command.strategy();
    let started = Instant::now();
    let canvas = render(&settings, strategy).await;
    info!(
        "Rendered {}x{} with the {} strategy in {:?}",
        settings.width,
        settings.height,
        strategy,
        started.elapsed()
    );

    if let Err(e) = sink.write(&canvas) {
        error!("Failed to write {}: {}", sink.path().display(), e);
    }
}
