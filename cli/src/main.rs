pub mod commands;

use clap::Parser;
use commands::{render::run_render, Commands};

/// Distributed Mandelbrot renderer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => server::run_server(&args.into_server()).await,
        Commands::Worker(args) => worker::run_worker(args.into_worker()).await,
        Commands::Render(args) => run_render(args).await,
    }
}
