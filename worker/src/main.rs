use shared::{
    env,
    networking::worker::{CoordinatorLocation, Worker, DEFAULT_PORT},
};

#[tokio::main]
async fn main() {
    env::init();

    let name = env::var("WORKER_NAME").unwrap_or_else(worker::default_name);
    let address = env::var("WORKER_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = env::var("WORKER_PORT").unwrap_or(DEFAULT_PORT);

    let mut config = Worker::new(name, address, port);
    if let Some(coordinator) = env::var("COORDINATOR") {
        config.coordinator = CoordinatorLocation::Static(coordinator);
    }
    config.threads = env::var("WORKER_THREADS");

    worker::run_worker(config).await;
}
