pub mod dispatch;
pub mod error;
pub mod server_state;

use std::{
    net::{SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use log::{debug, error, info, warn};
use shared::{
    env, logger,
    models::{
        canvas::Canvas, partition::partition, render_job::RenderSettings,
        worker_record::WorkerRecord,
    },
    networking::{
        discovery::{Broadcaster, ANNOUNCEMENT, BROADCAST_INTERVAL},
        error::NetworkingError,
        message::Message,
        read_message,
        result::NetworkingResult,
        send_message,
        server::{DispatchMode, Server},
    },
    sink::{FileSink, ImageSink},
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{oneshot, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use self::{
    dispatch::NodeReport,
    error::{CoordinatorError, CoordinatorResult},
    server_state::{Phase, ServerState},
};

/// Outcome of one distributed render.
#[derive(Debug)]
pub struct RenderReport {
    pub canvas: Canvas,
    pub nodes: Vec<NodeReport>,
    pub elapsed: Duration,
}

impl RenderReport {
    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(NodeReport::is_complete)
    }
}

pub struct Coordinator {
    config: Server,
    listener: TcpListener,
    state: Arc<ServerState>,
    frozen: oneshot::Receiver<Vec<WorkerRecord>>,
}

impl Coordinator {
    pub async fn bind(config: Server) -> CoordinatorResult<Self> {
        config.settings.validate()?;
        if config.required_workers == 0 {
            return Err(CoordinatorError::NoWorkersRequired);
        }

        let listener = TcpListener::bind(config.listen_addr())
            .await
            .map_err(NetworkingError::from)?;
        let (state, frozen) = ServerState::new(config.required_workers);

        Ok(Self {
            config,
            listener,
            state: Arc::new(state),
            frozen,
        })
    }

    pub fn local_addr(&self) -> CoordinatorResult<SocketAddr> {
        Ok(self.listener.local_addr().map_err(NetworkingError::from)?)
    }

    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.state.subscribe()
    }

    /// Announces, collects registrations, then renders once the registry is
    /// full. Background tasks stop when this returns, whatever the outcome.
    pub async fn run(self, shutdown: CancellationToken) -> CoordinatorResult<RenderReport> {
        let Coordinator {
            config,
            listener,
            state,
            frozen,
        } = self;

        let background = shutdown.child_token();
        let _stop_background = background.clone().drop_guard();

        if let Some(group) = config.discovery {
            tokio::spawn(announce(group, background.clone()));
        }
        info!(
            "Coordinator listening on {}, waiting for {} workers",
            listener.local_addr().map_err(NetworkingError::from)?,
            config.required_workers
        );
        tokio::spawn(accept_loop(listener, state.clone(), background.clone()));

        let workers = await_registrations(frozen, &state, config.registration_timeout, &shutdown).await?;
        info!("All {} workers registered", workers.len());

        let render = tokio::spawn(start_rendering(
            config.settings,
            workers,
            state.clone(),
            config.dispatch,
        ));
        let abort = render.abort_handle();

        tokio::select! {
            joined = render => joined?,
            _ = shutdown.cancelled() => {
                abort.abort();
                Err(CoordinatorError::Cancelled)
            }
        }
    }
}

async fn announce(group: SocketAddrV4, cancel: CancellationToken) {
    let outcome = match Broadcaster::connect(SocketAddr::V4(group)).await {
        Ok(broadcaster) => {
            broadcaster
                .broadcast(ANNOUNCEMENT, BROADCAST_INTERVAL, cancel)
                .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        error!("Discovery broadcast on {} failed: {}", group, e);
    }
}

async fn await_registrations(
    frozen: oneshot::Receiver<Vec<WorkerRecord>>,
    state: &ServerState,
    timeout: Option<Duration>,
    shutdown: &CancellationToken,
) -> CoordinatorResult<Vec<WorkerRecord>> {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        workers = frozen => workers.map_err(|_| CoordinatorError::Cancelled),
        _ = shutdown.cancelled() => Err(CoordinatorError::Cancelled),
        _ = deadline => Err(CoordinatorError::RegistrationTimeout {
            registered: state.registered(),
            required: state.required_workers(),
        }),
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>, stop: CancellationToken) {
    loop {
        let (socket, peer) = tokio::select! {
            _ = stop.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, &state).await {
                error!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream, state: &ServerState) -> NetworkingResult<()> {
    debug!("Handling new connection...");
    let reply = match read_message(&mut socket).await? {
        Some(Message::Register(worker)) => match state.register(worker.clone()) {
            Ok(count) => {
                info!(
                    "Registered {} ({} of {})",
                    worker,
                    count,
                    state.required_workers()
                );
                Message::Ack
            }
            Err(e) => {
                warn!("Rejected registration from {}: {}", worker, e);
                Message::Error(e.to_string())
            }
        },
        Some(other) => Message::Error(format!("unsupported request: {}", other.kind())),
        None => return Ok(()),
    };
    send_message(&mut socket, &reply).await
}

/// Partitions the image over `workers`, configures every node, then drains
/// their result streams into one canvas.
pub async fn start_rendering(
    settings: RenderSettings,
    workers: Vec<WorkerRecord>,
    state: Arc<ServerState>,
    mode: DispatchMode,
) -> CoordinatorResult<RenderReport> {
    let started = Instant::now();

    state.set_phase(Phase::Partitioning);
    let partitions = partition(settings.pixel_count(), workers.len());
    let jobs: Vec<_> = partitions.iter().map(|p| settings.job(*p)).collect();
    for (worker, partition) in workers.iter().zip(&partitions) {
        debug!("{} gets {:?}", worker, partition);
    }

    state.set_phase(Phase::Dispatching);
    let configured = join_all(
        workers
            .iter()
            .zip(&jobs)
            .map(|(worker, job)| dispatch::configure(worker, job)),
    )
    .await;

    state.set_phase(Phase::Streaming);
    let mut canvas = Canvas::new(settings.width, settings.height);
    let mut nodes = Vec::with_capacity(workers.len());
    {
        let regions = canvas.regions_mut(&partitions)?;
        let mut drains = Vec::with_capacity(workers.len());
        for (((worker, job), region), configured) in
            workers.iter().zip(&jobs).zip(regions).zip(configured)
        {
            match configured {
                Ok(()) => drains.push(dispatch::drain(worker, *job, region, mode)),
                Err(e) => nodes.push(NodeReport::failed(worker.clone(), *job, e)),
            }
        }
        nodes.extend(join_all(drains).await);
    }

    state.set_phase(Phase::Aggregating);
    let received: u32 = nodes.iter().map(|node| node.received).sum();
    let failed = nodes.iter().filter(|node| node.error.is_some()).count();
    if failed > 0 {
        warn!("{} of {} render nodes failed", failed, nodes.len());
    }
    info!(
        "Rendering finished: {} of {} pixels in {:?}",
        received,
        settings.pixel_count(),
        started.elapsed()
    );

    state.set_phase(Phase::Done);
    Ok(RenderReport {
        canvas,
        nodes,
        elapsed: started.elapsed(),
    })
}

pub async fn run_server(server: &Server) {
    env::init();
    logger::init();

    match run(server).await {
        Ok(report) if report.is_complete() => info!("Server shutdown gracefully"),
        Ok(_) => warn!("Server finished with missing pixels"),
        Err(e) => error!("Server error: {}", e),
    }
}

async fn run(server: &Server) -> CoordinatorResult<RenderReport> {
    let sink = FileSink::new(server.output.clone(), server.quality)?;
    let coordinator = Coordinator::bind(server.clone()).await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                shutdown.cancel();
            }
        });
    }

    let report = coordinator.run(shutdown).await?;
    sink.write(&report.canvas)?;
    Ok(report)
}
