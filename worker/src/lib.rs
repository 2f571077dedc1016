pub mod error;
pub mod node_state;

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use log::{debug, error, info, warn};
use shared::{
    compute::pool::EscapePool,
    env, logger,
    models::{
        coordinate::Coordinate, escape_result::EscapeResult, render_job::RenderJob,
        worker_record::WorkerRecord,
    },
    networking::{
        call,
        discovery::discover_coordinator,
        error::NetworkingError,
        message::Message,
        read_message,
        result::NetworkingResult,
        send_message,
        worker::{CoordinatorLocation, Worker},
        write_message,
    },
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    net::{TcpListener, TcpStream, UdpSocket},
    sync::{mpsc, watch},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use self::{
    error::{WorkerError, WorkerResult},
    node_state::{NodePhase, NodeState},
};

pub const REGISTER_ATTEMPTS: u32 = 5;
pub const REGISTER_BACKOFF: Duration = Duration::from_millis(500);

/// Coordinates buffered between the socket and the pool in push mode.
const COORDINATE_QUEUE_DEPTH: usize = 1024;

/// The machine's hostname, else a random `worker-<uuid>`.
pub fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()))
}

pub struct RenderNode {
    config: Worker,
    listener: TcpListener,
    state: Arc<NodeState>,
    pool: EscapePool,
}

impl RenderNode {
    pub async fn bind(config: Worker) -> WorkerResult<Self> {
        let listener = TcpListener::bind(config.listen_addr())
            .await
            .map_err(NetworkingError::from)?;
        let pool = match config.threads {
            Some(threads) => EscapePool::new(threads),
            None => EscapePool::with_available_parallelism(),
        };

        Ok(Self {
            config,
            listener,
            state: Arc::new(NodeState::new()),
            pool,
        })
    }

    pub fn local_addr(&self) -> WorkerResult<SocketAddr> {
        Ok(self.listener.local_addr().map_err(NetworkingError::from)?)
    }

    pub fn phases(&self) -> watch::Receiver<NodePhase> {
        self.state.subscribe()
    }

    /// Serves Configure and Compute while locating and registering with the
    /// coordinator, then keeps serving until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> WorkerResult<()> {
        let port = self.local_addr()?.port();
        let RenderNode {
            config,
            listener,
            state,
            pool,
        } = self;

        let serving = shutdown.child_token();
        let _stop_serving = serving.clone().drop_guard();
        info!("Render node {} serving on {}:{}", config.name, config.address, port);
        tokio::spawn(serve(listener, state.clone(), pool, serving));

        let record = enroll(&config, port, &state, &shutdown).await?;
        info!("Registered with the coordinator as {}", record);

        shutdown.cancelled().await;
        Ok(())
    }
}

async fn serve(listener: TcpListener, state: Arc<NodeState>, pool: EscapePool, stop: CancellationToken) {
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
            if let Err(e) = handle_connection(socket, &state, pool).await {
                error!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn enroll(
    config: &Worker,
    port: u16,
    state: &NodeState,
    cancel: &CancellationToken,
) -> WorkerResult<WorkerRecord> {
    state.set_phase(NodePhase::Discovering);
    let coordinator = locate_coordinator(&config.coordinator, cancel).await?;

    let address = match config.advertise {
        Some(address) => address,
        None => outbound_ip(&coordinator).await?,
    };
    let record = WorkerRecord::new(config.name.clone(), address.to_string(), port);

    state.set_phase(NodePhase::Registering);
    register(&coordinator, &record, cancel).await?;
    state.set_phase(NodePhase::Idle);
    Ok(record)
}

async fn locate_coordinator(location: &CoordinatorLocation, cancel: &CancellationToken) -> WorkerResult<String> {
    match location {
        CoordinatorLocation::Static(endpoint) => Ok(endpoint.clone()),
        CoordinatorLocation::Discover { group, port } => {
            match discover_coordinator(*group, cancel.clone()).await {
                Ok(ip) => {
                    info!("Discovered coordinator at {}", ip);
                    Ok(SocketAddr::new(ip, *port).to_string())
                }
                Err(NetworkingError::DiscoveryCancelled) => Err(WorkerError::Cancelled),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// The local address the OS would route through to reach `endpoint`.
///
/// Connecting a UDP socket sends nothing; it only selects the route.
pub async fn outbound_ip(endpoint: &str) -> NetworkingResult<IpAddr> {
    let target = tokio::net::lookup_host(endpoint).await?.next().ok_or_else(|| {
        NetworkingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{endpoint} did not resolve"),
        ))
    })?;
    let unspecified: IpAddr = match target {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };

    let socket = UdpSocket::bind((unspecified, 0)).await?;
    socket.connect(target).await?;
    Ok(socket.local_addr()?.ip())
}

/// Registers, retrying transport failures. A refusal from the coordinator is
/// final.
async fn register(coordinator: &str, record: &WorkerRecord, cancel: &CancellationToken) -> WorkerResult<()> {
    let request = Message::Register(record.clone());
    let mut attempt = 1;

    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            outcome = call(coordinator, &request) => outcome,
        };

        match outcome {
            Ok(()) => return Ok(()),
            Err(e @ NetworkingError::Remote(_)) => {
                return Err(WorkerError::Registration {
                    attempts: attempt,
                    source: e,
                })
            }
            Err(e) if attempt >= REGISTER_ATTEMPTS => {
                return Err(WorkerError::Registration {
                    attempts: attempt,
                    source: e,
                })
            }
            Err(e) => {
                warn!(
                    "Registration attempt {} with {} failed: {}",
                    attempt, coordinator, e
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
                    _ = tokio::time::sleep(REGISTER_BACKOFF * attempt) => {}
                }
                attempt += 1;
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, state: &NodeState, pool: EscapePool) -> NetworkingResult<()> {
    debug!("Handling new connection...");
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);

    match read_message(&mut reader).await? {
        Some(Message::Configure(job)) => {
            let reply = match check_job(&job) {
                Ok(()) => {
                    info!(
                        "Configured for pixels {}..{} of {}x{}",
                        job.partition_start, job.partition_end, job.settings.width, job.settings.height
                    );
                    state.configure(job);
                    Message::Ack
                }
                Err(reason) => {
                    warn!("Rejected render job: {}", reason);
                    Message::Error(reason)
                }
            };
            send_message(&mut writer, &reply).await
        }
        Some(Message::Compute) => {
            let Some(job) = state.job() else {
                return send_message(&mut writer, &no_job()).await;
            };
            let _computing = state.begin_compute();
            let results = pool.spawn(job.settings.viewport(), job.partition(), job.settings.max_iterations);
            let sent = stream_results(results, writer).await?;
            info!("Streamed {} results for pixels {}..{}", sent, job.partition_start, job.partition_end);
            Ok(())
        }
        Some(Message::ComputeStream) => {
            let Some(job) = state.job() else {
                return send_message(&mut writer, &no_job()).await;
            };
            let _computing = state.begin_compute();
            let (coordinates, incoming) = mpsc::channel(COORDINATE_QUEUE_DEPTH);
            let results = pool.spawn_from(incoming, job.settings.max_iterations);

            let (pumped, sent) = tokio::join!(
                pump_coordinates(&mut reader, coordinates),
                stream_results(results, writer)
            );
            let (pumped, sent) = (pumped?, sent?);
            info!("Evaluated {} pushed coordinates, streamed {} results", pumped, sent);
            Ok(())
        }
        Some(other) => {
            let reply = Message::Error(format!("unsupported request: {}", other.kind()));
            send_message(&mut writer, &reply).await
        }
        None => Ok(()),
    }
}

fn no_job() -> Message {
    Message::Error("no render job configured".to_string())
}

fn check_job(job: &RenderJob) -> Result<(), String> {
    job.settings.validate().map_err(|e| e.to_string())?;
    if job.partition_start > job.partition_end || job.partition_end > job.settings.pixel_count() {
        return Err(format!(
            "partition {}..{} outside the {} pixel image",
            job.partition_start,
            job.partition_end,
            job.settings.pixel_count()
        ));
    }
    Ok(())
}

/// Forwards `Coordinate` frames to the pool until the peer closes its send
/// side.
async fn pump_coordinates<R>(reader: &mut R, coordinates: mpsc::Sender<Coordinate>) -> NetworkingResult<u32>
where
    R: AsyncRead + Unpin,
{
    let mut pumped = 0;
    while let Some(message) = read_message(reader).await? {
        match message {
            Message::Coordinate(coordinate) => {
                if coordinates.send(coordinate).await.is_err() {
                    break;
                }
                pumped += 1;
            }
            other => {
                return Err(NetworkingError::UnexpectedMessage {
                    expected: "Coordinate",
                    received: other.kind().to_string(),
                })
            }
        }
    }
    Ok(pumped)
}

/// Writes each result as it arrives, flushing whenever the pool has nothing
/// ready, then closes the send side.
async fn stream_results<W>(mut results: mpsc::Receiver<EscapeResult>, writer: W) -> NetworkingResult<u32>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut sent = 0;

    while let Some(result) = results.recv().await {
        write_message(&mut writer, &Message::Result(result)).await?;
        sent += 1;
        while let Ok(result) = results.try_recv() {
            write_message(&mut writer, &Message::Result(result)).await?;
            sent += 1;
        }
        writer.flush().await?;
    }

    writer.shutdown().await?;
    Ok(sent)
}

pub async fn run_worker(worker: Worker) {
    env::init();
    logger::init();

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

    let outcome = match RenderNode::bind(worker).await {
        Ok(node) => node.run(shutdown).await,
        Err(e) => Err(e),
    };
    match outcome {
        Ok(()) | Err(WorkerError::Cancelled) => info!("Worker shutdown gracefully"),
        Err(e) => error!("Worker error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use shared::{
        compute::escape::escape_time,
        models::{partition::Partition, render_job::RenderSettings},
        networking::{connect, expect_ack},
    };

    use super::*;

    #[test]
    fn default_name_is_the_machine_hostname() {
        let name = default_name();
        assert!(!name.is_empty());
        match hostname::get().ok().and_then(|host| host.into_string().ok()) {
            Some(host) if !host.is_empty() => assert_eq!(name, host),
            _ => assert!(name.starts_with("worker-")),
        }
    }

    async fn spawn_node() -> (SocketAddr, Arc<NodeState>, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(NodeState::new());
        let stop = CancellationToken::new();
        tokio::spawn(serve(listener, state.clone(), EscapePool::new(2), stop.clone()));
        (addr, state, stop)
    }

    async fn collect(stream: &mut TcpStream) -> Vec<EscapeResult> {
        let mut results = Vec::new();
        while let Some(message) = read_message(stream).await.unwrap() {
            match message {
                Message::Result(result) => results.push(result),
                other => panic!("unexpected {other:?}"),
            }
        }
        results
    }

    fn small_job() -> RenderJob {
        RenderSettings {
            width: 20,
            height: 10,
            max_iterations: 50,
            ..RenderSettings::default()
        }
        .job(Partition::new(40, 140))
    }

    #[tokio::test]
    async fn compute_without_a_job_is_refused() {
        let (addr, _, _stop) = spawn_node().await;
        let mut stream = connect(&addr.to_string()).await.unwrap();
        send_message(&mut stream, &Message::Compute).await.unwrap();

        match read_message(&mut stream).await.unwrap() {
            Some(Message::Error(reason)) => assert_eq!(reason, "no render job configured"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn compute_streams_the_configured_partition() {
        let (addr, state, _stop) = spawn_node().await;
        let job = small_job();
        call(&addr.to_string(), &Message::Configure(job)).await.unwrap();
        assert_eq!(state.job(), Some(job));

        let mut stream = connect(&addr.to_string()).await.unwrap();
        send_message(&mut stream, &Message::Compute).await.unwrap();
        let mut results = collect(&mut stream).await;
        results.sort_by_key(|result| result.index);

        let viewport = job.settings.viewport();
        let expected: Vec<_> = job
            .partition()
            .indices()
            .map(|index| escape_time(viewport.to_coordinate(index), 50))
            .collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn compute_stream_evaluates_pushed_coordinates() {
        let (addr, _, _stop) = spawn_node().await;
        let job = small_job();
        call(&addr.to_string(), &Message::Configure(job)).await.unwrap();

        let stream = connect(&addr.to_string()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        send_message(&mut writer, &Message::ComputeStream).await.unwrap();

        let viewport = job.settings.viewport();
        let pusher = tokio::spawn(async move {
            for index in job.partition().indices() {
                send_message(&mut writer, &Message::Coordinate(viewport.to_coordinate(index)))
                    .await
                    .unwrap();
            }
            writer.shutdown().await.unwrap();
        });

        let mut reader = BufReader::new(reader);
        let mut count = 0;
        while let Some(Message::Result(result)) = read_message(&mut reader).await.unwrap() {
            assert_eq!(result, escape_time(viewport.to_coordinate(result.index), 50));
            count += 1;
        }
        pusher.await.unwrap();
        assert_eq!(count, job.partition().len());
    }

    #[tokio::test]
    async fn invalid_jobs_are_rejected() {
        let (addr, state, _stop) = spawn_node().await;
        let mut job = small_job();
        job.partition_end = 10_000;

        let mut stream = connect(&addr.to_string()).await.unwrap();
        send_message(&mut stream, &Message::Configure(job)).await.unwrap();
        assert!(matches!(
            expect_ack(&mut stream).await,
            Err(NetworkingError::Remote(_))
        ));
        assert_eq!(state.job(), None);
    }

    #[tokio::test]
    async fn outbound_ip_toward_loopback_is_loopback() {
        let ip = outbound_ip("127.0.0.1:9").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn registration_refusal_is_not_retried() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_message(&mut socket).await.unwrap();
            send_message(&mut socket, &Message::Error("registry closed".into()))
                .await
                .unwrap();
        });

        let record = WorkerRecord::new("late".into(), "127.0.0.1".into(), 1);
        match register(&addr, &record, &CancellationToken::new()).await {
            Err(WorkerError::Registration { attempts, .. }) => assert_eq!(attempts, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
