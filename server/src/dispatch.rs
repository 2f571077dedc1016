use log::{debug, error, info, warn};
use shared::{
    graphics::shade,
    models::{canvas::Region, render_job::RenderJob, worker_record::WorkerRecord},
    networking::{
        call, connect, error::NetworkingError, message::Message, read_message,
        result::NetworkingResult, send_message, server::DispatchMode, write_message,
    },
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    time::Instant,
};

/// What one render node delivered.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub worker: WorkerRecord,
    pub job: RenderJob,
    /// Distinct pixels written into the canvas.
    pub received: u32,
    /// Results dropped because they fell outside the node's partition or
    /// repeated a pixel already written.
    pub rejected: u32,
    pub error: Option<String>,
}

impl NodeReport {
    fn new(worker: WorkerRecord, job: RenderJob) -> Self {
        Self {
            worker,
            job,
            received: 0,
            rejected: 0,
            error: None,
        }
    }

    pub fn failed(worker: WorkerRecord, job: RenderJob, error: NetworkingError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(worker, job)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.received == self.job.partition().len()
    }
}

pub async fn configure(worker: &WorkerRecord, job: &RenderJob) -> NetworkingResult<()> {
    info!(
        "Configuring render node {} for pixels {}..{}",
        worker, job.partition_start, job.partition_end
    );
    let result = call(&worker.endpoint(), &Message::Configure(*job)).await;
    if let Err(e) = &result {
        error!("Failed to configure render node {}: {}", worker, e);
    }
    result
}

/// Opens a Compute stream to `worker` and writes every result into `region`.
///
/// Never fails: transport and protocol errors end this node's stream and
/// are recorded in the report, leaving its remaining pixels unwritten.
pub async fn drain(worker: &WorkerRecord, job: RenderJob, mut region: Region<'_>, mode: DispatchMode) -> NodeReport {
    let started = Instant::now();
    info!("[START] rendering on node: {}", worker.hostname);

    let mut report = NodeReport::new(worker.clone(), job);
    if let Err(e) = stream(worker, &job, &mut region, mode, &mut report).await {
        error!("Render node {} failed: {}", worker, e);
        report.error = Some(e.to_string());
    }

    info!(
        "[DONE] rendering on node: {}, {} of {} pixels, elapsed time: {:?}",
        worker.hostname,
        report.received,
        job.partition().len(),
        started.elapsed()
    );
    report
}

async fn stream(
    worker: &WorkerRecord,
    job: &RenderJob,
    region: &mut Region<'_>,
    mode: DispatchMode,
    report: &mut NodeReport,
) -> NetworkingResult<()> {
    let (reader, mut writer) = connect(&worker.endpoint()).await?.into_split();
    let mut reader = BufReader::new(reader);

    match mode {
        DispatchMode::WorkerGenerated => {
            send_message(&mut writer, &Message::Compute).await?;
            writer.shutdown().await?;
            receive(&mut reader, job, region, report).await
        }
        DispatchMode::CoordinatorStreamed => {
            send_message(&mut writer, &Message::ComputeStream).await?;
            let (pushed, received) = tokio::join!(
                push_coordinates(writer, job),
                receive(&mut reader, job, region, report)
            );
            let pushed = pushed?;
            debug!("Pushed {} coordinates to {}", pushed, worker);
            received
        }
    }
}

async fn push_coordinates<W>(writer: W, job: &RenderJob) -> NetworkingResult<u32>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut pushed = 0;
    for coordinate in job.settings.viewport().coordinates(job.partition()) {
        write_message(&mut writer, &Message::Coordinate(coordinate)).await?;
        pushed += 1;
    }
    writer.shutdown().await?;
    Ok(pushed)
}

async fn receive<R>(
    reader: &mut R,
    job: &RenderJob,
    region: &mut Region<'_>,
    report: &mut NodeReport,
) -> NetworkingResult<()>
where
    R: AsyncRead + Unpin,
{
    let theme = job.settings.color_theme;
    let max_iterations = job.settings.max_iterations;

    while let Some(message) = read_message(reader).await? {
        match message {
            Message::Result(result) => match region.put(&shade(theme, &result, max_iterations)) {
                Ok(()) => report.received += 1,
                Err(e) => {
                    warn!("Render node {} sent a rejected result: {}", report.worker, e);
                    report.rejected += 1;
                }
            },
            Message::Error(reason) => return Err(NetworkingError::Remote(reason)),
            other => {
                return Err(NetworkingError::UnexpectedMessage {
                    expected: "Result",
                    received: other.kind().to_string(),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        compute::escape::escape_time,
        models::{canvas::Canvas, partition::Partition, render_job::RenderSettings},
        networking::send_message,
    };

    #[tokio::test]
    async fn receive_writes_results_and_rejects_strays() {
        let settings = RenderSettings {
            width: 4,
            height: 4,
            ..RenderSettings::default()
        };
        let job = settings.job(Partition::new(0, 8));
        let worker = WorkerRecord::new("n".into(), "127.0.0.1".into(), 1);
        let mut canvas = Canvas::new(4, 4);
        let mut report = NodeReport::new(worker, job);

        let (mut tx, mut rx) = tokio::io::duplex(64 * 1024);
        let viewport = settings.viewport();
        for index in [0, 3, 7, 12] {
            let result = escape_time(viewport.to_coordinate(index), settings.max_iterations);
            send_message(&mut tx, &Message::Result(result)).await.unwrap();
        }
        drop(tx);

        {
            let mut regions = canvas.regions_mut(&[job.partition()]).unwrap();
            receive(&mut rx, &job, &mut regions[0], &mut report).await.unwrap();
        }

        assert_eq!(report.received, 3);
        assert_eq!(report.rejected, 1);
        assert!(!report.is_complete());
        assert_eq!(canvas.written(), 3);
    }

    #[tokio::test]
    async fn duplicates_do_not_hide_a_missing_pixel() {
        let settings = RenderSettings {
            width: 2,
            height: 2,
            ..RenderSettings::default()
        };
        let job = settings.job(Partition::new(0, 4));
        let worker = WorkerRecord::new("n".into(), "127.0.0.1".into(), 1);
        let mut canvas = Canvas::new(2, 2);
        let mut report = NodeReport::new(worker, job);

        let (mut tx, mut rx) = tokio::io::duplex(64 * 1024);
        let viewport = settings.viewport();
        for index in [0, 1, 2, 2] {
            let result = escape_time(viewport.to_coordinate(index), settings.max_iterations);
            send_message(&mut tx, &Message::Result(result)).await.unwrap();
        }
        drop(tx);

        {
            let mut regions = canvas.regions_mut(&[job.partition()]).unwrap();
            receive(&mut rx, &job, &mut regions[0], &mut report).await.unwrap();
        }

        assert_eq!(report.received, 3);
        assert_eq!(report.rejected, 1);
        assert!(!report.is_complete());
        assert_eq!(canvas.rgba_at(3), Some([0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn remote_error_ends_the_stream() {
        let job = RenderSettings::default().job(Partition::new(0, 10));
        let worker = WorkerRecord::new("n".into(), "127.0.0.1".into(), 1);
        let mut canvas = Canvas::new(100, 100);
        let mut report = NodeReport::new(worker, job);

        let (mut tx, mut rx) = tokio::io::duplex(1024);
        send_message(&mut tx, &Message::Error("no render job configured".into()))
            .await
            .unwrap();

        let mut regions = canvas.regions_mut(&[job.partition()]).unwrap();
        let outcome = receive(&mut rx, &job, &mut regions[0], &mut report).await;
        assert!(matches!(outcome, Err(NetworkingError::Remote(_))));
    }

    #[tokio::test]
    async fn unreachable_node_yields_a_failed_report() {
        // bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let worker = WorkerRecord::new("ghost".into(), "127.0.0.1".into(), port);
        let job = RenderSettings::default().job(Partition::new(0, 10_000));
        let mut canvas = Canvas::new(100, 100);

        let mut regions = canvas.regions_mut(&[job.partition()]).unwrap();
        let report = drain(&worker, job, regions.remove(0), DispatchMode::WorkerGenerated).await;

        assert!(report.error.is_some());
        assert_eq!(report.received, 0);
    }
}
