use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::models::{coordinate::Coordinate, escape_result::EscapeResult, partition::Partition};

use super::{escape::escape_time, mapping::Viewport};

/// Upper bound on how many results may wait for the consumer.
const RESULT_QUEUE_DEPTH: usize = 4096;

/// Fixed set of evaluator threads draining a bounded coordinate queue fed by a
/// single producer thread.
///
/// Results come back on a bounded tokio channel in completion order. Dropping
/// the receiver stops the evaluators, which in turn stops the producer.
#[derive(Debug, Clone, Copy)]
pub struct EscapePool {
    threads: usize,
}

impl Default for EscapePool {
    fn default() -> Self {
        Self::with_available_parallelism()
    }
}

impl EscapePool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn with_available_parallelism() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Evaluates every coordinate of `partition`.
    pub fn spawn(
        &self,
        viewport: Viewport,
        partition: Partition,
        max_iterations: u32,
    ) -> mpsc::Receiver<EscapeResult> {
        let depth = (partition.len() as usize / self.threads).max(1);
        self.spawn_with(depth, max_iterations, move |coordinates| {
            for coordinate in viewport.coordinates(partition) {
                if coordinates.send(coordinate).is_err() {
                    break;
                }
            }
        })
    }

    /// Evaluates coordinates as they arrive on `incoming` until it closes.
    pub fn spawn_from(
        &self,
        mut incoming: mpsc::Receiver<Coordinate>,
        max_iterations: u32,
    ) -> mpsc::Receiver<EscapeResult> {
        self.spawn_with(RESULT_QUEUE_DEPTH, max_iterations, move |coordinates| {
            while let Some(coordinate) = incoming.blocking_recv() {
                if coordinates.send(coordinate).is_err() {
                    break;
                }
            }
        })
    }

    fn spawn_with<P>(&self, depth: usize, max_iterations: u32, producer: P) -> mpsc::Receiver<EscapeResult>
    where
        P: FnOnce(Sender<Coordinate>) + Send + 'static,
    {
        let (coordinate_tx, coordinate_rx) = bounded::<Coordinate>(depth);
        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_DEPTH.min(depth.max(64)));

        if let Err(e) = thread::Builder::new()
            .name("escape-producer".to_string())
            .spawn(move || producer(coordinate_tx))
        {
            warn!("Failed to spawn coordinate producer: {}", e);
            return result_rx;
        }

        for id in 0..self.threads {
            let coordinates = coordinate_rx.clone();
            let results = result_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("escape-{id}"))
                .spawn(move || evaluate(id, coordinates, results, max_iterations));
            if let Err(e) = spawned {
                warn!("Failed to spawn evaluator {}: {}", id, e);
            }
        }

        result_rx
    }
}

fn evaluate(
    id: usize,
    coordinates: Receiver<Coordinate>,
    results: mpsc::Sender<EscapeResult>,
    max_iterations: u32,
) {
    let mut evaluated = 0usize;
    for coordinate in coordinates.iter() {
        if results.blocking_send(escape_time(coordinate, max_iterations)).is_err() {
            debug!("Evaluator {} stopping, result receiver dropped", id);
            return;
        }
        evaluated += 1;
    }
    debug!("Evaluator {} drained the queue after {} coordinates", id, evaluated);
}
