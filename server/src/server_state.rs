use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::models::worker_record::WorkerRecord;
use thiserror::Error;
use tokio::sync::{oneshot, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingRegistrations,
    Partitioning,
    Dispatching,
    Streaming,
    Aggregating,
    Done,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("registry closed, all {0} workers are already registered")]
    Closed(usize),
}

#[derive(Debug)]
struct Registry {
    workers: Vec<WorkerRecord>,
    trigger: Option<oneshot::Sender<Vec<WorkerRecord>>>,
}

/// Registry and phase shared between the connection handlers and the owner
/// of the render.
#[derive(Debug)]
pub struct ServerState {
    required_workers: usize,
    registry: Mutex<Registry>,
    phase: watch::Sender<Phase>,
}

impl ServerState {
    /// The receiver yields the frozen registry once `required_workers` have
    /// registered.
    pub fn new(required_workers: usize) -> (Self, oneshot::Receiver<Vec<WorkerRecord>>) {
        let (trigger, frozen) = oneshot::channel();
        let (phase, _) = watch::channel(Phase::AwaitingRegistrations);
        let state = ServerState {
            required_workers,
            registry: Mutex::new(Registry {
                workers: Vec::with_capacity(required_workers),
                trigger: Some(trigger),
            }),
            phase,
        };
        (state, frozen)
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `worker` and returns the new registry size. The registration
    /// that completes the set moves the coordinator to `Partitioning` and
    /// hands the registry over, all under the lock.
    pub fn register(&self, worker: WorkerRecord) -> Result<usize, RegistrationError> {
        let mut registry = self.registry();
        if registry.workers.len() >= self.required_workers {
            return Err(RegistrationError::Closed(registry.workers.len()));
        }

        registry.workers.push(worker);
        let count = registry.workers.len();

        if count == self.required_workers {
            self.set_phase(Phase::Partitioning);
            if let Some(trigger) = registry.trigger.take() {
                // the owner may already have given up (timeout, shutdown)
                let _ = trigger.send(registry.workers.clone());
            }
        }
        Ok(count)
    }

    pub fn registered(&self) -> usize {
        self.registry().workers.len()
    }

    pub fn required_workers(&self) -> usize {
        self.required_workers
    }

    pub fn workers(&self) -> Vec<WorkerRecord> {
        self.registry().workers.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: u16) -> WorkerRecord {
        WorkerRecord::new(format!("node-{n}"), "127.0.0.1".into(), 9000 + n)
    }

    #[test]
    fn freezes_and_hands_over_the_registry_at_the_required_count() {
        let (state, mut frozen) = ServerState::new(2);

        assert_eq!(state.register(record(1)), Ok(1));
        assert!(frozen.try_recv().is_err());
        assert_eq!(state.phase(), Phase::AwaitingRegistrations);

        assert_eq!(state.register(record(2)), Ok(2));
        assert_eq!(state.phase(), Phase::Partitioning);
        assert_eq!(frozen.try_recv().unwrap(), vec![record(1), record(2)]);

        assert_eq!(state.register(record(3)), Err(RegistrationError::Closed(2)));
        assert_eq!(state.registered(), 2);
    }

    #[tokio::test]
    async fn concurrent_registrations_are_all_kept() {
        let (state, frozen) = ServerState::new(16);
        let state = std::sync::Arc::new(state);

        let handles: Vec<_> = (0..16)
            .map(|n| {
                let state = state.clone();
                tokio::spawn(async move { state.register(record(n)) })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let workers = frozen.await.unwrap();
        assert_eq!(workers.len(), 16);
        let mut ports: Vec<u16> = workers.iter().map(|w| w.port).collect();
        ports.sort_unstable();
        ports.dedup();
        assert_eq!(ports.len(), 16);
    }

    #[test]
    fn phase_changes_reach_subscribers() {
        let (state, _frozen) = ServerState::new(1);
        let mut phases = state.subscribe();
        state.set_phase(Phase::Streaming);
        assert!(phases.has_changed().unwrap());
        assert_eq!(*phases.borrow_and_update(), Phase::Streaming);
    }
}
