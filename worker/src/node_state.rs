use std::sync::{
    atomic::{AtomicUsize, Ordering},
    PoisonError, RwLock,
};

use shared::models::render_job::RenderJob;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Discovering,
    Registering,
    Idle,
    Configured,
    Computing,
}

/// Job and phase shared by every connection a render node serves.
#[derive(Debug)]
pub struct NodeState {
    job: RwLock<Option<RenderJob>>,
    computing: AtomicUsize,
    phase: watch::Sender<NodePhase>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(NodePhase::Discovering);
        Self {
            job: RwLock::new(None),
            computing: AtomicUsize::new(0),
            phase,
        }
    }

    /// Replaces the stored job.
    pub fn configure(&self, job: RenderJob) {
        *self.job.write().unwrap_or_else(PoisonError::into_inner) = Some(job);
        if self.computing.load(Ordering::Acquire) == 0 {
            self.set_phase(NodePhase::Configured);
        }
    }

    pub fn job(&self) -> Option<RenderJob> {
        *self.job.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks a Compute stream as running until the guard drops.
    pub fn begin_compute(&self) -> ComputeGuard<'_> {
        self.computing.fetch_add(1, Ordering::AcqRel);
        self.set_phase(NodePhase::Computing);
        ComputeGuard { state: self }
    }

    pub fn phase(&self) -> NodePhase {
        *self.phase.borrow()
    }

    pub fn set_phase(&self, phase: NodePhase) {
        self.phase.send_replace(phase);
    }

    pub fn subscribe(&self) -> watch::Receiver<NodePhase> {
        self.phase.subscribe()
    }
}

pub struct ComputeGuard<'a> {
    state: &'a NodeState,
}

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        if self.state.computing.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.set_phase(NodePhase::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::models::{partition::Partition, render_job::RenderSettings};

    use super::*;

    #[test]
    fn configure_replaces_the_job() {
        let state = NodeState::new();
        assert_eq!(state.job(), None);

        let settings = RenderSettings::default();
        state.configure(settings.job(Partition::new(0, 10)));
        state.configure(settings.job(Partition::new(10, 20)));

        assert_eq!(state.job().map(|job| job.partition()), Some(Partition::new(10, 20)));
        assert_eq!(state.phase(), NodePhase::Configured);
    }

    #[test]
    fn overlapping_computes_return_to_idle_once() {
        let state = NodeState::new();
        let first = state.begin_compute();
        let second = state.begin_compute();
        assert_eq!(state.phase(), NodePhase::Computing);

        drop(first);
        assert_eq!(state.phase(), NodePhase::Computing);
        drop(second);
        assert_eq!(state.phase(), NodePhase::Idle);
    }
}
