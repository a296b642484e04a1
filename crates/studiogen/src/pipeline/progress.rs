//! Progress aggregation for one job.
//!
//! Workers never write to the store. Each settled item is sent over a
//! channel to a single [`ProgressReporter`], which owns the slot array and
//! persists one snapshot per settlement, in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::error::ItemError;
use crate::broadcast::JobProgressTracker;
use crate::job::{ArtifactRef, JobId, Progress};
use crate::store::{JobPatch, JobStore, StoreError};
use crate::worker::TaskOutcome;

pub type ItemOutcome = TaskOutcome<ArtifactRef, ItemError>;

/// Settlement state of one plan slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Pending,
    Succeeded(ArtifactRef),
    Failed,
}

impl SlotState {
    pub fn from_outcome(outcome: &ItemOutcome) -> Self {
        match outcome {
            Ok(artifact) => SlotState::Succeeded(artifact.clone()),
            Err(_) => SlotState::Failed,
        }
    }
}

/// Message sent to the aggregator when an item settles.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub index: usize,
    pub state: SlotState,
}

impl Settled {
    pub fn new(index: usize, outcome: &ItemOutcome) -> Self {
        Self {
            index,
            state: SlotState::from_outcome(outcome),
        }
    }
}

/// Successful artifacts in plan order, skipping pending and failed slots.
pub fn ordered_artifacts(slots: &[SlotState]) -> Vec<ArtifactRef> {
    slots
        .iter()
        .filter_map(|slot| match slot {
            SlotState::Succeeded(artifact) => Some(artifact.clone()),
            _ => None,
        })
        .collect()
}

/// `(completed, failed)` over settled slots.
pub fn tally(slots: &[SlotState]) -> (usize, usize) {
    slots.iter().fold((0, 0), |(ok, failed), slot| match slot {
        SlotState::Succeeded(_) => (ok + 1, failed),
        SlotState::Failed => (ok, failed + 1),
        SlotState::Pending => (ok, failed),
    })
}

pub struct ProgressReporter {
    job_id: JobId,
    store: Arc<dyn JobStore>,
    tracker: Option<JobProgressTracker>,
    slots: Vec<SlotState>,
    first_error: Option<StoreError>,
}

impl ProgressReporter {
    pub fn new(
        job_id: JobId,
        total: usize,
        store: Arc<dyn JobStore>,
        tracker: Option<JobProgressTracker>,
    ) -> Self {
        Self {
            job_id,
            store,
            tracker,
            slots: vec![SlotState::Pending; total],
            first_error: None,
        }
    }

    pub fn progress(&self) -> Progress {
        let (completed, failed) = tally(&self.slots);
        Progress::generating(completed, failed, self.slots.len())
    }

    /// Drains `rx` until every sender is gone.
    ///
    /// Returns the first persistence error, if any. After a failed write the
    /// channel is still drained so workers are never blocked.
    pub async fn run(mut self, mut rx: UnboundedReceiver<Settled>) -> Result<(), StoreError> {
        while let Some(settled) = rx.recv().await {
            self.record(settled).await;
        }
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn record(&mut self, settled: Settled) {
        match self.slots.get_mut(settled.index) {
            Some(slot) => *slot = settled.state,
            None => {
                warn!(index = settled.index, "Ignoring settlement outside the plan");
                return;
            }
        }

        let progress = self.progress();
        if let Some(tracker) = &self.tracker {
            tracker.update(progress, "Rendering items");
        }

        if self.first_error.is_some() {
            return;
        }

        let artifacts = ordered_artifacts(&self.slots);
        debug!(
            completed = progress.completed,
            failed = progress.failed,
            total = progress.total,
            "Persisting progress"
        );
        if let Err(e) = self
            .store
            .update(&self.job_id, JobPatch::snapshot(progress, artifacts))
            .await
        {
            warn!(error = %e, "Progress write failed, skipping further snapshots");
            self.first_error = Some(e);
        }
    }
}
