use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::item_task::ItemTask;
use super::progress::{ordered_artifacts, ProgressReporter, Settled, SlotState};
use crate::blob::BlobStore;
use crate::broadcast::{JobProgressBroadcaster, JobProgressTracker};
use crate::generation::{ContentPlanner, ItemRenderer, PlannerError, RenderContext};
use crate::job::{
    normalize_plan, GenerationSettings, JobId, Progress, SourceDocument, SubItemSpec,
};
use crate::store::{JobPatch, JobStore, StoreError};
use crate::worker::WorkerPool;

/// Error recorded when not a single sub-item could be produced.
pub const ALL_ITEMS_FAILED: &str = "all items failed";

/// Terminal result of one controller run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { succeeded: usize, failed: usize },
    Failed { error: String },
}

/// Drives a job from planning to a terminal status.
pub struct JobController {
    store: Arc<dyn JobStore>,
    planner: Arc<dyn ContentPlanner>,
    renderer: Arc<dyn ItemRenderer>,
    blobs: Arc<dyn BlobStore>,
    broadcaster: Option<JobProgressBroadcaster>,
    config: PipelineConfig,
}

impl JobController {
    pub fn new(
        store: Arc<dyn JobStore>,
        planner: Arc<dyn ContentPlanner>,
        renderer: Arc<dyn ItemRenderer>,
        blobs: Arc<dyn BlobStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            planner,
            renderer,
            blobs,
            broadcaster: None,
            config,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Runs the pipeline for an already inserted job.
    ///
    /// Never returns an error: every failure ends up as a persisted `failed`
    /// status (as far as the store allows) and in the returned outcome.
    pub async fn run(&self, job_id: &JobId) -> JobOutcome {
        let span = info_span!("job", job_id = %job_id);
        async {
            let tracker = self.job_tracker(job_id).await;

            match self.execute(job_id, tracker.as_ref()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let message = e.to_string();
                    error!(error = %message, "Job failed");
                    self.fail(job_id, &message, tracker.as_ref()).await;
                    JobOutcome::Failed { error: message }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn job_tracker(&self, job_id: &JobId) -> Option<JobProgressTracker> {
        let broadcaster = self.broadcaster.as_ref()?;
        let kind = match self.store.get(job_id).await {
            Ok(Some(job)) => job.kind,
            _ => return None,
        };
        Some(broadcaster.start_job(job_id, kind))
    }

    async fn execute(
        &self,
        job_id: &JobId,
        tracker: Option<&JobProgressTracker>,
    ) -> Result<JobOutcome, PipelineError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| PipelineError::MissingJob(job_id.clone()))?;

        let plan = self
            .plan(&job.sources, &job.settings)
            .instrument(info_span!("plan", kind = %job.kind))
            .await?;
        let total = plan.len();

        self.store
            .update(job_id, JobPatch::planned(plan.clone()))
            .await?;
        if let Some(tracker) = tracker {
            tracker.update(Progress::planning_done(total), "Plan ready");
        }
        info!(total, concurrency = self.config.concurrency, "Plan persisted");

        let context = Arc::new(RenderContext::for_job(&job, total));
        let tasks: Vec<_> = plan
            .into_iter()
            .map(|spec| {
                let task = ItemTask::new(
                    spec,
                    Arc::clone(&context),
                    Arc::clone(&self.renderer),
                    Arc::clone(&self.blobs),
                    self.config.item_timeout,
                );
                move || task.run()
            })
            .collect();

        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(
            job_id.clone(),
            total,
            Arc::clone(&self.store),
            tracker.cloned(),
        );
        let pool = WorkerPool::new(self.config.concurrency);

        let (outcomes, persisted) = tokio::join!(
            pool.run(tasks, move |index, outcome| {
                // rx lives until the pool drains.
                let _ = tx.send(Settled::new(index, outcome));
            }),
            reporter.run(rx),
        );
        persisted.map_err(PipelineError::Progress)?;

        for (index, outcome) in outcomes.iter().enumerate() {
            if let Err(e) = outcome {
                warn!(position = index, error = %e, "Item failed after retry");
            }
        }

        let slots: Vec<SlotState> = outcomes.iter().map(SlotState::from_outcome).collect();
        let artifacts = ordered_artifacts(&slots);
        let succeeded = artifacts.len();
        let failed = total - succeeded;

        if succeeded == 0 {
            let progress = Progress::done(0, total, total);
            self.store
                .update(
                    job_id,
                    JobPatch::failed(ALL_ITEMS_FAILED)
                        .with_progress(progress)
                        .with_artifacts(Vec::new()),
                )
                .await?;
            if let Some(tracker) = tracker {
                tracker.failed(progress, ALL_ITEMS_FAILED);
            }
            warn!(total, "Every item failed");
            return Ok(JobOutcome::Failed {
                error: ALL_ITEMS_FAILED.to_string(),
            });
        }

        let progress = Progress::done(succeeded, failed, total);
        self.store
            .update(job_id, JobPatch::completed(progress, artifacts))
            .await?;
        if let Some(tracker) = tracker {
            tracker.completed(progress);
        }
        info!(succeeded, failed, total, "Job completed");

        Ok(JobOutcome::Completed { succeeded, failed })
    }

    async fn plan(
        &self,
        sources: &[SourceDocument],
        settings: &GenerationSettings,
    ) -> Result<Vec<SubItemSpec>, PipelineError> {
        let items = self.planner.plan(sources, settings).await?;
        if items.is_empty() {
            return Err(PlannerError::EmptyPlan.into());
        }
        Ok(normalize_plan(items))
    }

    async fn fail(&self, job_id: &JobId, message: &str, tracker: Option<&JobProgressTracker>) {
        match self.store.update(job_id, JobPatch::failed(message)).await {
            Ok(()) => {
                if let Some(tracker) = tracker {
                    let progress = match self.store.get(job_id).await {
                        Ok(Some(job)) => job.progress,
                        _ => Progress::planning(),
                    };
                    tracker.failed(progress, message);
                }
            }
            Err(StoreError::Terminal { status, .. }) => {
                warn!(%status, "Job already terminal, failure not recorded");
            }
            Err(e) => {
                error!(error = %e, "Could not record job failure");
            }
        }
    }
}
