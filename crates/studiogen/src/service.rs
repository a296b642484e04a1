//! Request-handling layer.
//!
//! `create_job` validates, inserts the record and returns immediately; the
//! pipeline runs on a detached tokio task. Everything else reads the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

use crate::blob::{BlobStore, FsBlobStore};
use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::Config;
use crate::db::Database;
use crate::error::{ConfigError, ValidationError};
use crate::generation::{ContentPlanner, HttpPlanner, HttpRenderer, ItemRenderer};
use crate::job::{GenerationSettings, Job, JobId, JobKind, JobStatus, SourceDocument};
use crate::pipeline::{JobController, PipelineConfig};
use crate::store::{JobFilter, JobPage, JobPatch, JobStore, SqliteJobStore, StoreError};
use crate::worker::pool::panic_message;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {id} is still {status}; only finished jobs can be regenerated")]
    NotTerminal { id: JobId, status: JobStatus },

    #[error("Timed out waiting for job {0} to finish")]
    WaitTimedOut(JobId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub kind: JobKind,
    pub settings: GenerationSettings,
    pub sources: Vec<SourceDocument>,
}

impl CreateJobRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let settings_kind = self.settings.kind();
        if settings_kind != self.kind {
            return Err(ValidationError::KindMismatch {
                requested: self.kind.to_string(),
                settings: settings_kind.to_string(),
            });
        }
        if self.sources.is_empty() {
            return Err(ValidationError::NoSources);
        }
        if let Some(empty) = self.sources.iter().find(|s| s.text.trim().is_empty()) {
            return Err(ValidationError::EmptySource(empty.id.clone()));
        }
        self.settings.validate()
    }
}

/// Synchronous answer to a creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedJob {
    pub job_id: JobId,
    pub status: JobStatus,
}

pub struct JobService {
    store: Arc<dyn JobStore>,
    controller: Arc<JobController>,
    broadcaster: JobProgressBroadcaster,
    stale_after: chrono::Duration,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        planner: Arc<dyn ContentPlanner>,
        renderer: Arc<dyn ItemRenderer>,
        blobs: Arc<dyn BlobStore>,
        config: PipelineConfig,
    ) -> Self {
        let broadcaster = JobProgressBroadcaster::default();
        let controller = JobController::new(Arc::clone(&store), planner, renderer, blobs, config)
            .with_broadcaster(broadcaster.clone());
        Self {
            store,
            controller: Arc::new(controller),
            broadcaster,
            stale_after: chrono::Duration::minutes(15),
        }
    }

    /// Wires the SQLite store, filesystem blobs and HTTP model adapters.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let planner_endpoint = config.planner.as_ref().ok_or_else(|| ConfigError::Validation {
            message: "a planner endpoint is required to run jobs".to_string(),
        })?;
        let renderer_endpoint = config.renderer.as_ref().ok_or_else(|| ConfigError::Validation {
            message: "a renderer endpoint is required to run jobs".to_string(),
        })?;

        let planner = HttpPlanner::new(planner_endpoint).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })?;
        let renderer = HttpRenderer::new(renderer_endpoint).map_err(|e| ConfigError::Validation {
            message: e.to_string(),
        })?;

        let database_path = config.database_path().ok_or_else(|| ConfigError::Validation {
            message: "no database_path configured and no home directory to default to"
                .to_string(),
        })?;
        let db = Database::open(&database_path)?;
        let blobs = FsBlobStore::new(&config.blob_directory, config.public_base_url.clone());

        let stale_after = i64::try_from(config.stale_after_secs).unwrap_or(i64::MAX);
        Ok(Self::new(
            Arc::new(SqliteJobStore::new(db)),
            Arc::new(planner),
            Arc::new(renderer),
            Arc::new(blobs),
            PipelineConfig::from_config(config),
        )
        .with_stale_after(chrono::Duration::seconds(stale_after)))
    }

    pub fn with_stale_after(mut self, threshold: chrono::Duration) -> Self {
        self.stale_after = threshold;
        self
    }

    /// Validates and records the job, then schedules the pipeline.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<CreatedJob, ServiceError> {
        request.validate()?;

        let job = Job::new(request.settings, request.sources);
        self.store.insert(&job).await?;
        info!(job_id = %job.id, kind = %job.kind, "Job created");

        self.spawn_pipeline(job.id.clone());

        Ok(CreatedJob {
            job_id: job.id,
            status: job.status,
        })
    }

    pub async fn get_job(&self, id: &JobId) -> Result<Job, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.clone()))
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<JobPage, ServiceError> {
        Ok(self.store.list(filter).await?)
    }

    /// Whole-job retry: a new job with the same kind, settings and sources.
    pub async fn regenerate(&self, id: &JobId) -> Result<CreatedJob, ServiceError> {
        let previous = self.get_job(id).await?;
        if !previous.status.is_terminal() {
            return Err(ServiceError::NotTerminal {
                id: id.clone(),
                status: previous.status,
            });
        }

        info!(previous = %id, "Regenerating job");
        self.create_job(CreateJobRequest {
            kind: previous.kind,
            settings: previous.settings,
            sources: previous.sources,
        })
        .await
    }

    /// Informational only; the pipeline never acts on staleness.
    pub fn is_stale(&self, job: &Job, now: DateTime<Utc>) -> bool {
        job.is_stale(now, self.stale_after)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    /// Polls the store until the job is terminal.
    pub async fn wait_for_terminal(
        &self,
        id: &JobId,
        poll_interval: Duration,
        limit: Option<Duration>,
    ) -> Result<Job, ServiceError> {
        let poll = async {
            loop {
                let job = self.get_job(id).await?;
                if job.is_finished() {
                    return Ok(job);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        match limit {
            Some(limit) => tokio::time::timeout(limit, poll)
                .await
                .map_err(|_| ServiceError::WaitTimedOut(id.clone()))?,
            None => poll.await,
        }
    }

    /// Runs the controller on its own task and turns a panic into a
    /// `failed` status.
    fn spawn_pipeline(&self, job_id: JobId) -> JoinHandle<()> {
        let controller = Arc::clone(&self.controller);
        let store = Arc::clone(&self.store);
        let span = tracing::info_span!("supervisor", job_id = %job_id);

        tokio::spawn(
            async move {
                let run = {
                    let controller = Arc::clone(&controller);
                    let job_id = job_id.clone();
                    tokio::spawn(async move { controller.run(&job_id).await })
                };

                let join_error = match run.await {
                    Ok(_) => return,
                    Err(e) => e,
                };

                let message = if join_error.is_panic() {
                    format!(
                        "pipeline panicked: {}",
                        panic_message(join_error.into_panic().as_ref())
                    )
                } else {
                    "pipeline task was cancelled".to_string()
                };
                error!(error = %message, "Pipeline task aborted");

                if let Err(e) = store.update(&job_id, JobPatch::failed(message)).await {
                    error!(error = %e, "Could not record aborted pipeline");
                }
            }
            .instrument(span),
        )
    }
}
