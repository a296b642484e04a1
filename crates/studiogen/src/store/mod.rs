//! Durable job store.
//!
//! The pipeline only ever talks to [`JobStore`]; the request layer inserts,
//! the controller and progress aggregator patch, and clients poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{ArtifactRef, Job, JobId, JobKind, JobStatus, Progress, SubItemSpec};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryJobStore;
pub use sqlite::SqliteJobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    /// The job already reached `completed` or `failed`.
    #[error("Job {id} is already {status} and cannot be modified")]
    Terminal { id: JobId, status: JobStatus },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored job {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Store task failed: {0}")]
    Join(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Partial update of a job record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub plan: Option<Vec<SubItemSpec>>,
    pub progress: Option<Progress>,
    pub artifacts: Option<Vec<ArtifactRef>>,
    pub error: Option<String>,
}

impl JobPatch {
    /// Persists the plan together with the `planning-done` snapshot.
    pub fn planned(plan: Vec<SubItemSpec>) -> Self {
        let total = plan.len();
        Self {
            plan: Some(plan),
            progress: Some(Progress::planning_done(total)),
            ..Default::default()
        }
    }

    /// Per-settlement progress write: artifacts and counters together.
    pub fn snapshot(progress: Progress, artifacts: Vec<ArtifactRef>) -> Self {
        Self {
            progress: Some(progress),
            artifacts: Some(artifacts),
            ..Default::default()
        }
    }

    pub fn completed(progress: Progress, artifacts: Vec<ArtifactRef>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(progress),
            artifacts: Some(artifacts),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|s| s.is_terminal())
    }

    /// Applies the patch to an in-memory record, stamping `updated_at` and,
    /// on a terminal transition, `completed_at`.
    pub fn apply_to(self, job: &mut Job, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            job.status = status;
            if status.is_terminal() {
                job.completed_at = Some(now);
            }
        }
        if let Some(plan) = self.plan {
            job.plan = Some(plan);
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(artifacts) = self.artifacts {
            job.artifacts = artifacts;
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        job.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.status.map_or(true, |s| job.status == s) && self.kind.map_or(true, |k| job.kind == k)
    }
}

/// One page of jobs, newest first.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
}

/// Keyed job record store with partial updates and no optimistic locking.
///
/// Implementations must reject any patch to a job whose status is already
/// terminal with [`StoreError::Terminal`].
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    async fn update(&self, id: &JobId, patch: JobPatch) -> Result<(), StoreError>;

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, StoreError>;
}
