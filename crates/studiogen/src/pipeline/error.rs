use thiserror::Error;

use crate::error::BlobError;
use crate::generation::{PlannerError, RenderError};
use crate::job::JobId;
use crate::store::StoreError;

/// Failures that end a job. The controller turns every one of them into a
/// persisted `failed` status; none escape the detached task.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Planning(#[from] PlannerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job {0} disappeared before the pipeline started")]
    MissingJob(JobId),

    #[error("Failed to persist progress: {0}")]
    Progress(StoreError),
}

/// Failure of a single sub-item. Counted, never fatal to the job.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Upload failed: {0}")]
    Upload(#[from] BlobError),
}
