pub mod blob;
pub mod broadcast;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod job;
pub mod pipeline;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use blob::{BlobStore, FsBlobStore};
pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config, EndpointConfig, LogFormat};
pub use error::{BlobError, ConfigError, Result, StudioError, ValidationError};
pub use generation::{
    ContentPlanner, ItemRenderer, PlannerError, RenderContext, RenderError, RenderedItem,
};
pub use job::{
    ArtifactRef, GenerationSettings, ItemRole, Job, JobId, JobKind, JobStatus, Progress,
    SourceDocument, SubItemSpec,
};
pub use pipeline::{JobController, JobOutcome, PipelineConfig, PipelineError};
pub use service::{CreateJobRequest, CreatedJob, JobService, ServiceError};
pub use store::{
    InMemoryJobStore, JobFilter, JobPage, JobPatch, JobStore, SqliteJobStore, StoreError,
};
