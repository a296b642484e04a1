//! Wiring for controller and service tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use studiogen::job::{QuizSettings, SlideDeckSettings};
use studiogen::{
    BlobStore, ContentPlanner, CreateJobRequest, GenerationSettings, InMemoryJobStore,
    ItemRenderer, Job, JobController, JobKind, JobService, JobStore, PipelineConfig,
    SourceDocument,
};

use super::fakes::{MemoryBlobStore, ScriptedPlanner, ScriptedRenderer};

pub const POLL: Duration = Duration::from_millis(10);
pub const WAIT_LIMIT: Option<Duration> = Some(Duration::from_secs(10));

pub fn sources() -> Vec<SourceDocument> {
    vec![
        SourceDocument {
            id: "notes".to_string(),
            title: Some("Cell biology notes".to_string()),
            text: "Mitochondria produce ATP through cellular respiration.".to_string(),
        },
        SourceDocument {
            id: "chapter-3".to_string(),
            title: None,
            text: "Chloroplasts capture light energy during photosynthesis.".to_string(),
        },
    ]
}

pub fn slide_deck_request() -> CreateJobRequest {
    CreateJobRequest {
        kind: JobKind::SlideDeck,
        settings: GenerationSettings::SlideDeck(SlideDeckSettings::default()),
        sources: sources(),
    }
}

pub fn quiz_request() -> CreateJobRequest {
    CreateJobRequest {
        kind: JobKind::Quiz,
        settings: GenerationSettings::Quiz(QuizSettings::default()),
        sources: sources(),
    }
}

/// A fresh `generating` slide-deck job, not yet inserted.
pub fn new_job() -> Job {
    Job::new(
        GenerationSettings::SlideDeck(SlideDeckSettings::default()),
        sources(),
    )
}

/// Fakes plus the controller or service built on top of them.
pub struct TestHarness<S: JobStore + 'static = InMemoryJobStore> {
    pub store: Arc<S>,
    pub planner: Arc<ScriptedPlanner>,
    pub renderer: Arc<ScriptedRenderer>,
    pub blobs: Arc<MemoryBlobStore>,
    pub config: PipelineConfig,
}

impl TestHarness<InMemoryJobStore> {
    pub fn new(planner: ScriptedPlanner, renderer: ScriptedRenderer) -> Self {
        Self::with_store(InMemoryJobStore::new(), planner, renderer)
    }
}

impl<S: JobStore + 'static> TestHarness<S> {
    pub fn with_store(store: S, planner: ScriptedPlanner, renderer: ScriptedRenderer) -> Self {
        Self {
            store: Arc::new(store),
            planner: Arc::new(planner),
            renderer: Arc::new(renderer),
            blobs: Arc::new(MemoryBlobStore::new()),
            config: PipelineConfig::default(),
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.config.item_timeout = Some(timeout);
        self
    }

    pub fn controller(&self) -> JobController {
        JobController::new(
            Arc::clone(&self.store) as Arc<dyn JobStore>,
            Arc::clone(&self.planner) as Arc<dyn ContentPlanner>,
            Arc::clone(&self.renderer) as Arc<dyn ItemRenderer>,
            Arc::clone(&self.blobs) as Arc<dyn BlobStore>,
            self.config,
        )
    }

    pub fn service(&self) -> JobService {
        JobService::new(
            Arc::clone(&self.store) as Arc<dyn JobStore>,
            Arc::clone(&self.planner) as Arc<dyn ContentPlanner>,
            Arc::clone(&self.renderer) as Arc<dyn ItemRenderer>,
            Arc::clone(&self.blobs) as Arc<dyn BlobStore>,
            self.config,
        )
    }

    /// Inserts a fresh job and returns it.
    pub async fn insert_job(&self) -> Job {
        let job = new_job();
        self.store.insert(&job).await.unwrap();
        job
    }

    pub async fn stored(&self, job: &Job) -> Job {
        self.store.get(&job.id).await.unwrap().unwrap()
    }
}
