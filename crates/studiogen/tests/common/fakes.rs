//! Scripted collaborators with call accounting.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use studiogen::{
    BlobError, BlobStore, ContentPlanner, GenerationSettings, InMemoryJobStore, ItemRenderer,
    ItemRole, Job, JobFilter, JobId, JobPage, JobPatch, JobStore, PlannerError, RenderContext,
    RenderError, RenderedItem, SourceDocument, StoreError, SubItemSpec,
};

/// Planner that returns `items` specs, fails, or panics.
pub struct ScriptedPlanner {
    items: usize,
    fail_with: Option<String>,
    panic_with: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedPlanner {
    pub fn with_items(items: usize) -> Self {
        Self {
            items,
            fail_with: None,
            panic_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::with_items(0)
        }
    }

    pub fn panicking(message: &str) -> Self {
        Self {
            panic_with: Some(message.to_string()),
            ..Self::with_items(0)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentPlanner for ScriptedPlanner {
    async fn plan(
        &self,
        _sources: &[SourceDocument],
        _settings: &GenerationSettings,
    ) -> Result<Vec<SubItemSpec>, PlannerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.panic_with {
            panic!("{}", message);
        }
        if let Some(message) = &self.fail_with {
            return Err(PlannerError::Request(message.clone()));
        }
        Ok((0..self.items)
            .map(|i| {
                let role = if i == 0 { ItemRole::Cover } else { ItemRole::Body };
                // Positions are deliberately wrong; the controller renumbers.
                SubItemSpec {
                    position: 100 + i,
                    ..SubItemSpec::new(role, format!("Item {}", i))
                }
            })
            .collect())
    }
}

/// Renderer whose behavior is scripted per plan position.
#[derive(Default)]
pub struct ScriptedRenderer {
    /// Fail every attempt at these positions.
    pub always_fail: HashSet<usize>,
    /// Fail only the first attempt at these positions.
    pub fail_once: HashSet<usize>,
    /// Panic at these positions.
    pub panic_at: HashSet<usize>,
    /// Sleep before answering, per position.
    pub delays: HashMap<usize, Duration>,
    pub default_delay: Option<Duration>,
    pub calls: Mutex<HashMap<usize, usize>>,
    pub total_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub finish_order: Mutex<Vec<usize>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(positions: &[usize]) -> Self {
        Self {
            always_fail: positions.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn calls_for(&self, position: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&position)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn finish_order(&self) -> Vec<usize> {
        self.finish_order.lock().unwrap().clone()
    }

    fn begin(&self, position: usize) -> usize {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(position).or_insert(0);
        *count += 1;
        *count
    }

    fn end(&self, position: usize) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finish_order.lock().unwrap().push(position);
    }
}

#[async_trait]
impl ItemRenderer for ScriptedRenderer {
    async fn render(
        &self,
        item: &SubItemSpec,
        _context: &RenderContext,
    ) -> Result<RenderedItem, RenderError> {
        let position = item.position;
        let attempt = self.begin(position);

        if let Some(delay) = self.delays.get(&position).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        self.end(position);

        if self.panic_at.contains(&position) {
            panic!("renderer crashed on item {}", position);
        }
        if self.always_fail.contains(&position) || (attempt == 1 && self.fail_once.contains(&position))
        {
            return Err(RenderError::Request(format!(
                "item {} attempt {} rejected",
                position, attempt
            )));
        }

        Ok(RenderedItem {
            bytes: format!("rendered:{}", item.title).into_bytes(),
            content_type: "image/png".to_string(),
        })
    }
}

/// In-memory blob store handing out `mem://` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<String, BlobError> {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(format!("mem://{}", path))
    }
}

/// Wraps the in-memory store and fails selected updates.
pub struct FailingStore {
    inner: InMemoryJobStore,
    fail_snapshots: bool,
    fail_all_updates: bool,
    updates: AtomicUsize,
}

impl FailingStore {
    /// Progress snapshot writes fail; plan and terminal writes succeed.
    pub fn failing_snapshots() -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            fail_snapshots: true,
            fail_all_updates: false,
            updates: AtomicUsize::new(0),
        }
    }

    /// Every update fails.
    pub fn read_only() -> Self {
        Self {
            fail_snapshots: false,
            fail_all_updates: true,
            ..Self::failing_snapshots()
        }
    }

    pub fn update_attempts(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn is_snapshot(patch: &JobPatch) -> bool {
        patch.status.is_none() && patch.plan.is_none() && patch.artifacts.is_some()
    }
}

#[async_trait]
impl JobStore for FailingStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.insert(job).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.inner.get(id).await
    }

    async fn update(&self, id: &JobId, patch: JobPatch) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_all_updates || (self.fail_snapshots && Self::is_snapshot(&patch)) {
            return Err(StoreError::Unavailable("disk quota exceeded".to_string()));
        }
        self.inner.update(id, patch).await
    }

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, StoreError> {
        self.inner.list(filter).await
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
