use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::join_all;
use futures_util::FutureExt;
use log::debug;

/// Why a pooled task produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure<E> {
    /// The task returned an error.
    Failed(E),
    /// The task panicked; carries the panic message.
    Panicked(String),
}

impl<E: fmt::Display> fmt::Display for TaskFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskFailure::Failed(e) => write!(f, "{}", e),
            TaskFailure::Panicked(message) => write!(f, "task panicked: {}", message),
        }
    }
}

pub type TaskOutcome<T, E> = Result<T, TaskFailure<E>>;

/// Runs a list of async tasks with at most `worker_count` in flight.
///
/// Workers are cooperative futures on the caller's task, not spawned tasks.
/// They claim indices from a shared atomic cursor, so every task runs
/// exactly once and no task waits behind a slow sibling on another worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        Self { worker_count }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Runs every task and returns one outcome per task, in task order.
    ///
    /// `on_settle` is called with the task index and its outcome as soon as
    /// each task finishes. A failing or panicking task never stops the pool.
    pub async fn run<F, Fut, T, E, S>(&self, tasks: Vec<F>, on_settle: S) -> Vec<TaskOutcome<T, E>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
        S: Fn(usize, &TaskOutcome<T, E>) + Sync,
    {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let slots: Vec<Mutex<Option<F>>> = tasks.into_iter().map(|t| Mutex::new(Some(t))).collect();
        let cursor = AtomicUsize::new(0);
        let workers = self.worker_count.min(total);

        debug!("Running {} tasks on {} workers", total, workers);

        let settled = join_all(
            (0..workers).map(|worker_id| run_worker(worker_id, &slots, &cursor, &on_settle)),
        )
        .await;

        let mut outcomes: Vec<Option<TaskOutcome<T, E>>> = (0..total).map(|_| None).collect();
        for (index, outcome) in settled.into_iter().flatten() {
            outcomes[index] = Some(outcome);
        }

        outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or_else(|| {
                    Err(TaskFailure::Panicked(format!("task {} never settled", index)))
                })
            })
            .collect()
    }
}

async fn run_worker<F, Fut, T, E, S>(
    worker_id: usize,
    slots: &[Mutex<Option<F>>],
    cursor: &AtomicUsize,
    on_settle: &S,
) -> Vec<(usize, TaskOutcome<T, E>)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: Fn(usize, &TaskOutcome<T, E>),
{
    let mut settled = Vec::new();

    loop {
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(slot) = slots.get(index) else {
            break;
        };

        let outcome = match take_task(slot) {
            Some(task) => execute(task).await,
            None => Err(TaskFailure::Panicked(format!(
                "task {} was claimed twice",
                index
            ))),
        };

        on_settle(index, &outcome);
        settled.push((index, outcome));
    }

    debug!("Worker {} finished after {} tasks", worker_id, settled.len());
    settled
}

fn take_task<F>(slot: &Mutex<Option<F>>) -> Option<F> {
    match slot.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

async fn execute<F, Fut, T, E>(task: F) -> TaskOutcome<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match AssertUnwindSafe(async move { task().await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskFailure::Failed(e)),
        Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
