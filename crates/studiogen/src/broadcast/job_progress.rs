//! Live job progress events.
//!
//! The durable store is the source of truth; these events only let an
//! in-process observer follow a job without polling.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{JobId, JobKind, JobStatus, Progress};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: Progress,
    /// Number of successful sub-items so far.
    pub artifact_count: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobProgressEvent {
    pub fn new(job_id: &JobId, kind: JobKind, progress: Progress, message: &str) -> Self {
        Self {
            job_id: job_id.clone(),
            kind,
            status: JobStatus::Generating,
            progress,
            artifact_count: progress.completed,
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn completed(job_id: &JobId, kind: JobKind, progress: Progress) -> Self {
        Self {
            status: JobStatus::Completed,
            message: format!(
                "Generated {} of {} items",
                progress.completed, progress.total
            ),
            ..Self::new(job_id, kind, progress, "")
        }
    }

    pub fn failed(job_id: &JobId, kind: JobKind, progress: Progress, error: &str) -> Self {
        Self {
            status: JobStatus::Failed,
            message: "Generation failed".to_string(),
            error: Some(error.to_string()),
            ..Self::new(job_id, kind, progress, "")
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fan-out of progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Returns a tracker for one job and announces that planning started.
    pub fn start_job(&self, job_id: &JobId, kind: JobKind) -> JobProgressTracker {
        let tracker = JobProgressTracker {
            job_id: job_id.clone(),
            kind,
            sender: Arc::clone(&self.sender),
        };
        tracker.update(Progress::planning(), "Planning content");
        tracker
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Emits events for a single job.
#[derive(Clone)]
pub struct JobProgressTracker {
    job_id: JobId,
    kind: JobKind,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn update(&self, progress: Progress, message: &str) {
        let event = JobProgressEvent::new(&self.job_id, self.kind, progress, message);
        let _ = self.sender.send(event);
    }

    pub fn completed(&self, progress: Progress) {
        let _ = self
            .sender
            .send(JobProgressEvent::completed(&self.job_id, self.kind, progress));
    }

    pub fn failed(&self, progress: Progress, error: &str) {
        let _ = self.sender.send(JobProgressEvent::failed(
            &self.job_id,
            self.kind,
            progress,
            error,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers_is_ignored() {
        let broadcaster = JobProgressBroadcaster::new(10);
        broadcaster.send(JobProgressEvent::new(
            &JobId::from("nobody-listening"),
            JobKind::Quiz,
            Progress::planning(),
            "Planning content",
        ));
    }

    #[test]
    fn test_start_job_announces_planning() {
        let broadcaster = JobProgressBroadcaster::default();
        let mut rx = broadcaster.subscribe();

        let tracker = broadcaster.start_job(&JobId::from("job-1"), JobKind::SlideDeck);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id.as_str(), "job-1");
        assert_eq!(received.status, JobStatus::Generating);
        assert_eq!(received.progress, Progress::planning());
        assert_eq!(tracker.job_id().as_str(), "job-1");

        tracker.update(Progress::generating(2, 1, 5), "Rendering items");
        let received = rx.try_recv().unwrap();
        assert_eq!(received.artifact_count, 2);
        assert_eq!(received.message, "Rendering items");
        assert!(!received.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();
        let tracker = broadcaster.start_job(&JobId::from("job-2"), JobKind::Report);
        let _ = rx.try_recv();

        tracker.completed(Progress::done(3, 2, 5));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.status, JobStatus::Completed);
        assert_eq!(received.message, "Generated 3 of 5 items");
        assert!(received.error.is_none());

        tracker.failed(Progress::done(0, 1, 1), "all items failed");
        let received = rx.try_recv().unwrap();
        assert!(received.is_terminal());
        assert_eq!(received.error.as_deref(), Some("all items failed"));
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = JobProgressEvent::new(
            &JobId::from("job-3"),
            JobKind::MindMap,
            Progress::planning_done(6),
            "Plan ready",
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["jobId"], "job-3");
        assert_eq!(json["kind"], "mind-map");
        assert_eq!(json["artifactCount"], 0);
        assert!(json.get("error").is_none());
    }
}
