//! The generation job record and its externally observable state.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::plan::SubItemSpec;
use super::settings::GenerationSettings;

/// Opaque job identifier (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Type of composite artifact a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    SlideDeck,
    MindMap,
    Quiz,
    Report,
    Flashcards,
    Infographic,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SlideDeck => "slide-deck",
            JobKind::MindMap => "mind-map",
            JobKind::Quiz => "quiz",
            JobKind::Report => "report",
            JobKind::Flashcards => "flashcards",
            JobKind::Infographic => "infographic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slide-deck" => Some(JobKind::SlideDeck),
            "mind-map" => Some(JobKind::MindMap),
            "quiz" => Some(JobKind::Quiz),
            "report" => Some(JobKind::Report),
            "flashcards" => Some(JobKind::Flashcards),
            "infographic" => Some(JobKind::Infographic),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Generating,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generating" => Some(JobStatus::Generating),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressPhase {
    Planning,
    PlanningDone,
    Generating,
    Done,
}

/// Progress snapshot. `completed + failed` never exceeds `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub phase: ProgressPhase,
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

impl Progress {
    pub fn planning() -> Self {
        Self {
            phase: ProgressPhase::Planning,
            completed: 0,
            total: 0,
            failed: 0,
        }
    }

    pub fn planning_done(total: usize) -> Self {
        Self {
            phase: ProgressPhase::PlanningDone,
            completed: 0,
            total,
            failed: 0,
        }
    }

    pub fn generating(completed: usize, failed: usize, total: usize) -> Self {
        Self {
            phase: ProgressPhase::Generating,
            completed,
            total,
            failed,
        }
    }

    pub fn done(completed: usize, failed: usize, total: usize) -> Self {
        Self {
            phase: ProgressPhase::Done,
            completed,
            total,
            failed,
        }
    }

    /// Number of items that have produced an outcome.
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}

/// Retrievable reference to one successfully generated sub-item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub position: usize,
    pub url: String,
    pub content_type: String,
}

/// A source document the plan is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub settings: GenerationSettings,
    pub sources: Vec<SourceDocument>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<SubItemSpec>>,
    pub progress: Progress,
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a fresh job in `generating` with no plan.
    pub fn new(settings: GenerationSettings, sources: Vec<SourceDocument>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind: settings.kind(),
            settings,
            sources,
            status: JobStatus::Generating,
            plan: None,
            progress: Progress::planning(),
            artifacts: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the job is still generating but older than `threshold`.
    /// Observers treat such jobs as abandoned; the pipeline does not.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status == JobStatus::Generating && now - self.created_at > threshold
    }
}
