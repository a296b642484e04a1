//! Generative collaborators: the content planner and the item renderer.
//!
//! Both are traits so the pipeline can run against scripted fakes; the
//! [`http`] module provides JSON-over-HTTP adapters for real services.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::job::{GenerationSettings, Job, JobId, JobKind, SourceDocument, SubItemSpec};

pub mod http;

pub use http::{HttpPlanner, HttpRenderer};

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Planner request failed: {0}")]
    Request(String),

    #[error("Planner returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Planner returned an empty plan")]
    EmptyPlan,
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer request failed: {0}")]
    Request(String),

    #[error("Renderer returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Renderer timed out after {0:?}")]
    TimedOut(Duration),
}

/// Shared context handed to the renderer with every sub-item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderContext {
    pub job_id: JobId,
    pub kind: JobKind,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub total_items: usize,
}

impl RenderContext {
    pub fn for_job(job: &Job, total_items: usize) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            language: job.settings.language().to_string(),
            style: job.settings.style_hint(),
            total_items,
        }
    }
}

/// Output of one successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ContentPlanner: Send + Sync {
    /// Produces the ordered sub-item list for a job.
    async fn plan(
        &self,
        sources: &[SourceDocument],
        settings: &GenerationSettings,
    ) -> Result<Vec<SubItemSpec>, PlannerError>;
}

#[async_trait]
pub trait ItemRenderer: Send + Sync {
    async fn render(
        &self,
        item: &SubItemSpec,
        context: &RenderContext,
    ) -> Result<RenderedItem, RenderError>;
}
