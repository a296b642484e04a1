//! [`JobStore`] backed by the rusqlite [`Database`].
//!
//! rusqlite is synchronous, so every call hops onto tokio's blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{JobFilter, JobPage, JobPatch, JobStore, StoreError};
use crate::db::job_repo::{self, JobRow, RowFilter, RowPatch};
use crate::db::Database;
use crate::job::{Job, JobId, JobKind, JobStatus};

#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(Database) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let row = job_to_row(job)?;
        self.blocking(move |db| {
            if job_repo::find_by_id(&db, &row.id)?.is_some() {
                return Err(StoreError::AlreadyExists(JobId::from(row.id)));
            }
            job_repo::insert(&db, &row)?;
            log::debug!("Inserted job {} ({})", row.id, row.kind);
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let id = id.as_str().to_string();
        self.blocking(move |db| job_repo::find_by_id(&db, &id)?.map(row_to_job).transpose())
            .await
    }

    async fn update(&self, id: &JobId, patch: JobPatch) -> Result<(), StoreError> {
        let row_patch = patch_to_row(patch, Utc::now())?;
        let id = id.clone();
        self.blocking(move |db| {
            let changed = job_repo::apply_patch(&db, id.as_str(), &row_patch)?;
            if changed > 0 {
                return Ok(());
            }

            match job_repo::find_by_id(&db, id.as_str())? {
                None => Err(StoreError::NotFound(id)),
                Some(row) => {
                    let status = parse_status(&row)?;
                    log::warn!("Rejected update to job {} in status {}", id, status);
                    Err(StoreError::Terminal { id, status })
                }
            }
        })
        .await
    }

    async fn list(&self, filter: &JobFilter) -> Result<JobPage, StoreError> {
        let row_filter = RowFilter {
            status: filter.status.map(|s| s.as_str().to_string()),
            kind: filter.kind.map(|k| k.as_str().to_string()),
            limit: filter.limit,
            offset: filter.offset,
        };
        self.blocking(move |db| {
            let (rows, total) = job_repo::query(&db, &row_filter)?;
            let jobs = rows
                .into_iter()
                .map(row_to_job)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(JobPage { jobs, total })
        })
        .await
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_timestamp(s: &str, id: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

fn parse_status(row: &JobRow) -> Result<JobStatus, StoreError> {
    JobStatus::parse(&row.status).ok_or_else(|| StoreError::Corrupt {
        id: row.id.clone(),
        reason: format!("unknown status '{}'", row.status),
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    column: &str,
    id: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("invalid {} column: {}", column, e),
    })
}

fn job_to_row(job: &Job) -> Result<JobRow, StoreError> {
    Ok(JobRow {
        id: job.id.as_str().to_string(),
        kind: job.kind.as_str().to_string(),
        settings: serde_json::to_string(&job.settings)?,
        sources: serde_json::to_string(&job.sources)?,
        status: job.status.as_str().to_string(),
        plan: job.plan.as_ref().map(serde_json::to_string).transpose()?,
        progress: serde_json::to_string(&job.progress)?,
        artifacts: serde_json::to_string(&job.artifacts)?,
        error: job.error.clone(),
        created_at: format_timestamp(job.created_at),
        updated_at: format_timestamp(job.updated_at),
        completed_at: job.completed_at.map(format_timestamp),
    })
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    let id = row.id.as_str();
    let kind = JobKind::parse(&row.kind).ok_or_else(|| StoreError::Corrupt {
        id: row.id.clone(),
        reason: format!("unknown kind '{}'", row.kind),
    })?;

    Ok(Job {
        kind,
        status: parse_status(&row)?,
        settings: parse_json(&row.settings, "settings", id)?,
        sources: parse_json(&row.sources, "sources", id)?,
        plan: row
            .plan
            .as_deref()
            .map(|raw| parse_json(raw, "plan", id))
            .transpose()?,
        progress: parse_json(&row.progress, "progress", id)?,
        artifacts: parse_json(&row.artifacts, "artifacts", id)?,
        created_at: parse_timestamp(&row.created_at, id)?,
        updated_at: parse_timestamp(&row.updated_at, id)?,
        completed_at: row
            .completed_at
            .as_deref()
            .map(|raw| parse_timestamp(raw, id))
            .transpose()?,
        error: row.error.clone(),
        id: JobId::from(row.id),
    })
}

fn patch_to_row(patch: JobPatch, now: DateTime<Utc>) -> Result<RowPatch, StoreError> {
    let terminal = patch.is_terminal();
    Ok(RowPatch {
        status: patch.status.map(|s| s.as_str().to_string()),
        plan: patch.plan.as_ref().map(serde_json::to_string).transpose()?,
        progress: patch.progress.as_ref().map(serde_json::to_string).transpose()?,
        artifacts: patch
            .artifacts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        error: patch.error,
        completed_at: terminal.then(|| format_timestamp(now)),
        updated_at: format_timestamp(now),
    })
}
