//! Row-level access to the `generation_jobs` table.
//!
//! Structured columns (settings, sources, plan, progress, artifacts) are
//! stored as JSON text; conversion to domain types happens in the store.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw `generation_jobs` row.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub kind: String,
    pub settings: String,
    pub sources: String,
    pub status: String,
    pub plan: Option<String>,
    pub progress: String,
    pub artifacts: String,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            settings: row.get("settings")?,
            sources: row.get("sources")?,
            status: row.get("status")?,
            plan: row.get("plan")?,
            progress: row.get("progress")?,
            artifacts: row.get("artifacts")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Column values to overwrite. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RowPatch {
    pub status: Option<String>,
    pub plan: Option<String>,
    pub progress: Option<String>,
    pub artifacts: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Default, Clone)]
pub struct RowFilter {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO generation_jobs (id, kind, settings, sources, status, plan, progress,
             artifacts, error, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.id,
                job.kind,
                job.settings,
                job.sources,
                job.status,
                job.plan,
                job.progress,
                job.artifacts,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM generation_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Applies `patch` to a job that is still `generating`.
///
/// Returns the number of rows changed: 0 means the job is missing or
/// already terminal.
pub fn apply_patch(db: &Database, id: &str, patch: &RowPatch) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let mut assignments = vec!["updated_at = ?2".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(id.to_string()), Box::new(patch.updated_at.clone())];

        let columns = [
            ("status", &patch.status),
            ("plan", &patch.plan),
            ("progress", &patch.progress),
            ("artifacts", &patch.artifacts),
            ("error", &patch.error),
            ("completed_at", &patch.completed_at),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                param_values.push(Box::new(value.clone()));
                assignments.push(format!("{} = ?{}", column, param_values.len()));
            }
        }

        let sql = format!(
            "UPDATE generation_jobs SET {} WHERE id = ?1 AND status = 'generating'",
            assignments.join(", ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        Ok(conn.execute(&sql, params_ref.as_slice())?)
    })
}

/// Newest-first page of jobs matching `filter`, plus the total match count.
pub fn query(db: &Database, filter: &RowFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            param_values.push(Box::new(status.clone()));
            conditions.push(format!("status = ?{}", param_values.len()));
        }
        if let Some(ref kind) = filter.kind {
            param_values.push(Box::new(kind.clone()));
            conditions.push(format!("kind = ?{}", param_values.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM generation_jobs {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM generation_jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<JobRow> = stmt
            .query_map(params_ref.as_slice(), JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}
