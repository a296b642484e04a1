//! Path-addressable storage for rendered sub-items.

use async_trait::async_trait;

use crate::error::BlobError;
use crate::job::JobId;

pub mod filesystem;

pub use filesystem::FsBlobStore;

/// Uploads bytes at a relative path and returns a retrievable URL.
///
/// Uploading twice to the same path overwrites the first object.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<String, BlobError>;
}

/// Deterministic blob path for one sub-item: `{job_id}/{position:03}.{ext}`.
pub fn artifact_path(job_id: &JobId, position: usize, content_type: &str) -> String {
    format!(
        "{}/{:03}.{}",
        job_id,
        position,
        extension_for(content_type)
    )
}

/// File extension for a content type, `bin` when nothing better is known.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "application/json" => "json",
        "text/markdown" => "md",
        "text/html" => "html",
        "application/pdf" => "pdf",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}
