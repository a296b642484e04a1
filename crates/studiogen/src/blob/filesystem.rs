use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::BlobStore;
use crate::error::BlobError;

/// Blob store rooted at a local directory, served under `base_url`.
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            root: root.as_ref().to_path_buf(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a relative blob path under the root, refusing anything that
    /// could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(BlobError::InvalidPath(path.to_string()));
            }
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, BlobError> {
        let target = self.resolve(path)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        // Write beside the target and rename so readers never see a torn file.
        let staging = target.with_extension("part");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| BlobError::WriteFile {
                path: staging.clone(),
                source: e,
            })?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| BlobError::WriteFile {
                path: target.clone(),
                source: e,
            })?;

        log::debug!(
            "Stored blob {} ({} bytes, {})",
            target.display(),
            bytes.len(),
            content_type
        );

        Ok(self.url_for(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path(), "https://cdn.example.com/artifacts/");
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_writes_file_and_returns_url() {
        let (dir, store) = store();
        let url = store
            .put("job-1/000.png", b"\x89PNG", "image/png")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/artifacts/job-1/000.png");
        let written = std::fs::read(dir.path().join("job-1").join("000.png")).unwrap();
        assert_eq!(written, b"\x89PNG");
        assert!(!dir.path().join("job-1").join("000.part").exists());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_blob() {
        let (dir, store) = store();
        store.put("job-1/001.md", b"first", "text/markdown").await.unwrap();
        store.put("job-1/001.md", b"second", "text/markdown").await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("job-1/001.md")).unwrap();
        assert_eq!(written, "second");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let (_dir, store) = store();
        for bad in ["../outside.png", "/etc/passwd", "", "job/../../x"] {
            let result = store.put(bad, b"x", "image/png").await;
            assert!(
                matches!(result, Err(BlobError::InvalidPath(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_root_accessor() {
        let (dir, store) = store();
        assert_eq!(store.root(), dir.path());
    }
}
