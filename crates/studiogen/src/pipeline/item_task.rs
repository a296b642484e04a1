use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info_span, Instrument};

use super::error::ItemError;
use crate::blob::{artifact_path, BlobStore};
use crate::generation::{ItemRenderer, RenderContext, RenderError, RenderedItem};
use crate::job::{ArtifactRef, SubItemSpec};
use crate::worker::retry_once;

/// Render-then-upload for one planned sub-item.
pub struct ItemTask {
    spec: SubItemSpec,
    context: Arc<RenderContext>,
    renderer: Arc<dyn ItemRenderer>,
    blobs: Arc<dyn BlobStore>,
    timeout: Option<Duration>,
}

impl ItemTask {
    pub fn new(
        spec: SubItemSpec,
        context: Arc<RenderContext>,
        renderer: Arc<dyn ItemRenderer>,
        blobs: Arc<dyn BlobStore>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            spec,
            context,
            renderer,
            blobs,
            timeout,
        }
    }

    pub async fn run(self) -> Result<ArtifactRef, ItemError> {
        let span = info_span!(
            "item",
            job_id = %self.context.job_id,
            position = self.spec.position,
            role = ?self.spec.role,
        );
        self.execute().instrument(span).await
    }

    async fn execute(&self) -> Result<ArtifactRef, ItemError> {
        let label = format!("Render of item {}", self.spec.position);
        let rendered = retry_once(&label, move |attempt| self.render_attempt(attempt)).await?;

        // Same position, same path: a re-upload replaces the earlier blob.
        let path = artifact_path(&self.context.job_id, self.spec.position, &rendered.content_type);
        let url = self
            .blobs
            .put(&path, &rendered.bytes, &rendered.content_type)
            .await?;

        debug!(%url, bytes = rendered.bytes.len(), "Item uploaded");

        Ok(ArtifactRef {
            position: self.spec.position,
            url,
            content_type: rendered.content_type,
        })
    }

    async fn render_attempt(&self, attempt: u32) -> Result<RenderedItem, RenderError> {
        debug!(attempt, "Rendering item");
        let call = self.renderer.render(&self.spec, &self.context);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| RenderError::TimedOut(limit))?,
            None => call.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::BlobError;
    use crate::job::{ItemRole, JobId, JobKind};

    /// Fails the first `failures` calls, then renders markdown.
    struct FlakyRenderer {
        failures: u32,
        delay: Option<Duration>,
        calls: AtomicU32,
    }

    impl FlakyRenderer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                delay: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ItemRenderer for FlakyRenderer {
        async fn render(
            &self,
            item: &SubItemSpec,
            _context: &RenderContext,
        ) -> Result<RenderedItem, RenderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if call <= self.failures {
                return Err(RenderError::Request(format!("attempt {} rejected", call)));
            }
            Ok(RenderedItem {
                bytes: format!("# {}", item.title).into_bytes(),
                content_type: "text/markdown".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct MemoryBlobs {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobs {
        async fn put(
            &self,
            path: &str,
            bytes: &[u8],
            _content_type: &str,
        ) -> Result<String, BlobError> {
            self.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.to_vec());
            Ok(format!("mem://{}", path))
        }
    }

    fn context() -> Arc<RenderContext> {
        Arc::new(RenderContext {
            job_id: JobId::from("job-7"),
            kind: JobKind::SlideDeck,
            language: "en".to_string(),
            style: None,
            total_items: 3,
        })
    }

    fn spec() -> SubItemSpec {
        SubItemSpec {
            position: 2,
            ..SubItemSpec::new(ItemRole::Section, "Chloroplasts")
        }
    }

    fn task(
        renderer: &Arc<FlakyRenderer>,
        blobs: &Arc<MemoryBlobs>,
        timeout: Option<Duration>,
    ) -> ItemTask {
        ItemTask::new(
            spec(),
            context(),
            Arc::clone(renderer) as Arc<dyn ItemRenderer>,
            Arc::clone(blobs) as Arc<dyn BlobStore>,
            timeout,
        )
    }

    #[tokio::test]
    async fn test_renders_and_uploads() {
        let renderer = Arc::new(FlakyRenderer::new(0));
        let blobs = Arc::new(MemoryBlobs::default());

        let artifact = task(&renderer, &blobs, None).run().await.unwrap();
        assert_eq!(
            artifact,
            ArtifactRef {
                position: 2,
                url: "mem://job-7/002.md".to_string(),
                content_type: "text/markdown".to_string(),
            }
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            blobs.objects.lock().unwrap()["job-7/002.md"],
            b"# Chloroplasts".to_vec()
        );
    }

    #[tokio::test]
    async fn test_first_failure_is_retried() {
        let renderer = Arc::new(FlakyRenderer::new(1));
        let blobs = Arc::new(MemoryBlobs::default());

        assert!(task(&renderer, &blobs, None).run().await.is_ok());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_skips_upload() {
        let renderer = Arc::new(FlakyRenderer::new(2));
        let blobs = Arc::new(MemoryBlobs::default());

        let err = task(&renderer, &blobs, None).run().await.unwrap_err();
        assert!(matches!(err, ItemError::Render(RenderError::Request(ref m)) if m == "attempt 2 rejected"));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
        assert!(blobs.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let renderer = Arc::new(FlakyRenderer {
            delay: Some(Duration::from_millis(200)),
            ..FlakyRenderer::new(0)
        });
        let blobs = Arc::new(MemoryBlobs::default());

        let err = task(&renderer, &blobs, Some(Duration::from_millis(10)))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ItemError::Render(RenderError::TimedOut(_))));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }
}
