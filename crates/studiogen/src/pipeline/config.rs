use std::time::Duration;

use crate::config::Config;

/// Runtime knobs for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of sub-items rendered at once.
    pub concurrency: usize,
    /// Upper bound for a single renderer attempt.
    pub item_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.concurrency,
            item_timeout: config.item_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            item_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_from_config() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "database_path": "jobs.db",
                "blob_directory": "blobs",
                "public_base_url": "file:///srv/blobs",
                "concurrency": 6,
                "item_timeout_secs": 45
            }"#,
        )
        .unwrap();

        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.concurrency, 6);
        assert_eq!(pipeline.item_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_default_has_no_timeout() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.concurrency, 3);
        assert!(pipeline.item_timeout.is_none());
    }
}
