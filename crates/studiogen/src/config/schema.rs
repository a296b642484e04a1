use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Falls back to `~/.studiogen/data/studiogen.db` when unset.
    #[serde(default)]
    pub database_path: Option<String>,
    pub blob_directory: String,
    /// Prefix of the URLs handed out for uploaded artifacts.
    pub public_base_url: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-attempt renderer timeout. Unset means renderer calls may take
    /// arbitrarily long.
    #[serde(default)]
    pub item_timeout_secs: Option<u64>,
    /// Age after which a job still in `generating` is reported as stale.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub planner: Option<EndpointConfig>,
    #[serde(default)]
    pub renderer: Option<EndpointConfig>,
}

fn default_concurrency() -> usize {
    3
}

fn default_stale_after() -> u64 {
    15 * 60
}

fn default_poll_interval() -> u64 {
    2500
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_deref()
            .map(PathBuf::from)
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Remote model endpoint (planner or renderer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    #[serde(default = "default_endpoint_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint_timeout() -> u64 {
    120
}
