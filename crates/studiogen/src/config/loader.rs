use std::path::Path;

use crate::config::schema::{Config, EndpointConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "concurrency must be at least 1".to_string(),
        });
    }

    if config.item_timeout_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "item_timeout_secs must be positive when set".to_string(),
        });
    }

    let base_url = config.public_base_url.trim();
    if !(base_url.starts_with("http://")
        || base_url.starts_with("https://")
        || base_url.starts_with("file://"))
    {
        return Err(ConfigError::Validation {
            message: format!(
                "public_base_url must be an http(s) or file URL, got '{}'",
                config.public_base_url
            ),
        });
    }

    for (name, endpoint) in [("planner", &config.planner), ("renderer", &config.renderer)] {
        if let Some(endpoint) = endpoint {
            validate_endpoint(name, endpoint)?;
        }
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &EndpointConfig) -> Result<(), ConfigError> {
    if endpoint.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: format!("{} timeout_secs must be positive", name),
        });
    }
    Ok(())
}
