use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Default config location, `~/.briefly/config.json`.
pub fn default_config_path() -> PathBuf {
    crate::config::schema::default_data_dir().join("config.json")
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, or the defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No config file at {}, using defaults",
            crate::sanitize::redact_path(path)
        );
        return Ok(Config::default());
    }
    load_config(path)
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

    let errors: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: errors.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks the schema cannot express or that apply to
/// programmatically built configs as well.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.fanout.concurrency == 0 {
        return Err(ConfigError::Validation {
            message: "fanout.concurrency must be at least 1".to_string(),
        });
    }

    if config.sync_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "syncTimeoutSecs must be greater than 0".to_string(),
        });
    }

    if config.uploads.max_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "uploads.maxBytes must be greater than 0".to_string(),
        });
    }

    if config.storage.bucket.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage.bucket must not be empty".to_string(),
        });
    }

    Ok(())
}
