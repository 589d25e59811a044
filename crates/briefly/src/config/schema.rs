use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

/// Root configuration, usually loaded from `~/.briefly/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    /// Deadline for the direct (non-queued) summarize call.
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            storage: StorageConfig::default(),
            fanout: FanoutConfig::default(),
            tools: ToolsConfig::default(),
            summarizer: SummarizerConfig::default(),
            uploads: UploadsConfig::default(),
            sync_timeout_secs: default_sync_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Base directory for everything briefly keeps on disk.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".briefly"))
        .unwrap_or_else(|| std::env::temp_dir().join("briefly"))
}

fn default_sync_timeout() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Root directory of the filesystem object store.
    #[serde(default = "default_objects_root")]
    pub objects_root: PathBuf,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_objects_root() -> PathBuf {
    default_data_dir().join("objects")
}

fn default_bucket() -> String {
    crate::store::DOCUMENT_BUCKET.to_string()
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path()
        .unwrap_or_else(|| default_data_dir().join("data").join("briefly.db"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            objects_root: default_objects_root(),
            bucket: default_bucket(),
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutConfig {
    /// Maximum number of playlist items acquired at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Parent directory for per-item scratch directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_concurrency() -> usize {
    4
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("briefly")
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// External programs the stage executors shell out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    #[serde(default = "default_yt_dlp")]
    pub yt_dlp: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_whisper_cli")]
    pub whisper_cli: String,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: PathBuf,
    /// Spoken language passed to whisper; `auto` lets it detect.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_yt_dlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_whisper_cli() -> String {
    "whisper-cli".to_string()
}

fn default_whisper_model() -> PathBuf {
    default_data_dir().join("models").join("ggml-base.en.bin")
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: default_yt_dlp(),
            ffmpeg: default_ffmpeg(),
            whisper_cli: default_whisper_cli(),
            whisper_model: default_whisper_model(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(flatten)]
    pub api_key: SecretSource,
    #[serde(default = "default_summarizer_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_summarizer_timeout() -> u64 {
    120
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: SecretSource::from_env_var("GEMINI_API_KEY"),
            timeout_secs: default_summarizer_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_bytes() -> u64 {
    crate::validate::DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fanout.concurrency, 4);
        assert_eq!(config.sync_timeout_secs, 3);
        assert_eq!(config.uploads.max_bytes, 20 * 1024 * 1024);
        assert_eq!(config.summarizer.model, "gemini-2.5-flash");
        assert_eq!(config.storage.bucket, "file-buc");
        assert!(config.storage.database_path.ends_with("data/briefly.db"));
        assert!(config.storage.database_path.starts_with(default_data_dir()));
        assert_eq!(
            config.summarizer.api_key.env_var.as_deref(),
            Some("GEMINI_API_KEY")
        );
    }

    #[test]
    fn test_minimal_document_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"version": "1.0"}"#).unwrap();
        assert_eq!(config.fanout.concurrency, 4);
        assert_eq!(config.tools.yt_dlp, "yt-dlp");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_summarizer_key_fields_are_flattened() {
        let config: SummarizerConfig =
            serde_json::from_str(r#"{"apiKeyFile": "/run/secrets/gemini", "timeoutSecs": 10}"#)
                .unwrap();
        assert_eq!(config.api_key.file.as_deref(), Some("/run/secrets/gemini"));
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.model, "gemini-2.5-flash");
    }
}
