use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrieflyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Rejected input. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("youtube link is required")]
    EmptyLink,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("not a youtube link")]
    NotYoutube,

    #[error("invalid youtube video id")]
    InvalidVideoId,

    #[error("unsupported file type: {0}")]
    UnsupportedMimeType(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("uploaded file is empty")]
    EmptyUpload,

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    UploadTooLarge { size: u64, limit: u64 },
}

/// Failure reported by one of the external stage collaborators.
#[derive(Error, Debug, Clone)]
pub enum StageError {
    #[error("listing failed: {0}")]
    ListingFailed(String),

    #[error("acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("unsupported audio: expected {expected_rate} Hz mono, got {sample_rate} Hz with {channels} channel(s)")]
    UnsupportedAudio {
        expected_rate: u32,
        sample_rate: u32,
        channels: u16,
    },

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object key '{0}'")]
    InvalidKey(String),

    #[error("Object store I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Media source '{0}' does not exist")]
    MissingSource(String),
}

pub type Result<T> = std::result::Result<T, BrieflyError>;
