pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod stages;
pub mod store;
pub mod telemetry;
pub mod validate;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{BrieflyError, ConfigError, Result, StageError, StoreError, ValidationError};
pub use jobs::{
    FailureKind, InMemoryJobRegistry, JobError, JobPhase, JobProgressBroadcaster,
    JobProgressEvent, JobRegistry, JobResult, JobStatus, JobView, SummaryView,
};
pub use pipeline::{AcquiredItem, Pipeline, PipelineConfig, PipelineError};
pub use secrets::{resolve_secret, SecretError, SecretSource};
pub use service::{Briefly, JobId, ServiceError};
pub use telemetry::init_logging;
pub use validate::Upload;
