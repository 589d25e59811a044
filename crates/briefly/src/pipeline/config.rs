use std::path::PathBuf;

use crate::config::Config;

pub struct PipelineConfig {
    /// Bucket every artifact is stored in.
    pub bucket: String,
    /// Ceiling on concurrently acquired playlist items.
    pub concurrency: usize,
    /// Parent of the per-item scratch directories.
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.storage.bucket.clone(),
            concurrency: config.fanout.concurrency.max(1),
            scratch_dir: config.fanout.scratch_dir.clone(),
            max_upload_bytes: config.uploads.max_bytes,
        }
    }

    /// Defaults with the given scratch directory.
    pub fn with_scratch_dir(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            ..Self::from_config(&Config::default())
        }
    }
}
