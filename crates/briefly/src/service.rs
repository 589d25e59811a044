//! Public entry point: submit jobs, poll them, stream their progress.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::BrieflyError;
use crate::jobs::{
    InMemoryJobRegistry, JobError, JobInput, JobProgressBroadcaster, JobProgressEvent,
    JobRegistry, JobResult, JobUpdate, JobView,
};
use crate::pipeline::{
    AcquiredItem, NoopProgress, Pipeline, PipelineConfig, PipelineError, RegistryProgress,
};
use crate::stages::{
    ExtractorRegistry, Ffmpeg, GeminiSummarizer, PdfExtractor, Stages, TextExtractor, WhisperCli,
    YtDlp,
};
use crate::store::{FsObjectStore, SqliteMediaStore};
use crate::validate::Upload;

pub type JobId = String;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub struct Briefly {
    registry: Arc<dyn JobRegistry>,
    broadcaster: JobProgressBroadcaster,
    pipeline: Arc<Pipeline>,
    sync_timeout: Duration,
}

impl Briefly {
    /// Production constructor: SQLite, filesystem objects and the external tools.
    pub fn from_config(config: &Config) -> Result<Self, BrieflyError> {
        let db = Database::open(&config.storage.database_path)?;
        let media = Arc::new(SqliteMediaStore::new(db));
        let objects = Arc::new(FsObjectStore::new(&config.storage.objects_root));

        let tools = &config.tools;
        let ytdlp = Arc::new(YtDlp::new(&tools.yt_dlp));
        let extractors = ExtractorRegistry::default()
            .with(Arc::new(WhisperCli::new(
                &tools.whisper_cli,
                &tools.whisper_model,
                &tools.language,
            )))
            .with(Arc::new(PdfExtractor))
            .with(Arc::new(TextExtractor));
        let stages = Stages {
            lister: ytdlp.clone(),
            acquirer: ytdlp,
            transcoder: Arc::new(Ffmpeg::new(&tools.ffmpeg)),
            extractors,
            summarizer: Arc::new(GeminiSummarizer::from_config(&config.summarizer)?),
        };

        let pipeline = Pipeline::new(
            Arc::new(PipelineConfig::from_config(config)),
            objects,
            media,
            stages,
        );
        log::info!(
            "Briefly ready (bucket {}, fan-out concurrency {})",
            config.storage.bucket,
            config.fanout.concurrency
        );
        Ok(Self::new(pipeline, Duration::from_secs(config.sync_timeout_secs)))
    }

    /// Wires an in-memory registry that publishes to a fresh broadcaster.
    pub fn new(pipeline: Pipeline, sync_timeout: Duration) -> Self {
        let broadcaster = JobProgressBroadcaster::default();
        let registry = Arc::new(InMemoryJobRegistry::with_broadcaster(broadcaster.clone()));
        Self::with_registry(pipeline, registry, broadcaster, sync_timeout)
    }

    pub fn with_registry(
        pipeline: Pipeline,
        registry: Arc<dyn JobRegistry>,
        broadcaster: JobProgressBroadcaster,
        sync_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            pipeline: Arc::new(pipeline),
            sync_timeout,
        }
    }

    /// Accepts a video or playlist link and returns immediately.
    pub fn submit_link(&self, link: &str) -> JobId {
        let link = link.to_string();
        let job_id = self.create_job(JobInput::Link { link: link.clone() });
        let pipeline = Arc::clone(&self.pipeline);
        self.spawn_job(&job_id, move |progress| async move {
            pipeline.run_link(&link, &progress).await
        });
        job_id
    }

    /// Accepts an uploaded file and returns immediately.
    pub fn submit_upload(&self, upload: Upload) -> JobId {
        let job_id = self.create_job(JobInput::Upload {
            filename: upload.filename.clone(),
            size: upload.bytes.len() as u64,
        });
        let pipeline = Arc::clone(&self.pipeline);
        self.spawn_job(&job_id, move |progress| async move {
            pipeline.run_upload(&upload, &progress).await
        });
        job_id
    }

    pub fn status(&self, job_id: &str) -> Option<JobView> {
        self.registry.get(job_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }

    pub fn registry(&self) -> &Arc<dyn JobRegistry> {
        &self.registry
    }

    /// Acquires every item of a playlist; `(natural_key, storage_path)` per item.
    pub async fn expand_and_acquire(&self, link: &str) -> Result<Vec<AcquiredItem>, PipelineError> {
        self.pipeline.expand_and_acquire(link).await
    }

    /// Direct, non-queued flow bounded by the sync timeout.
    ///
    /// On timeout the in-flight call is dropped, which kills any child process.
    pub async fn summarize_link_now(&self, link: &str) -> Result<JobResult, ServiceError> {
        match tokio::time::timeout(self.sync_timeout, self.pipeline.run_link(link, &NoopProgress))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(timeout = ?self.sync_timeout, "direct summary timed out");
                Err(ServiceError::Timeout(self.sync_timeout))
            }
        }
    }

    fn create_job(&self, input: JobInput) -> JobId {
        loop {
            let job_id = Uuid::new_v4().to_string();
            if self.registry.create(&job_id, input.clone()) {
                tracing::info!(job_id = %job_id, input = %input.describe(), "job accepted");
                return job_id;
            }
        }
    }

    /// Runs the job on its own task. A panic becomes an `internal` job error.
    fn spawn_job<F, Fut>(&self, job_id: &str, run: F)
    where
        F: FnOnce(RegistryProgress) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<JobResult, PipelineError>> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let job_id = job_id.to_string();
        let span = info_span!("job", job_id = %job_id);

        tokio::spawn(
            async move {
                let progress = RegistryProgress::new(Arc::clone(&registry), &job_id);
                let outcome = AssertUnwindSafe(run(progress)).catch_unwind().await;
                if outcome.is_err() {
                    tracing::error!("job panicked");
                    registry.update(&job_id, JobUpdate::failed(JobError::internal()));
                }
            }
            .instrument(span),
        );
    }
}
