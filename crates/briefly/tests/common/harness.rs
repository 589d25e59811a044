//! Test harness for isolated service runs.
//!
//! Every harness owns a temp directory used as fan-out scratch space, an
//! in-memory SQLite database and a `MemoryObjectStore`, so tests never touch
//! shared state or external tools.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use briefly::db::{Database, DatabaseError};
use briefly::pipeline::{Pipeline, PipelineConfig};
use briefly::stages::{ExtractorRegistry, Stages};
use briefly::store::{MemoryObjectStore, SqliteMediaStore};
use briefly::validate::Upload;
use briefly::{Briefly, JobView};

use super::doubles::{
    CountingAcquirer, CountingExtractor, CountingSummarizer, CountingTranscoder, ScriptedLister,
};

pub struct HarnessBuilder {
    concurrency: usize,
    sync_timeout: Duration,
    acquire_delay: Duration,
    playlist: Vec<String>,
}

impl HarnessBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    pub fn playlist(mut self, items: Vec<String>) -> Self {
        self.playlist = items;
        self
    }

    pub fn build(self) -> TestHarness {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let objects = Arc::new(MemoryObjectStore::new());

        let lister = Arc::new(ScriptedLister::default());
        lister.set_items(self.playlist);
        let acquirer = Arc::new(CountingAcquirer::new(self.acquire_delay));
        let transcoder = Arc::new(CountingTranscoder::default());
        let extractor = Arc::new(CountingExtractor::default());
        let summarizer = Arc::new(CountingSummarizer::default());

        let stages = Stages {
            lister: lister.clone(),
            acquirer: acquirer.clone(),
            transcoder: transcoder.clone(),
            extractors: ExtractorRegistry::default().with(extractor.clone()),
            summarizer: summarizer.clone(),
        };

        let mut config = PipelineConfig::with_scratch_dir(temp_dir.path().join("scratch"));
        config.concurrency = self.concurrency;
        let pipeline = Pipeline::new(
            Arc::new(config),
            objects.clone(),
            Arc::new(SqliteMediaStore::new(db.clone())),
            stages,
        );

        TestHarness {
            temp_dir,
            db,
            objects,
            lister,
            acquirer,
            transcoder,
            extractor,
            summarizer,
            service: Briefly::new(pipeline, self.sync_timeout),
        }
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub objects: Arc<MemoryObjectStore>,
    pub lister: Arc<ScriptedLister>,
    pub acquirer: Arc<CountingAcquirer>,
    pub transcoder: Arc<CountingTranscoder>,
    pub extractor: Arc<CountingExtractor>,
    pub summarizer: Arc<CountingSummarizer>,
    pub service: Briefly,
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            concurrency: 4,
            sync_timeout: Duration::from_secs(3),
            acquire_delay: Duration::from_millis(5),
            playlist: Vec::new(),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn scratch_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("scratch")
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Polls until the job is finished; panics after five seconds.
    pub async fn wait_for(&self, job_id: &str) -> JobView {
        for _ in 0..500 {
            if let Some(view) = self.service.status(job_id) {
                if view.is_finished() {
                    return view;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish in time", job_id);
    }

    /// Acquire, extract and summarize call counts.
    pub fn expensive_calls(&self) -> (usize, usize, usize) {
        (
            self.acquirer.calls.load(Ordering::SeqCst),
            self.extractor.calls.load(Ordering::SeqCst),
            self.summarizer.calls.load(Ordering::SeqCst),
        )
    }

    pub fn reset_counters(&self) {
        self.acquirer.calls.store(0, Ordering::SeqCst);
        self.extractor.calls.store(0, Ordering::SeqCst);
        self.summarizer.calls.store(0, Ordering::SeqCst);
        self.transcoder.calls.store(0, Ordering::SeqCst);
    }

    pub fn count_rows(&self, sql: &str) -> i64 {
        self.db
            .with_conn(|conn| {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                    .map_err(DatabaseError::from)
            })
            .expect("Failed to count rows")
    }

    pub fn upload(filename: &str, content_type: &str, bytes: &[u8]) -> Upload {
        Upload {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        }
    }
}
