//! Counting stage doubles.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use briefly::stages::media::encode_wav;
use briefly::stages::{
    Acquirer, Artifact, ArtifactKind, Extractor, PlaylistLister, Summarizer, Transcoder,
};
use briefly::StageError;

/// Returns a fixed list of items, or fails.
#[derive(Default)]
pub struct ScriptedLister {
    pub items: Mutex<Vec<String>>,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl ScriptedLister {
    pub fn set_items(&self, items: Vec<String>) {
        *self.items.lock().unwrap() = items;
    }
}

#[async_trait]
impl PlaylistLister for ScriptedLister {
    async fn list_items(&self, _playlist_link: &str) -> Result<Vec<String>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::ListingFailed("playlist is private".to_string()));
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

/// Writes a short 16 kHz mono WAV and records how many calls overlap.
pub struct CountingAcquirer {
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub delay: Duration,
    /// Links containing any of these ids fail.
    pub fail_ids: Mutex<Vec<String>>,
    pub workdirs: Mutex<Vec<PathBuf>>,
}

impl CountingAcquirer {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
            fail_ids: Mutex::new(Vec::new()),
            workdirs: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, video_id: &str) {
        self.fail_ids.lock().unwrap().push(video_id.to_string());
    }
}

#[async_trait]
impl Acquirer for CountingAcquirer {
    async fn acquire(&self, item_link: &str, workdir: &Path) -> Result<PathBuf, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.workdirs.lock().unwrap().push(workdir.to_path_buf());

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .fail_ids
            .lock()
            .unwrap()
            .iter()
            .any(|id| item_link.contains(id.as_str()));
        if failing {
            return Err(StageError::AcquisitionFailed("HTTP Error 403: Forbidden".to_string()));
        }

        let path = workdir.join("audio.wav");
        std::fs::write(&path, encode_wav(&[0i16; 1_600], 16_000, 1).unwrap()).unwrap();
        Ok(path)
    }
}

#[derive(Default)]
pub struct CountingTranscoder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transcoder for CountingTranscoder {
    async fn to_wav(&self, _input: &[u8], _extension: &str) -> Result<Vec<u8>, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(encode_wav(&[0i16; 1_600], 16_000, 1).unwrap())
    }
}

/// Handles every artifact kind: text is decoded, anything else is described.
#[derive(Default)]
pub struct CountingExtractor {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl Extractor for CountingExtractor {
    fn supports(&self, _kind: ArtifactKind) -> bool {
        true
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(StageError::ExtractionFailed(
                "whisper-cli exited with status 1".to_string(),
            ));
        }
        Ok(match artifact.kind {
            ArtifactKind::Text => String::from_utf8_lossy(&artifact.bytes).into_owned(),
            _ => format!("transcript of {}", artifact.key),
        })
    }
}

#[derive(Default)]
pub struct CountingSummarizer {
    pub calls: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
    pub panic: AtomicBool,
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, text: &str, _source_description: &str) -> Result<String, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("summarizer blew up");
        }
        Ok(format!("summary of {}", text))
    }
}
