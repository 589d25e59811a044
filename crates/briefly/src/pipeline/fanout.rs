//! Bounded fan-out: acquire many playlist items with a concurrency ceiling.
//!
//! Every item runs in its own task behind a semaphore permit and owns a
//! private scratch directory that is removed when the task ends. A failing
//! item is logged and dropped; it never cancels its siblings.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::sanitize::{redact_path, redact_url};
use crate::stages::media::wav_duration;
use crate::stages::{Acquirer, PlaylistLister};
use crate::store::{youtube_audio_key, ObjectStore};
use crate::validate::video_id_from_link;

use super::error::PipelineError;

/// One item whose audio is present in the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredItem {
    /// Video id.
    pub natural_key: String,
    /// Object key of the stored audio.
    pub storage_path: String,
    pub link: String,
    /// Known only when the audio was acquired by this call.
    pub duration_seconds: Option<f64>,
    /// False when the object already existed and nothing was downloaded.
    pub downloaded: bool,
}

#[derive(Clone)]
pub struct FanOut {
    objects: Arc<dyn ObjectStore>,
    lister: Arc<dyn PlaylistLister>,
    acquirer: Arc<dyn Acquirer>,
    bucket: String,
    concurrency: usize,
    scratch_dir: PathBuf,
}

impl FanOut {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        lister: Arc<dyn PlaylistLister>,
        acquirer: Arc<dyn Acquirer>,
        bucket: impl Into<String>,
        concurrency: usize,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            objects,
            lister,
            acquirer,
            bucket: bucket.into(),
            concurrency: concurrency.max(1),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Lists the playlist and acquires every item. Fails only if listing fails.
    pub async fn expand_and_acquire(
        &self,
        playlist_link: &str,
    ) -> Result<Vec<AcquiredItem>, PipelineError> {
        let items = self.lister.list_items(playlist_link).await?;
        tracing::info!(
            playlist = %redact_url(playlist_link),
            items = items.len(),
            "playlist listed"
        );
        Ok(self.acquire_all(items).await)
    }

    /// Acquires `links` with at most `concurrency` items in flight.
    ///
    /// Results arrive in completion order. Links without a valid video id
    /// and repeated ids are skipped.
    pub async fn acquire_all(&self, links: Vec<String>) -> Vec<AcquiredItem> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        for link in links {
            let Some(video_id) = video_id_from_link(&link) else {
                tracing::warn!(link = %redact_url(&link), "skipping item without a valid video id");
                continue;
            };
            if !seen.insert(video_id.clone()) {
                tracing::debug!(video_id = %video_id, "skipping repeated item");
                continue;
            }

            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let span = tracing::info_span!("fanout_item", video_id = %video_id);
            tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return None;
                    };
                    match this.acquire_one(&video_id, &link).await {
                        Ok(item) => Some(item),
                        Err(e) => {
                            tracing::warn!(error = %e, "item dropped");
                            None
                        }
                    }
                }
                .instrument(span),
            );
        }

        let mut acquired = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(item)) => acquired.push(item),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "fan-out task aborted"),
            }
        }
        acquired
    }

    /// Ensures the audio of one video is in the object store.
    pub async fn acquire_one(
        &self,
        video_id: &str,
        link: &str,
    ) -> Result<AcquiredItem, PipelineError> {
        let key = youtube_audio_key(video_id);
        if self.objects.exists(&self.bucket, &key).await? {
            tracing::debug!(key = %key, "audio already stored");
            return Ok(AcquiredItem {
                natural_key: video_id.to_string(),
                storage_path: key,
                link: link.to_string(),
                duration_seconds: None,
                downloaded: false,
            });
        }

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| scratch_error(&self.scratch_dir, e))?;
        // Removed on drop, on every exit path.
        let workdir = tempfile::Builder::new()
            .prefix("item-")
            .tempdir_in(&self.scratch_dir)
            .map_err(|e| scratch_error(&self.scratch_dir, e))?;

        let audio_path = self.acquirer.acquire(link, workdir.path()).await?;
        let bytes = tokio::fs::read(&audio_path)
            .await
            .map_err(|e| scratch_error(&audio_path, e))?;
        let duration_seconds = wav_duration(&bytes);

        let stored = self
            .objects
            .put(&self.bucket, &key, bytes, "audio/wav")
            .await?;
        tracing::info!(
            key = %stored,
            file = %redact_path(&audio_path),
            "audio acquired"
        );

        Ok(AcquiredItem {
            natural_key: video_id.to_string(),
            storage_path: stored,
            link: link.to_string(),
            duration_seconds,
            downloaded: true,
        })
    }
}

fn scratch_error(path: &std::path::Path, e: std::io::Error) -> PipelineError {
    PipelineError::Store(crate::error::StoreError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
