//! Playlist listing and audio acquisition through `yt-dlp`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StageError;
use crate::sanitize::{redact_path, redact_url};
use crate::validate::watch_url;

use super::{run_tool, Acquirer, PlaylistLister, TRANSCRIBE_SAMPLE_RATE};

pub struct YtDlp {
    program: String,
}

/// One line of `yt-dlp -j --flat-playlist`.
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Turns flat-playlist JSON lines into item links, skipping lines that
/// carry no usable id.
pub(crate) fn parse_flat_playlist(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unparsable playlist entry: {}", e);
                None
            }
        })
        .filter_map(|entry| match (entry.url, entry.id) {
            (Some(url), _) if url.starts_with("http") => Some(url),
            (_, Some(id)) if !id.is_empty() => Some(watch_url(&id)),
            _ => None,
        })
        .collect()
}

fn find_wav(workdir: &Path) -> Result<PathBuf, StageError> {
    let entries = std::fs::read_dir(workdir).map_err(|e| {
        StageError::AcquisitionFailed(format!("cannot read {}: {}", redact_path(workdir), e))
    })?;
    entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .find(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
        })
        .ok_or_else(|| StageError::AcquisitionFailed("yt-dlp produced no WAV file".to_string()))
}

#[async_trait]
impl PlaylistLister for YtDlp {
    async fn list_items(&self, playlist_link: &str) -> Result<Vec<String>, StageError> {
        tracing::debug!(link = %redact_url(playlist_link), "listing playlist");
        let stdout = run_tool(
            &self.program,
            ["-j", "--flat-playlist", playlist_link],
            StageError::ListingFailed,
        )
        .await?;
        Ok(parse_flat_playlist(&String::from_utf8_lossy(&stdout)))
    }
}

#[async_trait]
impl Acquirer for YtDlp {
    async fn acquire(&self, item_link: &str, workdir: &Path) -> Result<PathBuf, StageError> {
        let template = workdir.join("%(id)s.%(ext)s");
        let postprocessor = format!("ffmpeg:-ar {} -ac 1", TRANSCRIBE_SAMPLE_RATE);
        let args: Vec<std::ffi::OsString> = vec![
            "--no-playlist".into(),
            "--quiet".into(),
            "-x".into(),
            "--audio-format".into(),
            "wav".into(),
            "--postprocessor-args".into(),
            postprocessor.into(),
            "-o".into(),
            template.into_os_string(),
            item_link.into(),
        ];
        run_tool(&self.program, args, StageError::AcquisitionFailed).await?;
        find_wav(workdir)
    }
}
