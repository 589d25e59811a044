//! Stage executors: the replaceable, slow, unreliable parts of the pipeline.
//!
//! Each stage is an async trait so tests can swap in doubles and deployments
//! can swap engines. Concrete implementations shell out to `yt-dlp`,
//! `ffmpeg` and `whisper-cli`, parse PDFs with lopdf, and call the Gemini
//! API for summaries.

pub mod document;
pub mod ffmpeg;
pub mod media;
pub mod summarize;
pub mod transcribe;
pub mod ytdlp;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::StageError;
use crate::sanitize::truncate_for_log;

pub use document::{PdfExtractor, TextExtractor};
pub use ffmpeg::Ffmpeg;
pub use summarize::GeminiSummarizer;
pub use transcribe::WhisperCli;
pub use ytdlp::YtDlp;

/// Sample rate every transcription input must have.
pub const TRANSCRIBE_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 16 kHz mono WAV.
    Audio,
    Pdf,
    Text,
}

/// A stored artifact handed to an extractor.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Object key the bytes were fetched from.
    pub key: String,
    pub bytes: Vec<u8>,
}

/// Enumerates the items of a playlist.
#[async_trait]
pub trait PlaylistLister: Send + Sync {
    /// Item links in playlist order.
    async fn list_items(&self, playlist_link: &str) -> Result<Vec<String>, StageError>;
}

/// Downloads one item's audio.
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Writes a 16 kHz mono WAV into `workdir` and returns its path.
    async fn acquire(&self, item_link: &str, workdir: &Path) -> Result<PathBuf, StageError>;
}

/// Normalizes uploaded audio for transcription.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Converts `input` (named by its extension) to 16 kHz mono 16-bit WAV.
    async fn to_wav(&self, input: &[u8], extension: &str) -> Result<Vec<u8>, StageError>;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    fn supports(&self, kind: ArtifactKind) -> bool;

    async fn extract(&self, artifact: &Artifact) -> Result<String, StageError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, source_description: &str) -> Result<String, StageError>;
}

/// Routes an artifact to the first extractor that supports its kind.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn with(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn supports(&self, kind: ArtifactKind) -> bool {
        self.extractors.iter().any(|e| e.supports(kind))
    }

    pub async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
        let extractor = self
            .extractors
            .iter()
            .find(|e| e.supports(artifact.kind))
            .ok_or_else(|| {
                StageError::ExtractionFailed(format!("no extractor for {:?} artifacts", artifact.kind))
            })?;
        extractor.extract(artifact).await
    }
}

/// The full set of stage executors a pipeline runs with.
#[derive(Clone)]
pub struct Stages {
    pub lister: Arc<dyn PlaylistLister>,
    pub acquirer: Arc<dyn Acquirer>,
    pub transcoder: Arc<dyn Transcoder>,
    pub extractors: ExtractorRegistry,
    pub summarizer: Arc<dyn Summarizer>,
}

/// Runs an external tool to completion and returns its stdout.
///
/// The child is killed if the returned future is dropped, so a caller-side
/// timeout also stops the process.
pub(crate) async fn run_tool<I, S>(
    program: &str,
    args: I,
    to_error: fn(String) -> StageError,
) -> Result<Vec<u8>, StageError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| to_error(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(program, status = %output.status, stderr = %truncate_for_log(&stderr, 2000), "tool failed");
        return Err(to_error(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            truncate_for_log(&stderr, 300)
        )));
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(ArtifactKind, &'static str);

    #[async_trait]
    impl Extractor for Fixed {
        fn supports(&self, kind: ArtifactKind) -> bool {
            kind == self.0
        }

        async fn extract(&self, _artifact: &Artifact) -> Result<String, StageError> {
            Ok(self.1.to_string())
        }
    }

    fn artifact(kind: ArtifactKind) -> Artifact {
        Artifact {
            kind,
            key: "k".to_string(),
            bytes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_registry_routes_by_kind() {
        let registry = ExtractorRegistry::default()
            .with(Arc::new(Fixed(ArtifactKind::Text, "text")))
            .with(Arc::new(Fixed(ArtifactKind::Audio, "audio")));

        assert_eq!(registry.extract(&artifact(ArtifactKind::Audio)).await.unwrap(), "audio");
        assert_eq!(registry.extract(&artifact(ArtifactKind::Text)).await.unwrap(), "text");
        assert!(!registry.supports(ArtifactKind::Pdf));
    }

    #[tokio::test]
    async fn test_registry_without_match_fails() {
        let registry = ExtractorRegistry::default();
        let err = registry.extract(&artifact(ArtifactKind::Pdf)).await.unwrap_err();
        assert!(matches!(err, StageError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let err = run_tool(
            "briefly-definitely-not-a-real-tool",
            ["--version"],
            StageError::AcquisitionFailed,
        )
        .await
        .unwrap_err();
        match err {
            StageError::AcquisitionFailed(msg) => assert!(msg.contains("failed to run")),
            other => panic!("Expected AcquisitionFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_stdout_and_failure() {
        let out = run_tool("sh", ["-c", "printf hello"], StageError::ListingFailed)
            .await
            .unwrap();
        assert_eq!(out, b"hello");

        let err = run_tool("sh", ["-c", "echo oops >&2; exit 3"], StageError::ListingFailed)
            .await
            .unwrap_err();
        match err {
            StageError::ListingFailed(msg) => assert!(msg.contains("oops")),
            other => panic!("Expected ListingFailed, got {:?}", other),
        }
    }
}
