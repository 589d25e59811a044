//! Speech-to-text through the whisper.cpp command line tool.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::StageError;

use super::media::require_transcription_wav;
use super::{run_tool, Artifact, ArtifactKind, Extractor};

pub struct WhisperCli {
    program: String,
    model: PathBuf,
    language: String,
}

impl WhisperCli {
    pub fn new(program: impl Into<String>, model: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            model: model.into(),
            language: language.into(),
        }
    }
}

/// Joins whisper's output lines into one transcript.
pub(crate) fn clean_transcript(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "[BLANK_AUDIO]")
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Extractor for WhisperCli {
    fn supports(&self, kind: ArtifactKind) -> bool {
        kind == ArtifactKind::Audio
    }

    async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
        let info = require_transcription_wav(&artifact.bytes)?;
        tracing::debug!(
            key = %artifact.key,
            duration_seconds = info.duration_seconds,
            "transcribing audio"
        );

        let input = tempfile::Builder::new()
            .prefix("briefly-whisper-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| StageError::ExtractionFailed(format!("cannot stage audio: {}", e)))?;
        tokio::fs::write(input.path(), &artifact.bytes)
            .await
            .map_err(|e| StageError::ExtractionFailed(format!("cannot stage audio: {}", e)))?;

        let args: Vec<OsString> = vec![
            "-m".into(),
            self.model.clone().into_os_string(),
            "-l".into(),
            self.language.clone().into(),
            "-nt".into(),
            "-np".into(),
            "-f".into(),
            input.path().as_os_str().to_owned(),
        ];
        let stdout = run_tool(&self.program, args, StageError::ExtractionFailed).await?;

        let transcript = clean_transcript(&String::from_utf8_lossy(&stdout));
        if transcript.is_empty() {
            return Err(StageError::ExtractionFailed(
                "transcription produced no text".to_string(),
            ));
        }
        Ok(transcript)
    }
}
