use std::ffi::OsString;

use async_trait::async_trait;

use crate::error::StageError;

use super::{run_tool, Transcoder, TRANSCRIBE_SAMPLE_RATE};

/// Converts uploaded audio to 16 kHz mono 16-bit PCM WAV with `ffmpeg`.
pub struct Ffmpeg {
    program: String,
}

impl Ffmpeg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

fn transcode_error(message: String) -> StageError {
    StageError::AcquisitionFailed(format!("transcoding failed: {}", message))
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn to_wav(&self, input: &[u8], extension: &str) -> Result<Vec<u8>, StageError> {
        let workdir = tempfile::Builder::new()
            .prefix("briefly-ffmpeg-")
            .tempdir()
            .map_err(|e| transcode_error(e.to_string()))?;
        let extension = if extension.is_empty() { "bin" } else { extension };
        let input_path = workdir.path().join(format!("input.{}", extension));
        let output_path = workdir.path().join("output.wav");

        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| transcode_error(e.to_string()))?;

        let args: Vec<OsString> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input_path.clone().into_os_string(),
            "-ar".into(),
            TRANSCRIBE_SAMPLE_RATE.to_string().into(),
            "-ac".into(),
            "1".into(),
            "-c:a".into(),
            "pcm_s16le".into(),
            output_path.clone().into_os_string(),
        ];
        run_tool(&self.program, args, transcode_error).await?;

        tokio::fs::read(&output_path)
            .await
            .map_err(|e| transcode_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_acquisition_failure() {
        let ffmpeg = Ffmpeg::new("briefly-no-such-ffmpeg");
        let err = ffmpeg.to_wav(b"ID3", "mp3").await.unwrap_err();
        match err {
            StageError::AcquisitionFailed(msg) => assert!(msg.starts_with("transcoding failed")),
            other => panic!("Expected AcquisitionFailed, got {:?}", other),
        }
    }
}
