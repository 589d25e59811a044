//! Media metadata helpers: WAV format checks and PDF page counts.

use std::io::Cursor;

use crate::error::StageError;

use super::TRANSCRIBE_SAMPLE_RATE;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: f64,
}

/// Reads the WAV header of `bytes`.
pub fn wav_info(bytes: &[u8]) -> Result<WavInfo, hound::Error> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let duration_seconds = if spec.sample_rate == 0 {
        0.0
    } else {
        f64::from(reader.duration()) / f64::from(spec.sample_rate)
    };
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_seconds,
    })
}

/// Accepts only 16 kHz mono WAV; anything else is a hard failure.
pub fn require_transcription_wav(bytes: &[u8]) -> Result<WavInfo, StageError> {
    let info = wav_info(bytes)
        .map_err(|e| StageError::ExtractionFailed(format!("invalid WAV data: {}", e)))?;
    if info.sample_rate != TRANSCRIBE_SAMPLE_RATE || info.channels != 1 {
        return Err(StageError::UnsupportedAudio {
            expected_rate: TRANSCRIBE_SAMPLE_RATE,
            sample_rate: info.sample_rate,
            channels: info.channels,
        });
    }
    Ok(info)
}

/// Duration of a WAV, or `None` if the bytes are not a readable WAV.
pub fn wav_duration(bytes: &[u8]) -> Option<f64> {
    wav_info(bytes).ok().map(|info| info.duration_seconds)
}

/// Page count of a PDF, or `None` if lopdf cannot parse it.
pub fn pdf_page_count(bytes: &[u8]) -> Option<u32> {
    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => u32::try_from(doc.get_pages().len()).ok(),
        Err(e) => {
            log::debug!("Could not count PDF pages: {}", e);
            None
        }
    }
}

/// Writes `samples` as 16-bit PCM WAV. Test fixtures and the transcoder
/// doubles build their audio with this.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
