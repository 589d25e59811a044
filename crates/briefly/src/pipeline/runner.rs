use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::jobs::{JobPhase, JobResult};
use crate::sanitize::redact_url;
use crate::stages::media::{pdf_page_count, wav_duration, wav_info};
use crate::stages::{Artifact, ArtifactKind, Stages, TRANSCRIBE_SAMPLE_RATE};
use crate::store::{
    upload_audio_key, upload_doc_key, youtube_audio_key, MediaStore, NewDocument, ObjectStore,
};
use crate::validate::{parse_media_link, validate_upload, video_id_from_link, MediaLink, Upload};

use super::config::PipelineConfig;
use super::context::{Outcome, SourceContext};
use super::error::PipelineError;
use super::fanout::{AcquiredItem, FanOut};
use super::progress::{ProgressEvent, ProgressReporter};

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    objects: Arc<dyn ObjectStore>,
    media: Arc<dyn MediaStore>,
    stages: Stages,
    fanout: FanOut,
}

fn report(progress: &dyn ProgressReporter, phase: JobPhase, message: impl Into<String>) {
    let message = message.into();
    tracing::debug!(phase = %phase, "{}", message);
    progress.report(ProgressEvent::Phase { phase, message });
}

fn video_description(video_id: &str) -> String {
    format!("YouTube video {}", video_id)
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        objects: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaStore>,
        stages: Stages,
    ) -> Self {
        let fanout = FanOut::new(
            Arc::clone(&objects),
            Arc::clone(&stages.lister),
            Arc::clone(&stages.acquirer),
            config.bucket.clone(),
            config.concurrency,
            config.scratch_dir.clone(),
        );
        Self {
            config,
            objects,
            media,
            stages,
            fanout,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs a video or playlist link to a terminal state.
    ///
    /// The terminal event is always reported before this returns.
    pub async fn run_link(
        &self,
        link: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<JobResult, PipelineError> {
        let outcome = self
            .execute_link(link, progress)
            .instrument(info_span!("pipeline", link = %redact_url(link)))
            .await;
        finish(outcome, progress)
    }

    /// Runs an uploaded file to a terminal state.
    pub async fn run_upload(
        &self,
        upload: &Upload,
        progress: &dyn ProgressReporter,
    ) -> Result<JobResult, PipelineError> {
        let outcome = self
            .execute_upload(upload, progress)
            .instrument(info_span!("pipeline", filename = %upload.filename))
            .await;
        finish(outcome, progress)
    }

    /// Acquires the audio of every playlist item and records the stored paths.
    ///
    /// A single video link is treated as a one-item playlist. Only a listing
    /// failure fails the call.
    pub async fn expand_and_acquire(&self, link: &str) -> Result<Vec<AcquiredItem>, PipelineError> {
        let acquired = match parse_media_link(link)? {
            MediaLink::Playlist { link, .. } => self.fanout.expand_and_acquire(&link).await?,
            MediaLink::Video { link, .. } => self.fanout.acquire_all(vec![link]).await,
        };

        for item in &acquired {
            let recorded = async {
                self.media
                    .get_or_create_video(&item.natural_key, &item.link)
                    .await?;
                self.media
                    .set_video_audio_path(&item.natural_key, &item.storage_path, item.duration_seconds)
                    .await
            }
            .await;
            if let Err(e) = recorded {
                tracing::warn!(video_id = %item.natural_key, error = %e, "could not record audio path");
            }
        }
        Ok(acquired)
    }

    async fn execute_link(
        &self,
        link: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        report(progress, JobPhase::Validating, "Validating link");
        match parse_media_link(link)? {
            MediaLink::Video { video_id, link } => self.run_video(&video_id, &link, progress).await,
            MediaLink::Playlist { playlist_id, link } => {
                self.run_playlist(&link, progress)
                    .instrument(info_span!("playlist", playlist_id = %playlist_id))
                    .await
            }
        }
    }

    async fn run_video(
        &self,
        video_id: &str,
        link: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        report(progress, JobPhase::CheckingCache, "Checking for an existing summary");
        let source = self
            .media
            .get_or_create_video(video_id, link)
            .instrument(info_span!("checking_cache", video_id = %video_id))
            .await?;
        let mut ctx = SourceContext::new(source, ArtifactKind::Audio, video_description(video_id));

        if let Some(summary) = self.media.get_summary_by_source(&ctx.source.source_ref()).await? {
            let ctx = ctx.with_cached_summary(summary);
            return Ok(Outcome::from_contexts(
                JobPhase::CachedSummaryFound,
                "Summary already exists",
                [&ctx],
            ));
        }

        let candidate = ctx
            .source
            .storage_path
            .clone()
            .unwrap_or_else(|| youtube_audio_key(video_id));
        if self.objects.exists(&self.config.bucket, &candidate).await? {
            report(progress, JobPhase::CachedAudioFound, "Audio already stored, skipping download");
            if ctx.source.storage_path.is_none() {
                ctx.source = self
                    .media
                    .set_video_audio_path(video_id, &candidate, None)
                    .await?;
            }
            ctx.storage_path = Some(candidate);
        } else {
            if ctx.source.storage_path.is_some() {
                tracing::info!(key = %candidate, "recorded audio is missing, downloading again");
            }
            report(progress, JobPhase::DownloadingAudio, "Downloading audio");
            let item = self
                .fanout
                .acquire_one(video_id, link)
                .instrument(info_span!("downloading_audio", video_id = %video_id))
                .await?;
            ctx.source = self
                .media
                .set_video_audio_path(video_id, &item.storage_path, item.duration_seconds)
                .await?;
            ctx.storage_path = Some(item.storage_path);
        }

        self.complete(&mut ctx, JobPhase::Transcribing, progress).await?;
        Ok(Outcome::from_contexts(JobPhase::Done, "Summary saved", [&ctx]))
    }

    async fn run_playlist(
        &self,
        link: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        report(progress, JobPhase::CheckingCache, "Listing playlist items");
        let items = self
            .stages
            .lister
            .list_items(link)
            .instrument(info_span!("checking_cache"))
            .await?;

        let mut seen = HashSet::new();
        let mut contexts = Vec::new();
        let mut pending = Vec::new();
        for item in items {
            let Some(video_id) = video_id_from_link(&item) else {
                tracing::warn!(link = %redact_url(&item), "skipping playlist item without a valid video id");
                continue;
            };
            if !seen.insert(video_id.clone()) {
                continue;
            }
            let source = self.media.get_or_create_video(&video_id, &item).await?;
            let ctx = SourceContext::new(source, ArtifactKind::Audio, video_description(&video_id));
            match self.media.get_summary_by_source(&ctx.source.source_ref()).await? {
                Some(summary) => contexts.push(ctx.with_cached_summary(summary)),
                None => {
                    pending.push(item);
                    contexts.push(ctx);
                }
            }
        }

        if contexts.is_empty() {
            return Err(PipelineError::NothingAcquired);
        }
        if pending.is_empty() {
            return Ok(Outcome::from_contexts(
                JobPhase::CachedSummaryFound,
                format!("All {} playlist items already summarized", contexts.len()),
                &contexts,
            ));
        }

        let mut stored = 0;
        for ctx in contexts.iter().filter(|c| !c.cached) {
            let key = youtube_audio_key(&ctx.source.natural_key);
            if self.objects.exists(&self.config.bucket, &key).await? {
                stored += 1;
            }
        }
        if stored == pending.len() {
            report(
                progress,
                JobPhase::CachedAudioFound,
                format!("Audio already stored for all {} pending items", stored),
            );
        } else {
            report(
                progress,
                JobPhase::DownloadingAudio,
                format!("Downloading audio for {} of {} items", pending.len() - stored, contexts.len()),
            );
        }
        let acquired: HashMap<String, AcquiredItem> = self
            .fanout
            .acquire_all(pending)
            .instrument(info_span!("downloading_audio"))
            .await
            .into_iter()
            .map(|item| (item.natural_key.clone(), item))
            .collect();

        for ctx in contexts.iter_mut().filter(|c| !c.cached) {
            if let Some(item) = acquired.get(&ctx.source.natural_key) {
                ctx.source = self
                    .media
                    .set_video_audio_path(&item.natural_key, &item.storage_path, item.duration_seconds)
                    .await?;
                ctx.storage_path = Some(item.storage_path.clone());
            }
        }
        contexts.retain(|c| c.cached || c.storage_path.is_some());
        if contexts.is_empty() {
            return Err(PipelineError::NothingAcquired);
        }

        let fresh = contexts.iter().filter(|c| !c.cached).count();
        report(progress, JobPhase::Transcribing, format!("Transcribing {} items", fresh));
        for ctx in contexts.iter_mut().filter(|c| !c.cached) {
            let span = info_span!("transcribing", video_id = %ctx.source.natural_key);
            self.step_extract(ctx).instrument(span).await?;
        }

        report(progress, JobPhase::Summarizing, format!("Summarizing {} items", fresh));
        for ctx in contexts.iter_mut().filter(|c| !c.cached) {
            let span = info_span!("summarizing", video_id = %ctx.source.natural_key);
            self.step_summarize(ctx).instrument(span).await?;
        }

        report(progress, JobPhase::Saving, "Saving summaries");
        for ctx in contexts.iter_mut().filter(|c| !c.cached) {
            self.step_save(ctx).await?;
        }

        Ok(Outcome::from_contexts(
            JobPhase::Done,
            format!("Summarized {} playlist items", contexts.len()),
            &contexts,
        ))
    }

    async fn execute_upload(
        &self,
        upload: &Upload,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        report(progress, JobPhase::Validating, "Validating upload");
        let validated = validate_upload(upload, self.config.max_upload_bytes)?;
        let (duration_seconds, page_count) = match validated.kind {
            ArtifactKind::Pdf => (None, pdf_page_count(&upload.bytes)),
            ArtifactKind::Audio => (wav_duration(&upload.bytes), None),
            ArtifactKind::Text => (None, None),
        };
        let is_audio = validated.kind == ArtifactKind::Audio;

        report(progress, JobPhase::CheckingCache, "Checking for an existing summary");
        let source = self
            .media
            .upsert_document(&NewDocument {
                file_hash: validated.file_hash.clone(),
                original_name: validated.filename.clone(),
                file_type: if is_audio { "audio" } else { "doc" }.to_string(),
                mime_type: validated.mime_type.clone(),
                size: validated.size,
                duration_seconds,
                page_count,
            })
            .instrument(info_span!("checking_cache", file_hash = %validated.file_hash))
            .await?;
        let mut ctx = SourceContext::new(
            source,
            validated.kind,
            format!("uploaded file {}", validated.filename),
        );

        if let Some(summary) = self.media.get_summary_by_source(&ctx.source.source_ref()).await? {
            let ctx = ctx.with_cached_summary(summary);
            return Ok(Outcome::from_contexts(
                JobPhase::CachedSummaryFound,
                "Summary already exists",
                [&ctx],
            ));
        }

        let canonical = if is_audio {
            upload_audio_key(&validated.file_hash)
        } else {
            upload_doc_key(&validated.file_hash, &validated.extension)
        };
        let candidate = ctx
            .source
            .storage_path
            .clone()
            .unwrap_or_else(|| canonical.clone());

        if self.objects.exists(&self.config.bucket, &candidate).await? {
            report(progress, JobPhase::CachedAudioFound, "File already stored, skipping upload");
            if ctx.source.storage_path.is_none() {
                ctx.source = self
                    .media
                    .set_document_storage_path(&validated.file_hash, &candidate)
                    .await?;
            }
            ctx.storage_path = Some(candidate);
        } else {
            report(progress, JobPhase::Uploading, "Storing file");
            let (bytes, content_type) = if is_audio {
                let wav = self
                    .normalize_audio(&upload.bytes, &validated.extension)
                    .instrument(info_span!("uploading", file_hash = %validated.file_hash))
                    .await?;
                (wav, "audio/wav")
            } else {
                (upload.bytes.clone(), validated.mime_type.as_str())
            };
            let key = self
                .objects
                .put(&self.config.bucket, &canonical, bytes, content_type)
                .await?;
            ctx.source = self
                .media
                .set_document_storage_path(&validated.file_hash, &key)
                .await?;
            ctx.storage_path = Some(key);
        }

        let extract_phase = if is_audio {
            JobPhase::Transcribing
        } else {
            JobPhase::Extracting
        };
        self.complete(&mut ctx, extract_phase, progress).await?;
        Ok(Outcome::from_contexts(JobPhase::Done, "Summary saved", [&ctx]))
    }

    /// Returns `bytes` unchanged if already transcription-ready, else transcodes.
    async fn normalize_audio(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>, PipelineError> {
        if let Ok(info) = wav_info(bytes) {
            if info.sample_rate == TRANSCRIBE_SAMPLE_RATE && info.channels == 1 {
                return Ok(bytes.to_vec());
            }
        }
        Ok(self.stages.transcoder.to_wav(bytes, extension).await?)
    }

    /// Extract, summarize and save one source.
    async fn complete(
        &self,
        ctx: &mut SourceContext,
        extract_phase: JobPhase,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let key = ctx.source.natural_key.clone();

        let message = if extract_phase == JobPhase::Transcribing {
            "Transcribing audio"
        } else {
            "Extracting text"
        };
        report(progress, extract_phase, message);
        self.step_extract(ctx)
            .instrument(info_span!("extracting", natural_key = %key))
            .await?;

        report(progress, JobPhase::Summarizing, "Generating summary");
        self.step_summarize(ctx)
            .instrument(info_span!("summarizing", natural_key = %key))
            .await?;

        report(progress, JobPhase::Saving, "Saving summary");
        self.step_save(ctx)
            .instrument(info_span!("saving", natural_key = %key))
            .await
    }

    async fn step_extract(&self, ctx: &mut SourceContext) -> Result<(), PipelineError> {
        let key = ctx.storage_path.clone().ok_or_else(|| {
            PipelineError::Internal("artifact was not stored before extraction".to_string())
        })?;
        let bytes = self.objects.fetch(&self.config.bucket, &key).await?;
        let artifact = Artifact {
            kind: ctx.kind,
            key,
            bytes,
        };
        let text = self.stages.extractors.extract(&artifact).await?;
        tracing::debug!(chars = text.len(), "text extracted");
        ctx.text = Some(text);
        Ok(())
    }

    async fn step_summarize(&self, ctx: &mut SourceContext) -> Result<(), PipelineError> {
        let text = ctx.text.as_deref().ok_or_else(|| {
            PipelineError::Internal("summarize reached without extracted text".to_string())
        })?;
        let summary = self
            .stages
            .summarizer
            .summarize(text, &ctx.description)
            .await?;
        ctx.summary_text = Some(summary);
        Ok(())
    }

    async fn step_save(&self, ctx: &mut SourceContext) -> Result<(), PipelineError> {
        let (Some(text), Some(summary)) = (ctx.text.as_deref(), ctx.summary_text.as_deref()) else {
            return Err(PipelineError::Internal(
                "save reached without a summary".to_string(),
            ));
        };
        let record = self
            .media
            .create_summary(&ctx.source.source_ref(), text, summary)
            .await?;
        ctx.summary = Some(record);
        Ok(())
    }
}

fn finish(
    outcome: Result<Outcome, PipelineError>,
    progress: &dyn ProgressReporter,
) -> Result<JobResult, PipelineError> {
    match outcome {
        Ok(outcome) => {
            tracing::info!(
                phase = %outcome.phase,
                summaries = outcome.result.summaries.len(),
                "job finished"
            );
            progress.report(ProgressEvent::Completed {
                phase: outcome.phase,
                message: outcome.message,
                result: outcome.result.clone(),
            });
            Ok(outcome.result)
        }
        Err(e) => {
            tracing::warn!(error = %e, kind = ?e.kind(), "job failed");
            progress.report(ProgressEvent::Failed {
                error: e.to_job_error(),
            });
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::StageError;
    use crate::jobs::SummaryView;
    use crate::stages::media::encode_wav;
    use crate::stages::{
        Acquirer, Extractor, ExtractorRegistry, PlaylistLister, Summarizer, TextExtractor,
        Transcoder,
    };
    use crate::store::{MemoryObjectStore, SqliteMediaStore, SourceRef};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Items(Vec<String>);

    #[async_trait]
    impl PlaylistLister for Items {
        async fn list_items(&self, _playlist_link: &str) -> Result<Vec<String>, StageError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct WavAcquirer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Acquirer for WavAcquirer {
        async fn acquire(&self, _item_link: &str, workdir: &Path) -> Result<PathBuf, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = workdir.join("a.wav");
            std::fs::write(&path, encode_wav(&[0i16; 160], 16_000, 1).unwrap()).unwrap();
            Ok(path)
        }
    }

    #[derive(Default)]
    struct RecordingTranscoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for RecordingTranscoder {
        async fn to_wav(&self, _input: &[u8], _extension: &str) -> Result<Vec<u8>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(encode_wav(&[0i16; 160], 16_000, 1).unwrap())
        }
    }

    struct FixedTranscript;

    #[async_trait]
    impl Extractor for FixedTranscript {
        fn supports(&self, kind: ArtifactKind) -> bool {
            kind == ArtifactKind::Audio
        }

        async fn extract(&self, artifact: &Artifact) -> Result<String, StageError> {
            Ok(format!("transcript of {}", artifact.key))
        }
    }

    #[derive(Default)]
    struct EchoSummarizer {
        descriptions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Summarizer for EchoSummarizer {
        async fn summarize(&self, text: &str, source_description: &str) -> Result<String, StageError> {
            self.descriptions
                .lock()
                .unwrap()
                .push(source_description.to_string());
            Ok(format!("summary: {}", text))
        }
    }

    struct Fixture {
        _scratch: TempDir,
        objects: Arc<MemoryObjectStore>,
        acquirer: Arc<WavAcquirer>,
        transcoder: Arc<RecordingTranscoder>,
        summarizer: Arc<EchoSummarizer>,
        pipeline: Pipeline,
    }

    fn fixture(items: Vec<String>) -> Fixture {
        let scratch = TempDir::new().unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        let media = Arc::new(SqliteMediaStore::new(Database::open_in_memory().unwrap()));
        let acquirer = Arc::new(WavAcquirer::default());
        let transcoder = Arc::new(RecordingTranscoder::default());
        let summarizer = Arc::new(EchoSummarizer::default());
        let stages = Stages {
            lister: Arc::new(Items(items)),
            acquirer: acquirer.clone(),
            transcoder: transcoder.clone(),
            extractors: ExtractorRegistry::default()
                .with(Arc::new(FixedTranscript))
                .with(Arc::new(TextExtractor)),
            summarizer: summarizer.clone(),
        };
        let config = Arc::new(PipelineConfig::with_scratch_dir(scratch.path()));
        let pipeline = Pipeline::new(config, objects.clone(), media, stages);
        Fixture {
            _scratch: scratch,
            objects,
            acquirer,
            transcoder,
            summarizer,
            pipeline,
        }
    }

    #[derive(Default)]
    struct Phases(Mutex<Vec<JobPhase>>);

    impl ProgressReporter for Phases {
        fn report(&self, event: ProgressEvent) {
            let phase = match event {
                ProgressEvent::Phase { phase, .. } | ProgressEvent::Completed { phase, .. } => phase,
                ProgressEvent::Failed { .. } => JobPhase::Error,
            };
            self.0.lock().unwrap().push(phase);
        }
    }

    #[tokio::test]
    async fn test_video_runs_every_stage_then_hits_cache() {
        let f = fixture(vec![]);
        let link = "https://youtu.be/dQw4w9WgXcQ";

        let phases = Phases::default();
        let result = f.pipeline.run_link(link, &phases).await.unwrap();
        assert_eq!(
            *phases.0.lock().unwrap(),
            vec![
                JobPhase::Validating,
                JobPhase::CheckingCache,
                JobPhase::DownloadingAudio,
                JobPhase::Transcribing,
                JobPhase::Summarizing,
                JobPhase::Saving,
                JobPhase::Done,
            ]
        );
        let first: &SummaryView = &result.summaries[0];
        assert_eq!(first.natural_key, "dQw4w9WgXcQ");
        assert_eq!(first.storage_path.as_deref(), Some("youtube/dQw4w9WgXcQ.wav"));
        assert_eq!(first.summary, "summary: transcript of youtube/dQw4w9WgXcQ.wav");
        assert!(!first.cached);
        assert_eq!(
            f.summarizer.descriptions.lock().unwrap()[0],
            "YouTube video dQw4w9WgXcQ"
        );

        let phases = Phases::default();
        let again = f.pipeline.run_link(link, &phases).await.unwrap();
        assert_eq!(
            *phases.0.lock().unwrap(),
            vec![
                JobPhase::Validating,
                JobPhase::CheckingCache,
                JobPhase::CachedSummaryFound,
            ]
        );
        assert!(again.summaries[0].cached);
        assert_eq!(again.summaries[0].summary, first.summary);
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_link_fails_before_any_call() {
        let f = fixture(vec![]);
        let phases = Phases::default();
        let err = f
            .pipeline
            .run_link("https://example.com/watch?v=dQw4w9WgXcQ", &phases)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(
            *phases.0.lock().unwrap(),
            vec![JobPhase::Validating, JobPhase::Error]
        );
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_upload_is_extracted_not_transcribed() {
        let f = fixture(vec![]);
        let phases = Phases::default();
        let upload = Upload {
            filename: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"meeting notes".to_vec(),
        };
        let result = f.pipeline.run_upload(&upload, &phases).await.unwrap();

        assert!(phases.0.lock().unwrap().contains(&JobPhase::Extracting));
        assert!(matches!(result.summaries[0].source, SourceRef::Document(_)));
        assert_eq!(result.summaries[0].summary, "summary: meeting notes");
        let key = result.summaries[0].storage_path.clone().unwrap();
        assert!(key.starts_with("uploads/doc/") && key.ends_with(".txt"));
        assert_eq!(f.objects.content_type("file-buc", &key).as_deref(), Some("text/plain"));
        assert_eq!(f.transcoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_audio_upload_is_transcoded_unless_ready() {
        let f = fixture(vec![]);
        let ready = Upload {
            filename: "ready.wav".to_string(),
            content_type: "audio/wav".to_string(),
            bytes: encode_wav(&[1i16; 320], 16_000, 1).unwrap(),
        };
        f.pipeline.run_upload(&ready, &Phases::default()).await.unwrap();
        assert_eq!(f.transcoder.calls.load(Ordering::SeqCst), 0);

        let stereo = Upload {
            filename: "stereo.wav".to_string(),
            content_type: "audio/wav".to_string(),
            bytes: encode_wav(&[1i16; 640], 44_100, 2).unwrap(),
        };
        let result = f.pipeline.run_upload(&stereo, &Phases::default()).await.unwrap();
        assert_eq!(f.transcoder.calls.load(Ordering::SeqCst), 1);
        let key = result.summaries[0].storage_path.clone().unwrap();
        assert!(key.starts_with("uploads/audio/"));
        assert_eq!(f.objects.content_type("file-buc", &key).as_deref(), Some("audio/wav"));
    }

    #[tokio::test]
    async fn test_playlist_keeps_playlist_order_and_flags_cached_items() {
        let items = vec![
            "https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string(),
            "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string(),
        ];
        let f = fixture(items);
        f.pipeline
            .run_link("https://youtu.be/bbbbbbbbbbb", &Phases::default())
            .await
            .unwrap();

        let phases = Phases::default();
        let result = f
            .pipeline
            .run_link("https://www.youtube.com/playlist?list=PLtest12345", &phases)
            .await
            .unwrap();

        let keys: Vec<&str> = result.summaries.iter().map(|s| s.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["aaaaaaaaaaa", "bbbbbbbbbbb"]);
        assert!(!result.summaries[0].cached);
        assert!(result.summaries[1].cached);
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(phases.0.lock().unwrap().last(), Some(&JobPhase::Done));
    }

    #[tokio::test]
    async fn test_empty_playlist_is_an_error() {
        let f = fixture(vec![]);
        let err = f
            .pipeline
            .run_link("https://www.youtube.com/playlist?list=PLtest12345", &Phases::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NothingAcquired));
    }

    #[tokio::test]
    async fn test_expand_and_acquire_records_paths() {
        let items = vec!["https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string()];
        let f = fixture(items);
        let acquired = f
            .pipeline
            .expand_and_acquire("https://www.youtube.com/playlist?list=PLtest12345")
            .await
            .unwrap();
        assert_eq!(acquired.len(), 1);

        let phases = Phases::default();
        f.pipeline
            .run_link("https://youtu.be/aaaaaaaaaaa", &phases)
            .await
            .unwrap();
        assert!(phases.0.lock().unwrap().contains(&JobPhase::CachedAudioFound));
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_playlist_reports_cached_audio_when_everything_is_stored() {
        let items = vec![
            "https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string(),
            "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string(),
        ];
        let f = fixture(items);
        let playlist = "https://www.youtube.com/playlist?list=PLtest12345";
        assert_eq!(f.pipeline.expand_and_acquire(playlist).await.unwrap().len(), 2);

        let phases = Phases::default();
        let result = f.pipeline.run_link(playlist, &phases).await.unwrap();
        assert_eq!(result.summaries.len(), 2);

        let seen = phases.0.lock().unwrap();
        assert!(seen.contains(&JobPhase::CachedAudioFound));
        assert!(!seen.contains(&JobPhase::DownloadingAudio));
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_playlist_with_partial_audio_still_downloads() {
        let items = vec![
            "https://www.youtube.com/watch?v=aaaaaaaaaaa".to_string(),
            "https://www.youtube.com/watch?v=bbbbbbbbbbb".to_string(),
        ];
        let f = fixture(items);
        f.pipeline
            .expand_and_acquire("https://youtu.be/aaaaaaaaaaa")
            .await
            .unwrap();

        let phases = Phases::default();
        f.pipeline
            .run_link("https://www.youtube.com/playlist?list=PLtest12345", &phases)
            .await
            .unwrap();

        let seen = phases.0.lock().unwrap();
        assert!(seen.contains(&JobPhase::DownloadingAudio));
        assert!(!seen.contains(&JobPhase::CachedAudioFound));
        assert_eq!(f.acquirer.calls.load(Ordering::SeqCst), 2);
    }
}
