//! Job phases and the snapshot type handed to pollers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::SourceRef;

/// Position of a job in the processing state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Pending,
    Validating,
    CheckingCache,
    CachedSummaryFound,
    CachedAudioFound,
    DownloadingAudio,
    Uploading,
    Transcribing,
    Extracting,
    Summarizing,
    Saving,
    Done,
    Error,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Pending => "pending",
            JobPhase::Validating => "validating",
            JobPhase::CheckingCache => "checking_cache",
            JobPhase::CachedSummaryFound => "cached_summary_found",
            JobPhase::CachedAudioFound => "cached_audio_found",
            JobPhase::DownloadingAudio => "downloading_audio",
            JobPhase::Uploading => "uploading",
            JobPhase::Transcribing => "transcribing",
            JobPhase::Extracting => "extracting",
            JobPhase::Summarizing => "summarizing",
            JobPhase::Saving => "saving",
            JobPhase::Done => "done",
            JobPhase::Error => "error",
        }
    }

    /// `done`, `cached_summary_found` and `error` are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Done | JobPhase::CachedSummaryFound | JobPhase::Error
        )
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobPhase::Pending => JobStatus::Pending,
            JobPhase::Done | JobPhase::CachedSummaryFound => JobStatus::Succeeded,
            JobPhase::Error => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse outcome derived from the phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// What went wrong, kept apart from the message so callers can branch on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Bad input; retrying the same request cannot succeed.
    Validation,
    /// An external collaborator or store call failed.
    Collaborator,
    /// The orchestration itself faulted.
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::new(FailureKind::Internal, "internal error while processing job")
    }
}

/// One summary produced or found by a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub source: SourceRef,
    /// Video id or content hash.
    pub natural_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    pub summary: String,
    /// True when the summary already existed and nothing was recomputed.
    pub cached: bool,
}

/// Terminal payload of a successful job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub summaries: Vec<SummaryView>,
}

/// What a job was submitted with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobInput {
    Link { link: String },
    Upload { filename: String, size: u64 },
}

impl JobInput {
    pub fn describe(&self) -> String {
        match self {
            JobInput::Link { link } => crate::sanitize::redact_url(link),
            JobInput::Upload { filename, .. } => filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseEntry {
    pub phase: JobPhase,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Mutation applied by the orchestrator that owns the job.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub phase: JobPhase,
    pub message: String,
    pub result: Option<JobResult>,
    pub error: Option<JobError>,
}

impl JobUpdate {
    pub fn phase(phase: JobPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            result: None,
            error: None,
        }
    }

    pub fn succeeded(phase: JobPhase, message: impl Into<String>, result: JobResult) -> Self {
        Self {
            result: Some(result),
            ..Self::phase(phase, message)
        }
    }

    pub fn failed(error: JobError) -> Self {
        Self {
            phase: JobPhase::Error,
            message: error.message.clone(),
            result: None,
            error: Some(error),
        }
    }
}

/// Consistent snapshot of one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub input: JobInput,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    /// Every phase entered so far, oldest first.
    pub history: Vec<PhaseEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobView {
    pub fn new(id: &str, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            input,
            phase: JobPhase::Pending,
            status: JobStatus::Pending,
            message: "job accepted".to_string(),
            history: vec![PhaseEntry {
                phase: JobPhase::Pending,
                message: "job accepted".to_string(),
                at: now,
            }],
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn apply(&mut self, update: JobUpdate) {
        let now = Utc::now();
        self.phase = update.phase;
        self.status = update.phase.status();
        self.message = update.message.clone();
        self.history.push(PhaseEntry {
            phase: update.phase,
            message: update.message,
            at: now,
        });
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        self.updated_at = now;
        if update.phase.is_terminal() {
            self.finished_at = Some(now);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Phases in the order they were entered.
    pub fn phases(&self) -> Vec<JobPhase> {
        self.history.iter().map(|entry| entry.phase).collect()
    }
}
