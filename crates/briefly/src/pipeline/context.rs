use crate::jobs::{JobPhase, JobResult, SummaryView};
use crate::stages::ArtifactKind;
use crate::store::{MediaSource, SummaryRecord};

/// One media source moving through the stages of a job.
pub struct SourceContext {
    pub source: MediaSource,
    pub kind: ArtifactKind,
    /// Handed to the summarizer as the origin of the text.
    pub description: String,

    // Set once the artifact is known to be in the object store.
    pub storage_path: Option<String>,

    // Extraction result.
    pub text: Option<String>,

    // Summarizer output, before it is persisted.
    pub summary_text: Option<String>,

    // Set when the summary already existed or after saving.
    pub summary: Option<SummaryRecord>,
    pub cached: bool,
}

impl SourceContext {
    pub fn new(source: MediaSource, kind: ArtifactKind, description: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            description: description.into(),
            storage_path: None,
            text: None,
            summary_text: None,
            summary: None,
            cached: false,
        }
    }

    /// Marks the context as served from an existing summary.
    pub fn with_cached_summary(mut self, summary: SummaryRecord) -> Self {
        self.summary = Some(summary);
        self.cached = true;
        self
    }

    pub fn view(&self) -> Option<SummaryView> {
        let summary = self.summary.as_ref()?;
        Some(SummaryView {
            source: self.source.source_ref(),
            natural_key: self.source.natural_key.clone(),
            storage_path: self
                .storage_path
                .clone()
                .or_else(|| self.source.storage_path.clone()),
            summary: summary.summary.clone(),
            cached: self.cached,
        })
    }
}

/// Terminal success of one pipeline run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// `done` or `cached_summary_found`.
    pub phase: JobPhase,
    pub message: String,
    pub result: JobResult,
}

impl Outcome {
    pub fn from_contexts<'a>(
        phase: JobPhase,
        message: impl Into<String>,
        contexts: impl IntoIterator<Item = &'a SourceContext>,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            result: JobResult {
                summaries: contexts.into_iter().filter_map(SourceContext::view).collect(),
            },
        }
    }
}
