use std::sync::Arc;

use crate::jobs::{JobError, JobPhase, JobRegistry, JobResult, JobUpdate};

/// Events emitted by the pipeline while it runs a job.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    /// Terminal success, either `done` or `cached_summary_found`.
    Completed {
        phase: JobPhase,
        message: String,
        result: JobResult,
    },
    Failed {
        error: JobError,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards everything; used by the direct, non-queued flow.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes pipeline events into the job registry.
pub struct RegistryProgress {
    registry: Arc<dyn JobRegistry>,
    job_id: String,
}

impl RegistryProgress {
    pub fn new(registry: Arc<dyn JobRegistry>, job_id: &str) -> Self {
        Self {
            registry,
            job_id: job_id.to_string(),
        }
    }
}

impl ProgressReporter for RegistryProgress {
    fn report(&self, event: ProgressEvent) {
        let update = match event {
            ProgressEvent::Phase { phase, message } => JobUpdate::phase(phase, message),
            ProgressEvent::Completed {
                phase,
                message,
                result,
            } => JobUpdate::succeeded(phase, message, result),
            ProgressEvent::Failed { error } => JobUpdate::failed(error),
        };
        self.registry.update(&self.job_id, update);
    }
}
