//! Job progress broadcaster for streaming status changes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::status::{JobError, JobPhase, JobStatus, JobUpdate};

/// Emitted for every accepted registry mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub phase: JobPhase,
    pub status: JobStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Number of summaries in the result, set on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_count: Option<usize>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, phase: JobPhase, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase,
            status: phase.status(),
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
            summary_count: None,
        }
    }

    pub fn from_update(job_id: &str, update: &JobUpdate) -> Self {
        Self {
            error: update.error.clone(),
            summary_count: update.result.as_ref().map(|r| r.summaries.len()),
            ..Self::new(job_id, update.phase, &update.message)
        }
    }
}

/// Fan-out of progress events to any number of subscribers.
///
/// Sending never blocks; slow subscribers lag and lose the oldest events.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::status::{FailureKind, JobResult};

    #[test]
    fn test_send_without_receivers_is_fine() {
        let broadcaster = JobProgressBroadcaster::new(4);
        broadcaster.send(JobProgressEvent::new("job", JobPhase::Validating, "x"));
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobProgressEvent::new(
            "job-1",
            JobPhase::Transcribing,
            "transcribing audio",
        ));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.phase, JobPhase::Transcribing);
        assert_eq!(received.status, JobStatus::Running);
    }

    #[test]
    fn test_from_update_carries_payload_summary() {
        let update = JobUpdate::succeeded(JobPhase::Done, "done", JobResult::default());
        let event = JobProgressEvent::from_update("job-2", &update);
        assert_eq!(event.status, JobStatus::Succeeded);
        assert_eq!(event.summary_count, Some(0));

        let update = JobUpdate::failed(JobError::new(FailureKind::Validation, "bad link"));
        let event = JobProgressEvent::from_update("job-3", &update);
        assert_eq!(event.phase, JobPhase::Error);
        assert_eq!(event.error.unwrap().kind, FailureKind::Validation);
    }

    #[test]
    fn test_lagging_receiver_does_not_block_sender() {
        let broadcaster = JobProgressBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.send(JobProgressEvent::new(&format!("job-{}", i), JobPhase::Saving, ""));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }
}
