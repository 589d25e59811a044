//! Job registry: job id to current [`JobView`].
//!
//! The trait is the seam for a durable backend; the in-memory map is the only
//! implementation shipped. Finished jobs are never evicted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::progress::{JobProgressBroadcaster, JobProgressEvent};
use super::status::{JobInput, JobUpdate, JobView};

pub trait JobRegistry: Send + Sync {
    /// Installs a fresh `pending` record. Returns false, leaving the existing
    /// record untouched, if the id is taken.
    fn create(&self, job_id: &str, input: JobInput) -> bool;

    /// Applies an update to an existing, unfinished job. Unknown ids and
    /// updates to finished jobs are ignored.
    fn update(&self, job_id: &str, update: JobUpdate);

    /// Snapshot copy of the job.
    fn get(&self, job_id: &str) -> Option<JobView>;
}

/// Registry guarded by a single mutex.
pub struct InMemoryJobRegistry {
    jobs: Mutex<HashMap<String, JobView>>,
    broadcaster: Option<JobProgressBroadcaster>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            broadcaster: None,
        }
    }

    /// Registry that publishes every accepted mutation.
    pub fn with_broadcaster(broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            broadcaster: Some(broadcaster),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all jobs, newest first.
    pub fn list(&self) -> Vec<JobView> {
        let mut jobs: Vec<JobView> = self.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobView>> {
        self.jobs.lock().unwrap_or_else(|poisoned| {
            log::warn!("Job registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn publish(&self, event: JobProgressEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.send(event);
        }
    }
}

impl Default for InMemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, job_id: &str, input: JobInput) -> bool {
        let view = {
            let mut jobs = self.lock();
            if jobs.contains_key(job_id) {
                log::warn!("Job {} already exists, ignoring create", job_id);
                return false;
            }
            let view = JobView::new(job_id, input);
            jobs.insert(job_id.to_string(), view.clone());
            view
        };
        self.publish(JobProgressEvent::new(job_id, view.phase, &view.message));
        true
    }

    fn update(&self, job_id: &str, update: JobUpdate) {
        let event = JobProgressEvent::from_update(job_id, &update);
        {
            let mut jobs = self.lock();
            let Some(job) = jobs.get_mut(job_id) else {
                log::debug!("Update for unknown job {} ignored", job_id);
                return;
            };
            if job.is_finished() {
                log::warn!(
                    "Job {} already finished as {}, ignoring transition to {}",
                    job_id,
                    job.phase,
                    update.phase
                );
                return;
            }
            job.apply(update);
        }
        self.publish(event);
    }

    fn get(&self, job_id: &str) -> Option<JobView> {
        self.lock().get(job_id).cloned()
    }
}
