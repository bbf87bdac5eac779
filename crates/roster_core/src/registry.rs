//! Job Registry: the single owner of in-flight job descriptors.
//!
//! The registry is plain state. It never schedules anything; the poller in
//! `roster_engine` drives it with status updates and sweeps.

use std::time::{Duration, Instant};

use roster_logging::{roster_debug, roster_info};

use crate::job::{
    JobDescriptor, JobEvent, JobId, JobKind, JobResolution, JobSnapshot, JobState, StatusUpdate,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("job {0} is already tracked")]
    DuplicateJob(JobId),
}

/// Ordered collection of tracked jobs, in submission order.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Vec<JobDescriptor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        kind: JobKind,
        job_id: impl Into<JobId>,
        total: u64,
        description: impl Into<String>,
        now: Instant,
    ) -> Result<JobEvent, RegistryError> {
        let descriptor = JobDescriptor::new(kind, job_id, total, description, now);
        self.insert(descriptor)
    }

    fn insert(&mut self, descriptor: JobDescriptor) -> Result<JobEvent, RegistryError> {
        if self.get(&descriptor.job_id).is_some() {
            return Err(RegistryError::DuplicateJob(descriptor.job_id));
        }
        roster_info!(
            "Tracking {} job {} (total {})",
            descriptor.kind,
            descriptor.job_id,
            descriptor.total
        );
        let event = JobEvent::Submitted {
            job_id: descriptor.job_id.clone(),
            kind: descriptor.kind,
        };
        self.jobs.push(descriptor);
        Ok(event)
    }

    pub fn get(&self, job_id: &str) -> Option<&JobDescriptor> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }

    /// Read-only view of every tracked job, terminal ones included.
    pub fn jobs(&self) -> &[JobDescriptor] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Copies of the jobs that still need a status check this tick.
    pub fn due_for_check(&self) -> Vec<JobDescriptor> {
        self.jobs
            .iter()
            .filter(|job| !job.terminal())
            .cloned()
            .collect()
    }

    /// Apply a status check result.
    ///
    /// Updates for unknown or already terminal jobs are ignored. `current`
    /// never decreases.
    pub fn apply(&mut self, job_id: &str, update: StatusUpdate, now: Instant) -> Option<JobEvent> {
        let Some(job) = self.jobs.iter_mut().find(|job| job.job_id == job_id) else {
            roster_debug!("Ignoring status for untracked job {}", job_id);
            return None;
        };
        if job.terminal() {
            return None;
        }

        let before = (job.current, job.total, job.status.clone(), job.state);
        job.current = job.current.max(update.current);
        if let Some(total) = update.total.filter(|total| *total > 0) {
            job.total = total;
        }
        if !update.status.is_empty() {
            job.status = update.status;
        }
        if job.state == JobState::Queued {
            job.state = JobState::Running;
        }

        match update.resolution {
            Some(JobResolution::Completed(summary)) => {
                job.state = JobState::Completed;
                job.finished_at = Some(now);
                job.summary = summary.clone();
                roster_info!("Job {} ({}) completed", job.job_id, job.kind);
                Some(JobEvent::Completed {
                    job_id: job.job_id.clone(),
                    kind: job.kind,
                    summary,
                })
            }
            Some(JobResolution::Failed { reason }) => {
                job.state = JobState::Failed;
                job.finished_at = Some(now);
                job.failure_reason = Some(reason.clone());
                roster_info!("Job {} ({}) failed: {}", job.job_id, job.kind, reason);
                Some(JobEvent::Failed {
                    job_id: job.job_id.clone(),
                    kind: job.kind,
                    reason,
                })
            }
            None => {
                let after = (job.current, job.total, job.status.clone(), job.state);
                (before != after).then(|| JobEvent::Progress {
                    job_id: job.job_id.clone(),
                    current: job.current,
                    total: job.total,
                    status: job.status.clone(),
                })
            }
        }
    }

    /// Remove terminal jobs whose grace period has elapsed.
    pub fn sweep_expired(&mut self, now: Instant, grace: Duration) -> Vec<JobEvent> {
        let mut events = Vec::new();
        self.jobs.retain(|job| {
            let expired = job
                .finished_at
                .is_some_and(|finished| now.saturating_duration_since(finished) >= grace);
            if expired {
                roster_debug!("Job {} expired from registry", job.job_id);
                events.push(JobEvent::Expired {
                    job_id: job.job_id.clone(),
                });
            }
            !expired
        });
        events
    }

    /// Remove a job regardless of state, e.g. when the user dismisses it.
    pub fn remove(&mut self, job_id: &str) -> Option<JobDescriptor> {
        let index = self.jobs.iter().position(|job| job.job_id == job_id)?;
        Some(self.jobs.remove(index))
    }

    pub fn snapshot(&self, now: Instant) -> Vec<JobSnapshot> {
        self.jobs
            .iter()
            .map(|job| JobSnapshot {
                job_id: job.job_id.clone(),
                kind: job.kind,
                description: job.description.clone(),
                total: job.total,
                current: job.current,
                status: job.status.clone(),
                state: job.state,
                elapsed_secs: job.elapsed(now).as_secs(),
            })
            .collect()
    }

    /// Re-register a persisted job, back-dating its start by the elapsed time.
    pub fn restore(&mut self, snapshot: JobSnapshot, now: Instant) -> Result<JobEvent, RegistryError> {
        let elapsed = Duration::from_secs(snapshot.elapsed_secs);
        let (started_at, carried_elapsed) = match now.checked_sub(elapsed) {
            Some(started_at) => (started_at, Duration::ZERO),
            None => {
                roster_debug!(
                    "Job {} is older than the monotonic clock; carrying {}s of elapsed time",
                    snapshot.job_id,
                    snapshot.elapsed_secs
                );
                (now, elapsed)
            }
        };
        let finished_at = snapshot.state.is_terminal().then_some(now);
        self.insert(JobDescriptor {
            job_id: snapshot.job_id,
            kind: snapshot.kind,
            description: snapshot.description,
            total: snapshot.total,
            current: snapshot.current,
            status: snapshot.status,
            state: snapshot.state,
            started_at,
            carried_elapsed,
            finished_at,
            summary: None,
            failure_reason: None,
        })
    }
}
