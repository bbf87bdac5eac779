//! Job Poller: one shared, cancellable loop advancing every tracked job.
//!
//! The loop starts on the first submission and stops itself once the
//! registry is empty. Each tick checks jobs one after another and finishes
//! before the next tick is scheduled, so a descriptor is never advanced by
//! two ticks at once.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use roster_core::{
    JobDescriptor, JobEvent, JobId, JobKind, JobRegistry, JobSnapshot, RegistryError,
};
use roster_logging::{roster_debug, roster_info, roster_warn};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::StatusCheckers;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    pub interval_ms: u64,
    pub completion_grace_ms: u64,
    /// Status path template per kind, with a `{job_id}` placeholder.
    pub status_endpoints: BTreeMap<JobKind, String>,
}

/// Shortest poll interval; `tokio::time::interval` rejects a zero period.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl PollerSettings {
    /// Configured interval, never below [`MIN_POLL_INTERVAL`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms).max(MIN_POLL_INTERVAL)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        let status_endpoints = JobKind::ALL
            .into_iter()
            .filter(|kind| *kind != JobKind::CsvUpload)
            .map(|kind| (kind, format!("/api/{kind}/status/{{job_id}}")))
            .collect();
        Self {
            // Keeps unattended polling well inside the API's rate budget.
            interval_ms: 5_000,
            completion_grace_ms: 5_000,
            status_endpoints,
        }
    }
}

pub trait JobEventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<JobEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<JobEvent>) -> Self {
        Self { tx }
    }
}

impl JobEventSink for ChannelEventSink {
    fn emit(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

/// Cancel handle for a running poll loop.
#[derive(Debug, Clone)]
pub struct PollHandle {
    id: u64,
    token: CancellationToken,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Clone)]
pub struct JobPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    // Lock order: `loop_handle` before `registry`.
    loop_handle: Mutex<Option<PollHandle>>,
    registry: Mutex<JobRegistry>,
    tick_gate: tokio::sync::Mutex<()>,
    next_loop_id: AtomicU64,
    checkers: StatusCheckers,
    sink: Arc<dyn JobEventSink>,
    interval: Duration,
    grace: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobPoller {
    pub fn new(
        checkers: StatusCheckers,
        settings: &PollerSettings,
        sink: Arc<dyn JobEventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                loop_handle: Mutex::new(None),
                registry: Mutex::new(JobRegistry::new()),
                tick_gate: tokio::sync::Mutex::new(()),
                next_loop_id: AtomicU64::new(1),
                checkers,
                sink,
                interval: settings.interval(),
                grace: settings.completion_grace(),
            }),
        }
    }

    /// Track a job the server accepted and make sure the loop is running.
    ///
    /// Outside a tokio runtime the job is registered but no loop starts;
    /// callers then drive [`JobPoller::tick`] themselves.
    pub fn submit(
        &self,
        kind: JobKind,
        job_id: impl Into<JobId>,
        total: u64,
        description: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let mut handle = lock(&self.inner.loop_handle);
        let event = lock(&self.inner.registry).submit(
            kind,
            job_id,
            total,
            description,
            Instant::now(),
        )?;
        self.ensure_loop(&mut handle);
        drop(handle);
        self.inner.sink.emit(event);
        Ok(())
    }

    /// Re-register persisted jobs. Terminal snapshots are skipped.
    pub fn restore(&self, snapshots: Vec<JobSnapshot>) -> usize {
        let now = Instant::now();
        let mut handle = lock(&self.inner.loop_handle);
        let mut events = Vec::new();
        {
            let mut registry = lock(&self.inner.registry);
            for snapshot in snapshots {
                if snapshot.state.is_terminal() {
                    continue;
                }
                match registry.restore(snapshot, now) {
                    Ok(event) => events.push(event),
                    Err(err) => roster_warn!("Skipping restored job: {}", err),
                }
            }
        }
        if !events.is_empty() {
            self.ensure_loop(&mut handle);
        }
        drop(handle);
        let restored = events.len();
        for event in events {
            self.inner.sink.emit(event);
        }
        restored
    }

    /// Start the loop if there is work and none is running.
    pub fn start_polling(&self) -> Option<PollHandle> {
        let mut handle = lock(&self.inner.loop_handle);
        if lock(&self.inner.registry).is_empty() {
            return None;
        }
        self.ensure_loop(&mut handle);
        handle.clone()
    }

    pub fn stop_polling(&self) {
        if let Some(handle) = lock(&self.inner.loop_handle).take() {
            handle.cancel();
        }
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.inner.loop_handle)
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled())
    }

    /// Remove a job on request of the UI.
    ///
    /// A status check already in flight for it is ignored when it resolves.
    pub fn dismiss(&self, job_id: &str) -> Option<JobDescriptor> {
        let mut handle = lock(&self.inner.loop_handle);
        let (removed, now_empty) = {
            let mut registry = lock(&self.inner.registry);
            let removed = registry.remove(job_id);
            (removed, registry.is_empty())
        };
        if now_empty {
            if let Some(handle) = handle.take() {
                handle.cancel();
            }
        }
        drop(handle);
        if removed.is_some() {
            self.inner.sink.emit(JobEvent::Dismissed {
                job_id: job_id.to_string(),
            });
        }
        removed
    }

    pub fn jobs(&self) -> Vec<JobDescriptor> {
        lock(&self.inner.registry).jobs().to_vec()
    }

    pub fn job(&self, job_id: &str) -> Option<JobDescriptor> {
        lock(&self.inner.registry).get(job_id).cloned()
    }

    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        lock(&self.inner.registry).snapshot(Instant::now())
    }

    /// Run one poll tick as of `now`. Returns the number of jobs still tracked.
    pub async fn tick(&self, now: Instant) -> usize {
        self.inner.tick(now).await
    }

    fn ensure_loop(&self, handle: &mut Option<PollHandle>) {
        if handle.as_ref().is_some_and(|h| !h.is_cancelled()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            roster_warn!("No async runtime available; job polling must be ticked manually");
            return;
        };
        let new_handle = PollHandle {
            id: self.inner.next_loop_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        roster_debug!("Starting poll loop {}", new_handle.id);
        runtime.spawn(run_loop(self.inner.clone(), new_handle.clone()));
        *handle = Some(new_handle);
    }
}

async fn run_loop(inner: Arc<PollerInner>, handle: PollHandle) {
    let mut interval = tokio::time::interval(inner.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first check waits one interval.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = handle.token.cancelled() => break,
            _ = interval.tick() => {}
        }
        inner.tick(Instant::now()).await;
        if inner.stop_if_idle(&handle) {
            break;
        }
    }
    roster_debug!("Poll loop {} stopped", handle.id);
}

impl PollerInner {
    async fn tick(&self, now: Instant) -> usize {
        let _gate = self.tick_gate.lock().await;

        let due = lock(&self.registry).due_for_check();
        for job in due {
            let checker = self.checkers.for_kind(job.kind);
            match checker.check(&job, now).await {
                Ok(update) => {
                    let event = lock(&self.registry).apply(&job.job_id, update, now);
                    if let Some(event) = event {
                        self.sink.emit(event);
                    }
                }
                Err(err) => {
                    roster_warn!(
                        "Status check for job {} failed, retrying next tick: {}",
                        job.job_id,
                        err
                    );
                }
            }
        }

        let (expired, remaining) = {
            let mut registry = lock(&self.registry);
            let expired = registry.sweep_expired(now, self.grace);
            (expired, registry.len())
        };
        for event in expired {
            self.sink.emit(event);
        }
        remaining
    }

    fn stop_if_idle(&self, own: &PollHandle) -> bool {
        let mut handle = lock(&self.loop_handle);
        if own.is_cancelled() {
            return true;
        }
        if !lock(&self.registry).is_empty() {
            return false;
        }
        if handle.as_ref().is_some_and(|current| current.id == own.id) {
            *handle = None;
        }
        own.cancel();
        roster_info!("No jobs left to track; polling stopped");
        true
    }
}
