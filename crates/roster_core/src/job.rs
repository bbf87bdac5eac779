use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type JobId = String;

/// Server-side background operation types tracked by the console.
///
/// Serialized as its kebab-case name, e.g. `"csv-upload"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    CsvUpload,
    BulkDelete,
    ConnectionUpdate,
    RoleAssignment,
    Ks5Profile,
    Ks5Snapshot,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::CsvUpload,
        JobKind::BulkDelete,
        JobKind::ConnectionUpdate,
        JobKind::RoleAssignment,
        JobKind::Ks5Profile,
        JobKind::Ks5Snapshot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::CsvUpload => "csv-upload",
            JobKind::BulkDelete => "bulk-delete",
            JobKind::ConnectionUpdate => "connection-update",
            JobKind::RoleAssignment => "role-assignment",
            JobKind::Ks5Profile => "ks5-profile",
            JobKind::Ks5Snapshot => "ks5-snapshot",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job kind {0:?}")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownJobKind(s.to_string()))
    }
}

impl Serialize for JobKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Success/failure counts reported by a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSummary {
    pub successful: u64,
    pub failed: u64,
    pub processing_errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResolution {
    /// `None` when completion is assumed rather than reported.
    Completed(Option<JobSummary>),
    Failed { reason: String },
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub current: u64,
    pub total: Option<u64>,
    pub status: String,
    pub resolution: Option<JobResolution>,
}

impl StatusUpdate {
    pub fn progress(current: u64, total: Option<u64>, status: impl Into<String>) -> Self {
        Self {
            current,
            total,
            status: status.into(),
            resolution: None,
        }
    }

    pub fn resolved(mut self, resolution: JobResolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// In-memory record of one tracked background job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub kind: JobKind,
    pub description: String,
    pub total: u64,
    pub current: u64,
    pub status: String,
    pub state: JobState,
    pub started_at: Instant,
    /// Elapsed time from an earlier session that reaches back before the
    /// monotonic clock's origin and so cannot be folded into `started_at`.
    pub carried_elapsed: Duration,
    pub finished_at: Option<Instant>,
    pub summary: Option<JobSummary>,
    pub failure_reason: Option<String>,
}

impl JobDescriptor {
    pub fn new(
        kind: JobKind,
        job_id: impl Into<JobId>,
        total: u64,
        description: impl Into<String>,
        now: Instant,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            description: description.into(),
            total,
            current: 0,
            status: "Queued".to_string(),
            state: JobState::Queued,
            started_at: now,
            carried_elapsed: Duration::ZERO,
            finished_at: None,
            summary: None,
            failure_reason: None,
        }
    }

    pub fn terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Time since the job was submitted, across console sessions.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
            .saturating_add(self.carried_elapsed)
    }

    /// Percentage complete, clamped to 100. Zero when the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.current.saturating_mul(100) / self.total).min(100) as u8
    }
}

/// Lifecycle notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Submitted {
        job_id: JobId,
        kind: JobKind,
    },
    Progress {
        job_id: JobId,
        current: u64,
        total: u64,
        status: String,
    },
    Completed {
        job_id: JobId,
        kind: JobKind,
        summary: Option<JobSummary>,
    },
    Failed {
        job_id: JobId,
        kind: JobKind,
        reason: String,
    },
    /// Removed after its display grace period.
    Expired {
        job_id: JobId,
    },
    /// Removed on request of the UI.
    Dismissed {
        job_id: JobId,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Submitted { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Expired { job_id }
            | JobEvent::Dismissed { job_id } => job_id,
        }
    }
}

/// Serializable form of a descriptor for persistence across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub description: String,
    pub total: u64,
    pub current: u64,
    pub status: String,
    pub state: JobState,
    pub elapsed_secs: u64,
}
