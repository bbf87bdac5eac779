//! Roster core: pure response classification, CSV parsing and job bookkeeping.
pub mod csv;
mod error;
mod job;
mod outcome;
mod protocol;
mod registry;
mod retry;

pub use csv::{CsvRow, CsvTable};
pub use error::{CsvError, FailureKind, RequestError};
pub use job::{
    JobDescriptor, JobEvent, JobId, JobKind, JobResolution, JobSnapshot, JobState, JobSummary,
    StatusUpdate, UnknownJobKind,
};
pub use outcome::{classify, snippet, ApiReply, RawResponse, RequestOutcome, SNIPPET_LIMIT};
pub use protocol::{
    extract_job_id, validation_issues, JobStatusReport, ReportRejected, ReportedProgress,
    ReportedResult, ValidationIssue,
};
pub use registry::{JobRegistry, RegistryError};
pub use retry::RetryPolicy;
