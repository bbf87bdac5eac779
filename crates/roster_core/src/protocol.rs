//! Wire shapes of the account API that the console depends on.

use serde::Deserialize;
use serde_json::Value;

use crate::job::{JobResolution, JobSummary, StatusUpdate};

/// Read the job identifier from a submission response.
///
/// `jobId` is preferred, then `jobID`, then `id`. Numbers are accepted and
/// rendered as strings; empty strings count as absent.
pub fn extract_job_id(payload: &Value) -> Option<String> {
    ["jobId", "jobID", "id"]
        .iter()
        .find_map(|key| match payload.get(*key)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ReportedProgress {
    pub current: u64,
    pub total: u64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportedResult {
    pub successful: u64,
    pub failed: u64,
    pub processing_errors: Vec<Value>,
}

/// Response of a dedicated job status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobStatusReport {
    pub success: bool,
    pub found: bool,
    pub completed: bool,
    pub failed: bool,
    pub progress: Option<ReportedProgress>,
    pub result: Option<ReportedResult>,
    pub failed_reason: Option<String>,
    pub message: Option<String>,
}

impl Default for JobStatusReport {
    fn default() -> Self {
        Self {
            success: true,
            found: true,
            completed: false,
            failed: false,
            progress: None,
            result: None,
            failed_reason: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status report rejected by server: {0}")]
pub struct ReportRejected(pub String);

impl JobStatusReport {
    /// Map the report onto a registry update.
    ///
    /// A report with `success: false` is an error so the poller retries it on
    /// the next tick rather than failing the job.
    pub fn into_update(self) -> Result<StatusUpdate, ReportRejected> {
        if !self.success {
            return Err(ReportRejected(
                self.message
                    .unwrap_or_else(|| "status request unsuccessful".to_string()),
            ));
        }

        let progress = self.progress.unwrap_or_default();
        let total = (progress.total > 0).then_some(progress.total);
        let status = progress.status.unwrap_or_default();
        let update = StatusUpdate::progress(progress.current, total, status);

        if !self.found {
            return Ok(update.resolved(JobResolution::Failed {
                reason: "job not found on server".to_string(),
            }));
        }
        if self.failed {
            let reason = self
                .failed_reason
                .unwrap_or_else(|| "job failed".to_string());
            return Ok(update.resolved(JobResolution::Failed { reason }));
        }
        if self.completed {
            let result = self.result.unwrap_or_default();
            let summary = JobSummary {
                successful: result.successful,
                failed: result.failed,
                processing_errors: result
                    .processing_errors
                    .iter()
                    .map(describe_value)
                    .collect(),
            };
            return Ok(update.resolved(JobResolution::Completed(Some(summary))));
        }
        Ok(update)
    }
}

/// One itemized problem from a soft-failure payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub row: Option<u64>,
    pub field: Option<String>,
    pub message: String,
}

/// Itemize a soft-failure payload for per-row display.
///
/// Reads `errors`, then `validationErrors`. Entries may be objects with
/// `row`/`field`/`message` or bare strings. Without either array, the
/// top-level `message` becomes a single issue.
pub fn validation_issues(payload: &Value) -> Vec<ValidationIssue> {
    let entries = ["errors", "validationErrors"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_array));

    if let Some(entries) = entries {
        return entries.iter().map(issue_from_entry).collect();
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .map(|message| ValidationIssue {
            row: None,
            field: None,
            message: message.to_string(),
        })
        .into_iter()
        .collect()
}

fn issue_from_entry(entry: &Value) -> ValidationIssue {
    match entry {
        Value::Object(map) => ValidationIssue {
            row: map.get("row").and_then(|row| match row {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            field: map.get("field").and_then(Value::as_str).map(str::to_string),
            message: map
                .get("message")
                .or_else(|| map.get("error"))
                .map(describe_value)
                .unwrap_or_else(|| entry.to_string()),
        },
        other => ValidationIssue {
            row: None,
            field: None,
            message: describe_value(other),
        },
    }
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
