//! Per-kind status checks used by the poller.
//!
//! Kinds with a dedicated endpoint ask the server. Fire-and-forget kinds,
//! whose results arrive by email, synthesize progress from elapsed time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use roster_core::{
    ApiReply, FailureKind, JobDescriptor, JobKind, JobResolution, JobStatusReport, RequestError,
    RetryPolicy, StatusUpdate,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ApiRequest, RequestExecutor};

#[async_trait::async_trait]
pub trait StatusChecker: Send + Sync {
    async fn check(&self, job: &JobDescriptor, now: Instant) -> Result<StatusUpdate, RequestError>;
}

/// Polls `{base_url}{path_template}` with `{job_id}` substituted.
pub struct EndpointStatusChecker {
    executor: RequestExecutor,
    base_url: Url,
    path_template: String,
    policy: RetryPolicy,
}

impl EndpointStatusChecker {
    pub fn new(
        executor: RequestExecutor,
        base_url: Url,
        path_template: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            base_url,
            path_template: path_template.into(),
            policy,
        }
    }

    fn status_url(&self, job_id: &str) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&self.path_template.replace("{job_id}", &encode_segment(job_id)))
    }
}

/// Percent-encode `raw` for use as a single path segment.
fn encode_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[async_trait::async_trait]
impl StatusChecker for EndpointStatusChecker {
    async fn check(&self, job: &JobDescriptor, _now: Instant) -> Result<StatusUpdate, RequestError> {
        let context = format!("Checking {} job {}", job.kind, job.job_id);
        let url = self.status_url(&job.job_id).map_err(|err| {
            RequestError::new(
                &context,
                FailureKind::InvalidUrl,
                &self.path_template,
                err.to_string(),
            )
        })?;
        let request = ApiRequest::get(url.as_str());

        let payload = match self.executor.execute(&request, &context, &self.policy).await? {
            ApiReply::Ok(payload) => payload,
            ApiReply::SoftFailure {
                http_status,
                payload,
            } => {
                return Err(RequestError::new(
                    &context,
                    FailureKind::HttpStatus(http_status),
                    url.as_str(),
                    payload.to_string(),
                ))
            }
        };

        let report: JobStatusReport = serde_json::from_value(payload).map_err(|err| {
            RequestError::new(
                &context,
                FailureKind::UnexpectedPayload,
                url.as_str(),
                err.to_string(),
            )
        })?;
        report.into_update().map_err(|rejected| {
            RequestError::new(
                &context,
                FailureKind::UnexpectedPayload,
                url.as_str(),
                rejected.0,
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElapsedStage {
    pub after_secs: u64,
    pub percent: u8,
    pub label: String,
}

/// Empirical thresholds for jobs with no status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElapsedSettings {
    /// Sorted by `after_secs`.
    pub stages: Vec<ElapsedStage>,
    pub assume_complete_after_secs: u64,
    pub completion_message: String,
}

impl Default for ElapsedSettings {
    fn default() -> Self {
        let stage = |after_secs, percent, label: &str| ElapsedStage {
            after_secs,
            percent,
            label: label.to_string(),
        };
        Self {
            stages: vec![
                stage(0, 5, "Validating records"),
                stage(10, 25, "Creating accounts"),
                stage(30, 50, "Linking staff connections"),
                stage(60, 75, "Sending welcome emails"),
                stage(90, 90, "Finalising"),
            ],
            assume_complete_after_secs: 120,
            completion_message: "Processing complete, a report will follow by email".to_string(),
        }
    }
}

pub struct ElapsedStatusChecker {
    settings: ElapsedSettings,
}

impl ElapsedStatusChecker {
    pub fn new(settings: ElapsedSettings) -> Self {
        Self { settings }
    }

    fn assume_complete_after(&self) -> Duration {
        Duration::from_secs(self.settings.assume_complete_after_secs)
    }
}

#[async_trait::async_trait]
impl StatusChecker for ElapsedStatusChecker {
    async fn check(&self, job: &JobDescriptor, now: Instant) -> Result<StatusUpdate, RequestError> {
        let elapsed = job.elapsed(now);
        if elapsed >= self.assume_complete_after() {
            return Ok(StatusUpdate::progress(
                job.total,
                None,
                self.settings.completion_message.clone(),
            )
            .resolved(JobResolution::Completed(None)));
        }

        let stage = self
            .settings
            .stages
            .iter()
            .filter(|stage| elapsed.as_secs() >= stage.after_secs)
            .last();
        Ok(match stage {
            Some(stage) => StatusUpdate::progress(
                job.total.saturating_mul(u64::from(stage.percent.min(100))) / 100,
                None,
                stage.label.clone(),
            ),
            None => StatusUpdate::progress(0, None, ""),
        })
    }
}

/// Strategy table selecting a checker by job kind.
#[derive(Clone)]
pub struct StatusCheckers {
    by_kind: BTreeMap<JobKind, Arc<dyn StatusChecker>>,
    fallback: Arc<dyn StatusChecker>,
}

impl StatusCheckers {
    /// Every kind uses `fallback` until overridden.
    pub fn new(fallback: Arc<dyn StatusChecker>) -> Self {
        Self {
            by_kind: BTreeMap::new(),
            fallback,
        }
    }

    /// Endpoint checkers for kinds listed in `endpoints`, elapsed-time for the rest.
    pub fn from_endpoints(
        executor: &RequestExecutor,
        base_url: &Url,
        endpoints: &BTreeMap<JobKind, String>,
        policy: RetryPolicy,
        elapsed: ElapsedSettings,
    ) -> Self {
        let mut checkers = Self::new(Arc::new(ElapsedStatusChecker::new(elapsed)));
        for (kind, template) in endpoints {
            checkers = checkers.with_checker(
                *kind,
                Arc::new(EndpointStatusChecker::new(
                    executor.clone(),
                    base_url.clone(),
                    template.clone(),
                    policy,
                )),
            );
        }
        checkers
    }

    pub fn with_checker(mut self, kind: JobKind, checker: Arc<dyn StatusChecker>) -> Self {
        self.by_kind.insert(kind, checker);
        self
    }

    pub fn for_kind(&self, kind: JobKind) -> Arc<dyn StatusChecker> {
        self.by_kind
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
