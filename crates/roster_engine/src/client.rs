use std::sync::Arc;

use roster_core::{
    extract_job_id, ApiReply, FailureKind, JobId, JobKind, RequestError, RetryPolicy,
};
use roster_logging::{roster_debug, roster_info, roster_warn};
use serde_json::Value;
use url::Url;

use crate::{
    ApiRequest, ConsoleConfig, JobEventSink, JobPoller, Method, ReqwestTransport,
    RequestExecutor, StatusCheckers, ThrottleSettings, Transport,
};

/// Result of submitting a background job.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Accepted and now tracked by the poller.
    Accepted(JobId),
    /// Rejected by validation; the payload describes why.
    Rejected { http_status: u16, payload: Value },
}

/// One item of a bulk mutation that did not go through.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationFailure {
    pub path: String,
    pub reason: String,
}

/// Tally of a sequential bulk mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationReport {
    pub succeeded: usize,
    pub failures: Vec<MutationFailure>,
}

impl MutationReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

/// Entry point for UI code: requests, job submission and job tracking.
#[derive(Clone)]
pub struct ConsoleClient {
    base_url: Url,
    executor: RequestExecutor,
    user_retry: RetryPolicy,
    throttle: ThrottleSettings,
    poller: JobPoller,
}

impl ConsoleClient {
    pub fn new(config: &ConsoleConfig, sink: Arc<dyn JobEventSink>) -> Result<Self, RequestError> {
        let transport = ReqwestTransport::new(config.api.transport())
            .map_err(|err| err.into_request_error("Starting console", &config.api.base_url))?;
        Self::with_transport(config, Arc::new(transport), sink)
    }

    pub fn with_transport(
        config: &ConsoleConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<Self, RequestError> {
        Self::with_executor(config, RequestExecutor::new(transport), sink)
    }

    pub fn with_executor(
        config: &ConsoleConfig,
        executor: RequestExecutor,
        sink: Arc<dyn JobEventSink>,
    ) -> Result<Self, RequestError> {
        let base_url = Url::parse(&config.api.base_url).map_err(|err| {
            RequestError::new(
                "Starting console",
                FailureKind::InvalidUrl,
                &config.api.base_url,
                err.to_string(),
            )
        })?;
        let checkers = StatusCheckers::from_endpoints(
            &executor,
            &base_url,
            &config.poller.status_endpoints,
            config.poll_retry,
            config.elapsed.clone(),
        );
        let poller = JobPoller::new(checkers, &config.poller, sink);
        Ok(Self {
            base_url,
            executor,
            user_retry: config.user_retry,
            throttle: config.throttle,
            poller,
        })
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    pub fn url_for(&self, path: &str, context: &str) -> Result<Url, RequestError> {
        self.base_url.join(path).map_err(|err| {
            RequestError::new(context, FailureKind::InvalidUrl, path, err.to_string())
        })
    }

    /// Issue a user-facing request with the user retry policy.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        context: &str,
    ) -> Result<ApiReply, RequestError> {
        let url = self.url_for(path, context)?;
        let request = ApiRequest::new(method, url.as_str(), body);
        self.executor
            .execute(&request, context, &self.user_retry)
            .await
    }

    /// Submit a background job and start tracking it.
    ///
    /// A soft failure is returned as [`Submission::Rejected`] and nothing is
    /// tracked. A success body without a job id is an `UnexpectedPayload`
    /// error.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_job(
        &self,
        kind: JobKind,
        method: Method,
        path: &str,
        body: Option<Value>,
        total: u64,
        description: &str,
        context: &str,
    ) -> Result<Submission, RequestError> {
        let url = self.url_for(path, context)?;
        let payload = match self.request(method, path, body, context).await? {
            ApiReply::Ok(payload) => payload,
            ApiReply::SoftFailure {
                http_status,
                payload,
            } => {
                roster_info!("{}: submission rejected with status {}", context, http_status);
                return Ok(Submission::Rejected {
                    http_status,
                    payload,
                });
            }
        };

        let job_id = extract_job_id(&payload).ok_or_else(|| {
            RequestError::new(
                context,
                FailureKind::UnexpectedPayload,
                url.as_str(),
                "response carried no job id",
            )
        })?;

        if let Err(err) = self.poller.submit(kind, job_id.clone(), total, description) {
            roster_warn!("{}: {}", context, err);
        }
        Ok(Submission::Accepted(job_id))
    }

    /// Fetch every page of a record listing.
    ///
    /// Pages are requested with `rows_per_page` and a 1-based `page` query
    /// parameter until a page comes back without records, or `max_pages`
    /// pages have been read. Consecutive pages are spaced by the configured
    /// page delay. A rejected page is raised as an `HttpStatus` error.
    pub async fn fetch_all_pages(
        &self,
        path: &str,
        rows_per_page: u32,
        max_pages: u32,
        context: &str,
    ) -> Result<Vec<Value>, RequestError> {
        let base = self.url_for(path, context)?;
        let max_pages = max_pages.max(1);
        let mut records = Vec::new();

        for page in 1..=max_pages {
            if page > 1 {
                self.executor.pause(self.throttle.page_delay()).await;
            }

            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("rows_per_page", &rows_per_page.to_string())
                .append_pair("page", &page.to_string());
            let request = ApiRequest::new(Method::Get, url.as_str(), None);

            let mut payload = match self
                .executor
                .execute(&request, context, &self.user_retry)
                .await?
            {
                ApiReply::Ok(payload) => payload,
                ApiReply::SoftFailure {
                    http_status,
                    payload,
                } => {
                    return Err(RequestError::new(
                        context,
                        FailureKind::HttpStatus(http_status),
                        url.as_str(),
                        format!("page {page} rejected: {payload}"),
                    ))
                }
            };

            let batch = match payload.get_mut("records").map(Value::take) {
                Some(Value::Array(batch)) if !batch.is_empty() => batch,
                _ => break,
            };
            roster_debug!("{}: page {} held {} record(s)", context, page, batch.len());
            records.extend(batch);

            if page == max_pages {
                roster_warn!(
                    "{}: stopped after {} page(s); later records were not fetched",
                    context,
                    page
                );
            }
        }

        roster_info!("{}: fetched {} record(s)", context, records.len());
        Ok(records)
    }

    /// Apply `method` to each `(path, body)` in turn, one request at a time.
    ///
    /// Failures are tallied and the sweep carries on with the next item.
    /// Consecutive requests are spaced by the configured mutation delay.
    pub async fn mutate_each<I>(
        &self,
        method: Method,
        items: I,
        context: &str,
    ) -> MutationReport
    where
        I: IntoIterator<Item = (String, Option<Value>)>,
    {
        let mut report = MutationReport::default();

        for (index, (path, body)) in items.into_iter().enumerate() {
            if index > 0 {
                self.executor.pause(self.throttle.mutation_delay()).await;
            }

            let reason = match self.request(method, &path, body, context).await {
                Ok(ApiReply::Ok(_)) => None,
                Ok(ApiReply::SoftFailure {
                    http_status,
                    payload,
                }) => Some(format!("rejected with status {http_status}: {payload}")),
                Err(err) => Some(err.to_string()),
            };

            match reason {
                None => report.succeeded += 1,
                Some(reason) => {
                    roster_warn!("{}: {} {} failed: {}", context, method, path, reason);
                    report.failures.push(MutationFailure { path, reason });
                }
            }
        }

        roster_info!(
            "{}: {} of {} succeeded",
            context,
            report.succeeded,
            report.attempted()
        );
        report
    }
}
