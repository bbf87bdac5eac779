//! Retrying Request Executor.
//!
//! Only rate-limited outcomes are retried. Every other outcome, and the last
//! attempt's outcome, is final for the call.

use std::sync::Arc;
use std::time::Duration;

use roster_core::{classify, ApiReply, RequestError, RequestOutcome, RetryPolicy};
use roster_logging::{roster_debug, roster_warn};

use crate::{ApiRequest, Transport};

/// Suspends the calling task during backoff.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_sleeper(transport, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { transport, sleeper }
    }

    /// Wait `duration` on the executor's sleeper. Used to space out sweeps.
    pub async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            self.sleeper.sleep(duration).await;
        }
    }

    /// Issue `request`, retrying rate limits, and return the final outcome.
    ///
    /// Returns the outcome together with the number of attempts made.
    /// Transport failures are raised immediately.
    pub async fn execute_outcome(
        &self,
        request: &ApiRequest,
        context: &str,
        policy: &RetryPolicy,
    ) -> Result<(RequestOutcome, u32), RequestError> {
        let max_attempts = policy.attempts();
        let mut attempt = 0;
        loop {
            let response = self
                .transport
                .send(request)
                .await
                .map_err(|err| err.into_request_error(context, &request.url))?;
            attempt += 1;

            let outcome = classify(response);
            if !outcome.is_rate_limited() || attempt >= max_attempts {
                roster_debug!(
                    "{}: {} {} finished after {} attempt(s)",
                    context,
                    request.method,
                    request.url,
                    attempt
                );
                return Ok((outcome, attempt));
            }

            let delay = policy.delay(attempt - 1);
            roster_warn!(
                "{}: rate limited on {} (attempt {}/{}), retrying in {:?}",
                context,
                request.url,
                attempt,
                max_attempts,
                delay
            );
            self.sleeper.sleep(delay).await;
        }
    }

    /// Issue `request` and split the outcome into data and errors.
    ///
    /// `Ok` and `SoftFailure` are returned as values. Every other outcome is
    /// raised as a [`RequestError`] prefixed with `context`.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        context: &str,
        policy: &RetryPolicy,
    ) -> Result<ApiReply, RequestError> {
        let (outcome, attempts) = self.execute_outcome(request, context, policy).await?;
        outcome.into_reply(context, attempts)
    }
}
