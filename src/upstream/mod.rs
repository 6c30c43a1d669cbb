//! Resilient upstream fetching.
//!
//! [`ResilientFetcher`] performs one logical "fetch resource by URL"
//! operation: up to `max_retries + 1` attempts, each bounded by a per-attempt
//! timeout, with exponential backoff between retries. Retry happens only for
//! retryable failures (5xx, timeout, transport); a 4xx terminates
//! immediately. The fetcher never touches any cache tier.
//!
//! The actual network call sits behind the [`Origin`] trait so the retry
//! policy can be exercised against a scripted mock.

pub mod error;

#[cfg(test)]
mod tests;

pub use error::{AttemptError, FetchError};

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Body of a successfully fetched upstream response, classified by declared
/// content type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    /// `application/json` responses, parsed.
    Structured(serde_json::Value),
    /// Everything else, kept as the raw body text.
    Raw(String),
}

impl Payload {
    /// Renders the payload as a JSON value for the HTTP response body.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Payload::Structured(value) => value,
            Payload::Raw(text) => serde_json::Value::String(text),
        }
    }

    #[inline]
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Structured(_))
    }
}

/// A successful upstream fetch: the classified body plus the upstream status.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSuccess {
    pub payload: Payload,
    pub status: u16,
}

/// Outcome of a resilient fetch, as fanned out to coalesced waiters.
pub type FetchOutcome = Result<FetchSuccess, FetchError>;

/// A single upstream attempt with no timeout or retry policy attached.
pub trait Origin: Send + Sync {
    fn fetch_once(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<FetchSuccess, AttemptError>> + Send;
}

/// Production origin backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Origin for HttpOrigin {
    async fn fetch_once(&self, url: &str) -> Result<FetchSuccess, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(AttemptError::Status(status.as_u16()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let status = status.as_u16();

        if is_json {
            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| AttemptError::Transport(e.to_string()))?;
            Ok(FetchSuccess {
                payload: Payload::Structured(value),
                status,
            })
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| AttemptError::Transport(e.to_string()))?;
            Ok(FetchSuccess {
                payload: Payload::Raw(text),
                status,
            })
        }
    }
}

fn classify_transport_error(err: reqwest::Error) -> AttemptError {
    if err.is_timeout() {
        AttemptError::TimedOut
    } else {
        AttemptError::Transport(err.to_string())
    }
}

/// Fetch with per-attempt timeout and exponential-backoff retry.
#[derive(Debug, Clone)]
pub struct ResilientFetcher<O: Origin> {
    origin: O,
    attempt_timeout: Duration,
    max_retries: u32,
    backoff_base: Duration,
}

impl<O: Origin> ResilientFetcher<O> {
    pub fn new(
        origin: O,
        attempt_timeout: Duration,
        max_retries: u32,
        backoff_base: Duration,
    ) -> Self {
        Self {
            origin,
            attempt_timeout,
            max_retries,
            backoff_base,
        }
    }

    /// Fetches `url`, retrying retryable failures up to `max_retries` times.
    ///
    /// Between attempt `i` and `i + 1` the task sleeps `backoff_base * 2^i`;
    /// the sleep is cancellable with the surrounding task. On exhaustion the
    /// last observed failure is returned, tagged with the attempt count.
    #[instrument(skip(self, url), fields(url = url))]
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let total_attempts = self.max_retries + 1;
        let mut last_failure: Option<AttemptError> = None;

        for attempt in 0..total_attempts {
            if attempt > 0 {
                let delay = self.backoff_base * 2u32.pow(attempt - 1);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.attempt_timeout, self.origin.fetch_once(url)).await {
                Ok(Ok(success)) => {
                    debug!(attempt, status = success.status, "upstream fetch succeeded");
                    return Ok(success);
                }
                Ok(Err(err)) if !err.is_retryable() => {
                    warn!(attempt, error = %err, "non-retryable upstream failure");
                    return Err(err.into_fetch_error(attempt + 1));
                }
                Ok(Err(err)) => {
                    warn!(attempt, error = %err, "retryable upstream failure");
                    last_failure = Some(err);
                }
                Err(_elapsed) => {
                    warn!(
                        attempt,
                        timeout_ms = self.attempt_timeout.as_millis() as u64,
                        "attempt timed out"
                    );
                    last_failure = Some(AttemptError::TimedOut);
                }
            }
        }

        // total_attempts >= 1, so a failure was recorded on every path here.
        let err = last_failure.unwrap_or(AttemptError::TimedOut);
        Err(err.into_fetch_error(total_attempts))
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[inline]
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }
}

/// Scripted origin for tests: replays queued attempt outcomes and counts
/// invocations.
#[cfg(any(test, feature = "mock"))]
#[derive(Clone, Default)]
pub struct MockOrigin {
    script: std::sync::Arc<parking_lot::Mutex<std::collections::VecDeque<MockAttempt>>>,
    calls: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

/// One scripted attempt outcome for [`MockOrigin`].
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone)]
pub enum MockAttempt {
    Success(FetchSuccess),
    Status(u16),
    Transport(String),
    /// Never completes; relies on the fetcher's attempt timeout.
    Hang,
    /// Completes after the given delay with the inner outcome.
    Delayed(Duration, Box<MockAttempt>),
}

#[cfg(any(test, feature = "mock"))]
impl MockOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, attempt: MockAttempt) {
        self.script.lock().push_back(attempt);
    }

    pub fn push_status(&self, status: u16) {
        self.push(MockAttempt::Status(status));
    }

    pub fn push_transport_failure(&self, reason: &str) {
        self.push(MockAttempt::Transport(reason.to_string()));
    }

    pub fn push_success_json(&self, value: serde_json::Value, status: u16) {
        self.push(MockAttempt::Success(FetchSuccess {
            payload: Payload::Structured(value),
            status,
        }));
    }

    pub fn push_success_text(&self, body: &str, status: u16) {
        self.push(MockAttempt::Success(FetchSuccess {
            payload: Payload::Raw(body.to_string()),
            status,
        }));
    }

    /// Number of attempts made against this origin so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    async fn resolve(attempt: MockAttempt) -> Result<FetchSuccess, AttemptError> {
        match attempt {
            MockAttempt::Success(success) => Ok(success),
            MockAttempt::Status(status) => Err(AttemptError::Status(status)),
            MockAttempt::Transport(reason) => Err(AttemptError::Transport(reason)),
            MockAttempt::Hang => std::future::pending().await,
            MockAttempt::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                Box::pin(Self::resolve(*inner)).await
            }
        }
    }
}

#[cfg(any(test, feature = "mock"))]
impl Origin for MockOrigin {
    async fn fetch_once(&self, _url: &str) -> Result<FetchSuccess, AttemptError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let next = self.script.lock().pop_front();
        match next {
            Some(attempt) => Self::resolve(attempt).await,
            // An exhausted script answers 200 so over-scripting is visible
            // through the call counter rather than spurious failures.
            None => Ok(FetchSuccess {
                payload: Payload::Raw("mock".to_string()),
                status: 200,
            }),
        }
    }
}
