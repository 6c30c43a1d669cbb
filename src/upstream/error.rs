//! Fetch error types and retry classification.

use thiserror::Error;

/// Terminal outcome of a resilient fetch, after all retries are spent.
///
/// Variants are `Clone` so one outcome can fan out to every coalesced waiter.
/// `attempts` always carries the total number of attempts performed, letting
/// the gateway distinguish "exhausted retries on timeout" from "exhausted
/// retries on a server error".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Every attempt exceeded the per-attempt timeout.
    #[error("upstream request timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// The upstream answered with an error status: a 4xx terminates on the
    /// first attempt, a 5xx after retries are exhausted.
    #[error("upstream returned HTTP {status} after {attempts} attempt(s)")]
    UpstreamStatus { status: u16, attempts: u32 },

    /// Network-level failure with no meaningful status (connection refused,
    /// reset, DNS failure).
    #[error("upstream transport failure after {attempts} attempt(s): {reason}")]
    Transport { reason: String, attempts: u32 },
}

impl FetchError {
    /// True when the failure was timeout exhaustion (renders as 504).
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Total attempts performed before giving up.
    #[inline]
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Timeout { attempts }
            | FetchError::UpstreamStatus { attempts, .. }
            | FetchError::Transport { attempts, .. } => *attempts,
        }
    }
}

/// Failure of a single fetch attempt, before retry policy is applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    /// Upstream answered with a non-success status code.
    #[error("HTTP {0}")]
    Status(u16),

    /// The attempt exceeded its time budget.
    #[error("attempt timed out")]
    TimedOut,

    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl AttemptError {
    /// Retry is worthwhile for server errors, timeouts, and transport
    /// failures; a 4xx would fail identically on every attempt.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Status(status) => *status >= 500,
            AttemptError::TimedOut | AttemptError::Transport(_) => true,
        }
    }

    /// Converts the last attempt's failure into the terminal [`FetchError`].
    pub(crate) fn into_fetch_error(self, attempts: u32) -> FetchError {
        match self {
            AttemptError::Status(status) => FetchError::UpstreamStatus { status, attempts },
            AttemptError::TimedOut => FetchError::Timeout { attempts },
            AttemptError::Transport(reason) => FetchError::Transport { reason, attempts },
        }
    }
}
