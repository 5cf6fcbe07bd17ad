//! Error types for throttled fetches
//!
//! Permanent outcomes (page and site errors) are not errors here: they are
//! reported as a [`FetchStatus`](super::FetchStatus). Only transient
//! failures, interruption and misuse surface as [`FetchError`].

/// Failure of a fetch operation
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Transient failure; retry no earlier than `retry_at_ms` and give up
    /// after `fail_at_ms` (epoch milliseconds)
    #[error("Service interruption: {message}")]
    ServiceInterruption {
        message: String,
        retry_at_ms: i64,
        fail_at_ms: Option<i64>,
    },

    /// The fetch was cancelled or the job stopped
    #[error("Fetch interrupted")]
    Interrupted,

    /// Local I/O failure while spooling data
    #[error("I/O error: {0}")]
    Io(String),

    /// Failure of the HTTP transport that could not be classified, or an
    /// operation attempted in the wrong connection state
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Build a service interruption relative to `now_ms`
    #[must_use]
    pub fn interruption(
        message: impl Into<String>,
        now_ms: i64,
        retry_after_ms: i64,
        fail_after_ms: Option<i64>,
    ) -> Self {
        Self::ServiceInterruption {
            message: message.into(),
            retry_at_ms: now_ms + retry_after_ms,
            fail_at_ms: fail_after_ms.map(|after| now_ms + after),
        }
    }

    /// Whether this failure should be retried later by the scheduler
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceInterruption { .. })
    }

    #[must_use]
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Earliest retry time, for transient failures
    #[must_use]
    pub fn retry_at_ms(&self) -> Option<i64> {
        match self {
            Self::ServiceInterruption { retry_at_ms, .. } => Some(*retry_at_ms),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
