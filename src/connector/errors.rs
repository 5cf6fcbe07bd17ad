//! Error types for document processing
//!
//! Page- and site-level failures never reach the caller: the document is
//! deleted or skipped instead. What is left is a scheduled retry, a stopped
//! job, or something the framework itself must see.

use crate::feed::FeedError;
use crate::fetch::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The job specification or connection configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// The job was stopped while a document was being processed
    #[error("Processing interrupted")]
    Interrupted,

    /// Transient failure; the scheduler should retry the document
    #[error("Service interruption: {message}")]
    ServiceInterruption {
        message: String,
        retry_at_ms: i64,
        fail_at_ms: Option<i64>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feed could not be handed to the framework
    #[error("Feed processing failed: {0}")]
    Parse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
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

impl From<FetchError> for ConnectorError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::ServiceInterruption {
                message,
                retry_at_ms,
                fail_at_ms,
            } => Self::ServiceInterruption {
                message,
                retry_at_ms,
                fail_at_ms,
            },
            FetchError::Interrupted => Self::Interrupted,
            FetchError::Io(message) => Self::Io(std::io::Error::other(message)),
            FetchError::Transport(message) => Self::Other(anyhow::anyhow!(message)),
        }
    }
}

impl From<FeedError> for ConnectorError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::Io(error) => Self::Io(error),
            FeedError::Reference(error) => Self::Parse(error.to_string()),
        }
    }
}

impl From<crate::filter::FilterError> for ConnectorError {
    fn from(error: crate::filter::FilterError) -> Self {
        Self::Config(error.to_string())
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_interruption_keeps_its_retry_window() {
        let error: ConnectorError = FetchError::interruption("slow", 1_000, 300_000, Some(600_000)).into();
        assert!(error.is_transient());
        assert_eq!(error.retry_at_ms(), Some(301_000));
        match error {
            ConnectorError::ServiceInterruption { fail_at_ms, .. } => {
                assert_eq!(fail_at_ms, Some(601_000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancellation_maps_to_interrupted() {
        let error: ConnectorError = FetchError::Interrupted.into();
        assert!(error.is_interruption());
        assert_eq!(error.retry_at_ms(), None);
    }
}
