//! Feed parsing failures
//!
//! Malformed XML is not an error: the parse simply stops early. Only local
//! I/O and a refusing activities collaborator abort a parse.

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Spooling a content field to disk failed
    #[error("I/O error spooling feed content: {0}")]
    Io(#[from] std::io::Error),

    /// The framework refused a discovered link
    #[error("Could not queue document reference: {0}")]
    Reference(anyhow::Error),
}

pub type FeedResult<T> = Result<T, FeedError>;
