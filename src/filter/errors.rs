//! Error types for job specification interpretation

/// Problems found while turning a job specification into a [`FilterSpec`](super::FilterSpec)
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// A mapping, exclusion or canonicalization regex does not compile
    #[error("Regular expression '{pattern}' is illegal: {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rescan interval or timeout is not an integer
    #[error("Bad number: '{0}'")]
    BadNumber(String),

    /// A mapping expression uses a group style other than u, l or m
    #[error("Unknown style: {0}")]
    UnknownStyle(String),

    /// A mapping expression refers to a group its regex does not have
    #[error("Mapping expression refers to missing group {0}")]
    MissingGroup(usize),

    /// The specification JSON could not be read
    #[error("Invalid specification: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FilterResult<T> = Result<T, FilterError>;
