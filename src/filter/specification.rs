//! Job specification document
//!
//! A flat list of typed nodes, stored by the crawl-job framework as JSON:
//!
//! ```json
//! { "nodes": [
//!     { "type": "feed", "url": "http://example.com/feed.xml" },
//!     { "type": "feedrescan", "value": "60" },
//!     { "type": "dechromedmode", "mode": "content" }
//! ] }
//! ```

use serde::{Deserialize, Serialize};

use super::errors::FilterResult;

/// Attribute value that turns a canonicalization flag on
pub const VALUE_YES: &str = "yes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpecificationNode {
    /// Seed feed
    Feed { url: String },
    /// URL mapping rule
    Map {
        #[serde(rename = "match")]
        pattern: String,
        #[serde(default)]
        map: Option<String>,
    },
    /// Newline-separated exclusion regexes
    Exclude { value: String },
    /// Canonicalization policy
    UrlSpec {
        #[serde(default)]
        regexp: String,
        #[serde(default)]
        reorder: Option<String>,
        #[serde(default)]
        javasessionremoval: Option<String>,
        #[serde(default)]
        aspsessionremoval: Option<String>,
        #[serde(default)]
        phpsessionremoval: Option<String>,
        #[serde(default)]
        bvsessionremoval: Option<String>,
    },
    /// Access token attached to ingested documents
    Access { token: String },
    /// Default rescan interval, minutes
    FeedRescan { value: String },
    /// Minimum rescan interval, minutes
    MinFeedRescan { value: String },
    /// Rescan interval for unparseable feeds, minutes
    BadFeedRescan { value: String },
    /// Feed fetch timeout, seconds
    FeedTimeout { value: String },
    /// `none`, `description` or `content`
    DechromedMode { mode: String },
    /// `use`, `skip` or `metadata`
    ChromedMode { mode: String },
}

/// A job's document specification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub nodes: Vec<SpecificationNode>,
}

impl Specification {
    #[must_use]
    pub fn new(nodes: Vec<SpecificationNode>) -> Self {
        Self { nodes }
    }

    /// # Errors
    /// Returns `FilterError::Json` if `json` is not a valid specification.
    pub fn from_json(json: &str) -> FilterResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns `FilterError::Json` if serialization fails.
    pub fn to_json(&self) -> FilterResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
