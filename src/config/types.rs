//! Core configuration types for the feed connector
//!
//! `ConnectorConfig` holds the connection-level parameters: who we are
//! (contact email), how politely we crawl (throttling and robots.txt), and
//! how we reach the network (proxy, spool directory).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::fetch::ProxySettings;

/// How robots.txt is honoured
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RobotsUsage {
    /// Never consult robots.txt
    None,
    /// Consult robots.txt before fetching data
    Data,
    /// Consult robots.txt for everything
    #[default]
    All,
}

/// Connection configuration for a feed connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Contact address sent as `From` and embedded in the user agent.
    ///
    /// **INVARIANT:** Never empty (checked by the builder).
    pub(crate) email: String,

    pub(crate) robots_usage: RobotsUsage,

    /// Bandwidth cap per server; `None` means unlimited
    pub(crate) max_kbytes_per_second_per_server: Option<u64>,

    /// Default: 10
    pub(crate) max_open_connections_per_server: usize,

    /// Fetch-rate cap per server; `None` means unlimited
    pub(crate) max_fetches_per_minute_per_server: Option<u64>,

    /// Connectors with the same group name share throttles and robots data.
    ///
    /// Default: `""`
    pub(crate) throttle_group: String,

    pub(crate) proxy: Option<ProxySettings>,

    /// Outstanding fetches allowed across all hosts of the throttle group
    ///
    /// Default: 200
    pub(crate) global_connection_limit: usize,

    /// Where fetched bodies and dechromed content are spooled.
    /// The system temp directory when unset.
    pub(crate) spool_dir: Option<PathBuf>,
}
