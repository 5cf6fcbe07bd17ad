//! Getter methods for `ConnectorConfig`
//!
//! Plain accessors plus the values derived from them: the user agent and
//! the per-server [`ThrottleSpec`].

use std::path::Path;

use super::types::{ConnectorConfig, RobotsUsage};
use crate::fetch::ProxySettings;
use crate::throttle::ThrottleSpec;
use crate::utils::USER_AGENT_PRODUCT;

impl ConnectorConfig {
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Value of the `From` request header
    #[must_use]
    pub fn from(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn user_agent(&self) -> String {
        format!("Mozilla/5.0 ({USER_AGENT_PRODUCT}; {})", self.email)
    }

    #[must_use]
    pub fn robots_usage(&self) -> RobotsUsage {
        self.robots_usage
    }

    #[must_use]
    pub fn throttle_group(&self) -> &str {
        &self.throttle_group
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxySettings> {
        self.proxy.as_ref()
    }

    #[must_use]
    pub fn global_connection_limit(&self) -> usize {
        self.global_connection_limit
    }

    #[must_use]
    pub fn spool_dir(&self) -> Option<&Path> {
        self.spool_dir.as_deref()
    }

    #[must_use]
    pub fn max_open_connections_per_server(&self) -> usize {
        self.max_open_connections_per_server
    }

    /// Per-server limits derived from the configured rates
    #[must_use]
    pub fn throttle_spec(&self) -> ThrottleSpec {
        let min_ms_per_fetch = self
            .max_fetches_per_minute_per_server
            .map_or(0, |fetches| 60_000 / fetches.max(1));
        #[allow(clippy::cast_precision_loss)]
        let min_ms_per_byte = self
            .max_kbytes_per_second_per_server
            .map_or(0.0, |kbytes| 1.0 / kbytes as f64);
        ThrottleSpec {
            max_open_connections: self.max_open_connections_per_server,
            min_ms_per_fetch,
            min_ms_per_byte,
        }
    }
}
