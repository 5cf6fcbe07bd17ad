//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use std::path::PathBuf;

use super::builder::ConnectorConfigBuilder;
use super::types::RobotsUsage;
use crate::fetch::ProxySettings;

impl<State> ConnectorConfigBuilder<State> {
    #[must_use]
    pub fn robots_usage(mut self, usage: RobotsUsage) -> Self {
        self.robots_usage = usage;
        self
    }

    /// Cap the bandwidth used against any one server.
    ///
    /// Zero means unlimited.
    #[must_use]
    pub fn max_kbytes_per_second_per_server(mut self, kbytes: u64) -> Self {
        self.max_kbytes_per_second_per_server = Some(kbytes);
        self
    }

    #[must_use]
    pub fn max_open_connections_per_server(mut self, connections: usize) -> Self {
        self.max_open_connections_per_server = connections;
        self
    }

    /// Cap how often fetches to one server may start.
    ///
    /// Zero is treated as one fetch per minute.
    #[must_use]
    pub fn max_fetches_per_minute_per_server(mut self, fetches: u64) -> Self {
        self.max_fetches_per_minute_per_server = Some(fetches);
        self
    }

    /// Name of the throttle group shared with other connectors
    #[must_use]
    pub fn throttle_group(mut self, group: impl Into<String>) -> Self {
        self.throttle_group = group.into();
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn global_connection_limit(mut self, limit: usize) -> Self {
        self.global_connection_limit = limit;
        self
    }

    /// Spool fetched bodies and dechromed content under `dir`
    #[must_use]
    pub fn spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }
}
