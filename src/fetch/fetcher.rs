//! Shared fetcher for one throttle group
//!
//! Holds one [`HostThrottle`] per server, created on first use, and a
//! handle on the process-wide connection gate. Every [`FetchConnection`] is issued here.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::connection::{ConnectionHold, FetchConnection};
use super::errors::{FetchError, FetchResult};
use super::transport::Transport;
use crate::throttle::{HandleGate, HostThrottle, ThrottleSpec};

/// Server key `protocol://host[:port]` for `url`
///
/// # Errors
/// Returns `FetchError::Transport` if the URL has no host.
pub fn server_key(url: &Url) -> FetchResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| FetchError::Transport(format!("URL '{url}' has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// Who is fetching and how: everything a connection needs besides the URL
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub user_agent: String,
    pub from: String,
    pub spec: ThrottleSpec,
    pub transport: Arc<dyn Transport>,
}

/// Per-host throttles plus the global handle cap
#[derive(Debug)]
pub struct ThrottledFetcher {
    hosts: DashMap<String, Arc<HostThrottle>>,
    gate: HandleGate,
}

impl ThrottledFetcher {
    /// # Arguments
    /// * `global_limit` - Outstanding connections allowed across all hosts
    #[must_use]
    pub fn new(global_limit: usize) -> Self {
        Self::with_gate(HandleGate::new(global_limit))
    }

    /// Fetcher drawing handles from an existing `gate`
    #[must_use]
    pub fn with_gate(gate: HandleGate) -> Self {
        Self {
            hosts: DashMap::new(),
            gate,
        }
    }

    /// Throttle state for `server`, created if absent
    #[must_use]
    pub fn host_throttle(&self, server: &str) -> Arc<HostThrottle> {
        self.hosts
            .entry(server.to_string())
            .or_insert_with(|| Arc::new(HostThrottle::new(server)))
            .clone()
    }

    /// Open a connection to the server hosting `target`.
    ///
    /// Waits for a per-host connection slot, then for a global handle.
    ///
    /// # Arguments
    /// * `target` - Any URL on the server
    /// * `context` - Limits and transport for the connection
    /// * `timeout` - Wall-clock cutoff for each wait on the peer
    ///
    /// # Errors
    /// Returns `FetchError::Transport` if `target` has no host.
    pub async fn create_connection(
        &self,
        target: &Url,
        context: &FetchContext,
        timeout: Duration,
    ) -> FetchResult<FetchConnection> {
        let server = server_key(target)?;
        let throttle = self.host_throttle(&server);

        let slot = throttle
            .register_connection(context.spec.max_open_connections)
            .await;
        let permit = self.gate.acquire().await;

        Ok(FetchConnection::new(
            server,
            throttle,
            context.spec.clone(),
            timeout,
            Arc::clone(&context.transport),
            ConnectionHold::new(slot, permit),
        ))
    }

    /// Forget servers nothing is using any more.
    pub fn poll(&self) {
        self.hosts
            .retain(|_, throttle| Arc::strong_count(throttle) > 1 || !throttle.is_idle());
    }

    /// Number of servers with throttle state
    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn gate(&self) -> &HandleGate {
        &self.gate
    }
}

impl Default for ThrottledFetcher {
    fn default() -> Self {
        Self::new(crate::utils::DEFAULT_GLOBAL_CONNECTION_LIMIT)
    }
}
