//! Type-safe builder for `ConnectorConfig` using the typestate pattern
//!
//! `build()` only exists once the mandatory contact email has been given.

use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{ConnectorConfig, RobotsUsage};
use crate::fetch::ProxySettings;
use crate::utils::{DEFAULT_GLOBAL_CONNECTION_LIMIT, DEFAULT_MAX_OPEN_CONNECTIONS_PER_SERVER};

// Type states for the builder
pub struct WithEmail;

pub struct ConnectorConfigBuilder<State = ()> {
    pub(crate) email: Option<String>,
    pub(crate) robots_usage: RobotsUsage,
    pub(crate) max_kbytes_per_second_per_server: Option<u64>,
    pub(crate) max_open_connections_per_server: usize,
    pub(crate) max_fetches_per_minute_per_server: Option<u64>,
    pub(crate) throttle_group: String,
    pub(crate) proxy: Option<ProxySettings>,
    pub(crate) global_connection_limit: usize,
    pub(crate) spool_dir: Option<PathBuf>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ConnectorConfigBuilder<()> {
    fn default() -> Self {
        Self {
            email: None,
            robots_usage: RobotsUsage::All,
            max_kbytes_per_second_per_server: None,
            max_open_connections_per_server: DEFAULT_MAX_OPEN_CONNECTIONS_PER_SERVER,
            max_fetches_per_minute_per_server: None,
            throttle_group: String::new(),
            proxy: None,
            global_connection_limit: DEFAULT_GLOBAL_CONNECTION_LIMIT,
            spool_dir: None,
            _phantom: PhantomData,
        }
    }
}

impl ConnectorConfig {
    /// Create a builder for configuring a `ConnectorConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ConnectorConfigBuilder<()> {
        ConnectorConfigBuilder::default()
    }
}

impl ConnectorConfigBuilder<()> {
    pub fn email(self, email: impl Into<String>) -> ConnectorConfigBuilder<WithEmail> {
        ConnectorConfigBuilder {
            email: Some(email.into().trim().to_string()),
            robots_usage: self.robots_usage,
            max_kbytes_per_second_per_server: self.max_kbytes_per_second_per_server,
            max_open_connections_per_server: self.max_open_connections_per_server,
            max_fetches_per_minute_per_server: self.max_fetches_per_minute_per_server,
            throttle_group: self.throttle_group,
            proxy: self.proxy,
            global_connection_limit: self.global_connection_limit,
            spool_dir: self.spool_dir,
            _phantom: PhantomData,
        }
    }
}

// Build method only available when all required fields are set
impl ConnectorConfigBuilder<WithEmail> {
    /// # Errors
    /// Fails when the email is blank or a connection limit is zero.
    pub fn build(self) -> Result<ConnectorConfig> {
        let email = self
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| anyhow!("email is required"))?;

        if self.max_open_connections_per_server == 0 {
            return Err(anyhow!("max_open_connections_per_server must be at least 1"));
        }
        if self.global_connection_limit == 0 {
            return Err(anyhow!("global_connection_limit must be at least 1"));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() {
                return Err(anyhow!("proxy host must not be empty"));
            }
        }

        Ok(ConnectorConfig {
            email,
            robots_usage: self.robots_usage,
            max_kbytes_per_second_per_server: self.max_kbytes_per_second_per_server.filter(|k| *k > 0),
            max_open_connections_per_server: self.max_open_connections_per_server,
            max_fetches_per_minute_per_server: self.max_fetches_per_minute_per_server,
            throttle_group: self.throttle_group,
            proxy: self.proxy,
            global_connection_limit: self.global_connection_limit,
            spool_dir: self.spool_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_derived_values() {
        let config = ConnectorConfig::builder()
            .email(" crawler@example.com ")
            .build()
            .unwrap();
        assert_eq!(config.email(), "crawler@example.com");
        assert_eq!(
            config.user_agent(),
            "Mozilla/5.0 (KodegenFeedScrape; crawler@example.com)"
        );
        assert_eq!(config.robots_usage(), RobotsUsage::All);
        let spec = config.throttle_spec();
        assert_eq!(spec.max_open_connections, 10);
        assert_eq!(spec.min_ms_per_fetch, 0);
        assert!(spec.min_ms_per_byte.abs() < f64::EPSILON);
    }

    #[test]
    fn rate_limits_translate_into_throttle_spec() {
        let config = ConnectorConfig::builder()
            .email("a@b")
            .max_kbytes_per_second_per_server(4)
            .max_fetches_per_minute_per_server(12)
            .build()
            .unwrap();
        let spec = config.throttle_spec();
        assert_eq!(spec.min_ms_per_fetch, 5000);
        assert!((spec.min_ms_per_byte - 0.25).abs() < f64::EPSILON);

        let zero = ConnectorConfig::builder()
            .email("a@b")
            .max_fetches_per_minute_per_server(0)
            .build()
            .unwrap();
        assert_eq!(zero.throttle_spec().min_ms_per_fetch, 60_000);
    }

    #[test]
    fn blank_email_is_rejected() {
        assert!(ConnectorConfig::builder().email("  ").build().is_err());
        assert!(
            ConnectorConfig::builder()
                .email("a@b")
                .max_open_connections_per_server(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn robots_usage_orders_by_strictness() {
        assert!(RobotsUsage::All >= RobotsUsage::Data);
        assert!(RobotsUsage::None < RobotsUsage::Data);
    }
}
