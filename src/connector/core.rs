//! The feed connector: one configured connection to the web
//!
//! Holds the lease on its throttle group, the fetch identity derived from
//! the configuration and the spool of bodies being processed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::data_cache::DataCache;
use super::errors::ConnectorResult;
use crate::config::ConnectorConfig;
use crate::fetch::{FetchContext, ReqwestTransport, Transport};
use crate::filter::{FilterSpec, Specification};
use crate::throttle::{ThrottleGroupLease, ThrottleRegistry};
use crate::utils::{ACTIVITY_FETCH, ACTIVITY_PROCESS, ACTIVITY_ROBOTS_PARSE, DEFAULT_FEED_TIMEOUT_MS};

/// Version strings the framework already holds for documents
pub trait ExistingVersions: Send + Sync {
    /// Version last indexed or recorded for `document_id`
    fn indexed_version(&self, document_id: &str) -> Option<String>;
}

impl ExistingVersions for HashMap<String, String> {
    fn indexed_version(&self, document_id: &str) -> Option<String> {
        self.get(document_id).cloned()
    }
}

/// Crawls feeds and the documents they link to
#[derive(Debug)]
pub struct FeedConnector {
    pub(crate) config: ConnectorConfig,
    pub(crate) lease: ThrottleGroupLease,
    pub(crate) context: FetchContext,
    pub(crate) cache: DataCache,
}

impl FeedConnector {
    /// Connector sharing `registry`'s throttle group named in `config`.
    ///
    /// # Arguments
    /// * `config` - Connection configuration
    /// * `registry` - Owner of the shared fetchers and robots caches
    /// * `transport` - HTTP client used for every fetch
    #[must_use]
    pub fn new(
        config: ConnectorConfig,
        registry: &ThrottleRegistry,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let lease = registry.acquire(config.throttle_group());
        let context = FetchContext {
            user_agent: config.user_agent(),
            from: config.from().to_string(),
            spec: config.throttle_spec(),
            transport,
        };
        let cache = DataCache::new(config.spool_dir().map(ToOwned::to_owned));
        log::debug!(
            "Feed connector for '{}' joined throttle group '{}'",
            config.email(),
            config.throttle_group()
        );
        Self {
            config,
            lease,
            context,
            cache,
        }
    }

    /// Connector using a reqwest client built from the configured proxy.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: ConnectorConfig, registry: &ThrottleRegistry) -> ConnectorResult<Self> {
        let transport = ReqwestTransport::new(
            config.proxy(),
            Duration::from_millis(DEFAULT_FEED_TIMEOUT_MS),
        )?;
        Ok(Self::new(config, registry, Arc::new(transport)))
    }

    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Activity names this connector records
    #[must_use]
    pub fn activities_list() -> &'static [&'static str] {
        &[ACTIVITY_FETCH, ACTIVITY_ROBOTS_PARSE, ACTIVITY_PROCESS]
    }

    /// Queue keys for `document_id`: its host name, or `""` when the
    /// identifier is not a URL with a host.
    #[must_use]
    pub fn bin_names(document_id: &str) -> Vec<String> {
        let host = Url::parse(document_id)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();
        vec![host]
    }

    /// The job's canonical seed URLs.
    ///
    /// # Errors
    /// Returns `ConnectorError::Config` for an unusable specification.
    pub fn add_seed_documents(&self, spec: &Specification) -> ConnectorResult<Vec<String>> {
        let filter = FilterSpec::from_specification(spec, true)?;
        let seeds = filter.seeds();
        log::debug!("Seeding {} feeds", seeds.len());
        Ok(seeds)
    }

    /// Periodic housekeeping of the shared throttle group.
    pub fn poll(&self) {
        self.lease.poll();
    }

    /// Give up this connector's share of its throttle group.
    pub fn disconnect(self) {
        self.lease.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{TransportError, TransportRequest, TransportResponse};
    use futures::future::BoxFuture;

    #[derive(Debug)]
    struct NoTransport;

    impl Transport for NoTransport {
        fn execute(
            &self,
            request: TransportRequest,
        ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
            Box::pin(async move {
                Err(TransportError::new(
                    crate::fetch::TransportErrorKind::Other,
                    format!("no network for {}", request.url),
                ))
            })
        }
    }

    fn connector(registry: &ThrottleRegistry, group: &str) -> FeedConnector {
        let config = ConnectorConfig::builder()
            .email("crawler@example.com")
            .throttle_group(group)
            .build()
            .unwrap();
        FeedConnector::new(config, registry, Arc::new(NoTransport))
    }

    #[test]
    fn bin_name_is_the_host() {
        assert_eq!(FeedConnector::bin_names("http://Example.com:8080/a?b"), vec!["example.com"]);
        assert_eq!(FeedConnector::bin_names("not a url"), vec![""]);
    }

    #[test]
    fn activity_names() {
        assert_eq!(
            FeedConnector::activities_list(),
            &["fetch", "robots parse", "process"]
        );
    }

    #[test]
    fn connectors_share_their_group() {
        let config = ConnectorConfig::builder()
            .email("crawler@example.com")
            .global_connection_limit(7)
            .build()
            .unwrap();
        let registry = ThrottleRegistry::from_config(&config);
        let a = connector(&registry, "news");
        let b = connector(&registry, "news");
        assert_eq!(registry.lease_count("news"), 2);
        assert_eq!(a.lease.fetcher().gate().limit(), 7);
        a.disconnect();
        drop(b);
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn seeds_are_canonical() {
        let registry = ThrottleRegistry::default();
        let connector = connector(&registry, "");
        let spec = Specification::from_json(
            r#"{"nodes":[{"type":"feed","url":"http://example.com/feed.xml#top"}]}"#,
        )
        .unwrap();
        assert_eq!(
            connector.add_seed_documents(&spec).unwrap(),
            vec!["http://example.com/feed.xml"]
        );
    }
}
