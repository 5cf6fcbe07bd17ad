//! HTTP transport seam
//!
//! [`FetchConnection`](super::FetchConnection) never talks to the network
//! directly; it hands a [`TransportRequest`] to a [`Transport`] and consumes
//! the status, headers and body stream that come back. The production
//! implementation is [`ReqwestTransport`]; tests substitute scripted ones.

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, FROM, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, USER_AGENT};
use std::time::Duration;

use super::errors::{FetchError, FetchResult};
use crate::utils::MAX_REDIRECTS;

/// Why a transport attempt failed, in the granularity the status tables need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    MalformedUrl,
    ReadTimeout,
    ConnectTimeout,
    CircularRedirect,
    NoResponse,
    ConnectionRefused,
    /// Any other protocol or I/O failure
    Other,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One GET request, fully described
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub user_agent: String,
    pub from: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Body chunks as they arrive from the peer
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Response head plus a streaming body
pub struct TransportResponse {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: Vec<(String, String)>,
    pub body: BodyStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Executes requests on behalf of fetch connections
pub trait Transport: Send + Sync + std::fmt::Debug {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>>;
}

/// Proxy settings applied to the underlying client
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that follows up to ten redirects and optionally routes
    /// through `proxy`.
    ///
    /// # Errors
    /// Returns `FetchError::Transport` if the proxy or client cannot be built.
    pub fn new(proxy: Option<&ProxySettings>, connect_timeout: Duration) -> FetchResult<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(connect_timeout);

        if let Some(settings) = proxy.filter(|p| !p.host.is_empty()) {
            let mut proxy = reqwest::Proxy::all(format!("http://{}:{}", settings.host, settings.port))
                .map_err(|e| FetchError::Transport(format!("Invalid proxy: {e}")))?;
            if let Some(username) = settings.username.as_deref() {
                proxy = proxy.basic_auth(username, settings.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_builder() {
        TransportErrorKind::MalformedUrl
    } else if err.is_redirect() {
        TransportErrorKind::CircularRedirect
    } else if err.is_timeout() && err.is_connect() {
        TransportErrorKind::ConnectTimeout
    } else if err.is_timeout() {
        TransportErrorKind::ReadTimeout
    } else if err.is_connect() {
        TransportErrorKind::ConnectionRefused
    } else if err.is_request() {
        TransportErrorKind::NoResponse
    } else {
        TransportErrorKind::Other
    }
}

fn reqwest_failure(err: &reqwest::Error) -> TransportError {
    TransportError::new(classify_reqwest_error(err), err.to_string())
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

impl Transport for ReqwestTransport {
    fn execute(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'static, Result<TransportResponse, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let url = reqwest::Url::parse(&request.url).map_err(|e| {
                TransportError::new(
                    TransportErrorKind::MalformedUrl,
                    format!("Illegal URI '{}': {e}", request.url),
                )
            })?;

            let mut builder = client
                .get(url)
                .header(USER_AGENT, request.user_agent)
                .header(FROM, request.from)
                .header(ACCEPT, "*/*");
            if let Some(etag) = request.etag {
                builder = builder.header(IF_NONE_MATCH, etag);
            }
            if let Some(modified) = request.last_modified {
                builder = builder.header(IF_MODIFIED_SINCE, modified);
            }

            let response = builder.send().await.map_err(|e| reqwest_failure(&e))?;
            let status = response.status().as_u16();
            let headers = header_pairs(response.headers());
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(|e| reqwest_failure(&e)))
                .boxed();

            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        })
    }
}
