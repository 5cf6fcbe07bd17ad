//! A single throttled connection to one server
//!
//! Lifecycle: [`ThrottledFetcher::create_connection`](super::ThrottledFetcher::create_connection)
//! grants the per-host and global slots, then for each fetch:
//! `begin_fetch` → `execute_fetch` → (`response_header` / `response_body`)
//! → `done_fetch`. Dropping the connection (or calling `close`) releases
//! both slots. The request itself runs on a spawned worker task so the
//! caller can cut it off; an abandoned worker still returns the slots when
//! it unwinds.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, mpsc, oneshot};
use tokio::task::JoinHandle;

use super::body::ThrottledBody;
use super::errors::{FetchError, FetchResult};
use super::status::{
    FETCH_NOT_TRIED, FETCH_UNKNOWN_ERROR, FetchStatus, classify_status, classify_transport_error,
    read_timeout,
};
use super::transport::{Transport, TransportError, TransportRequest};
use crate::activities::{Activities, ActivityRecord};
use crate::throttle::{ConnectionSlot, FetchSeries, HostThrottle, ThrottleSpec};
use crate::utils::{ACTIVITY_FETCH, BODY_CHANNEL_CAPACITY, now_millis};

/// Slots held for as long as either the connection or its worker lives
#[derive(Debug)]
pub(crate) struct ConnectionHold {
    _slot: ConnectionSlot,
    _permit: OwnedSemaphorePermit,
}

impl ConnectionHold {
    pub(crate) fn new(slot: ConnectionSlot, permit: OwnedSemaphorePermit) -> Self {
        Self {
            _slot: slot,
            _permit: permit,
        }
    }
}

#[derive(Debug)]
struct ResponseHead {
    headers: Vec<(String, String)>,
}

#[derive(Debug)]
struct ActiveFetch {
    fetch_type: String,
    _series: FetchSeries,
    start_ms: i64,
    url: Option<String>,
    status_code: i32,
    error: Option<String>,
    bytes_read: Arc<AtomicU64>,
    head: Option<ResponseHead>,
    body: Option<mpsc::Receiver<Result<Vec<u8>, TransportError>>>,
    worker: Option<JoinHandle<()>>,
}

impl Drop for ActiveFetch {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// One logical connection to a server, gated by its [`HostThrottle`]
#[derive(Debug)]
pub struct FetchConnection {
    base: String,
    throttle: Arc<HostThrottle>,
    spec: ThrottleSpec,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    hold: Arc<ConnectionHold>,
    fetch: Option<ActiveFetch>,
}

impl FetchConnection {
    pub(crate) fn new(
        base: String,
        throttle: Arc<HostThrottle>,
        spec: ThrottleSpec,
        timeout: Duration,
        transport: Arc<dyn Transport>,
        hold: ConnectionHold,
    ) -> Self {
        Self {
            base,
            throttle,
            spec,
            timeout,
            transport,
            hold: Arc::new(hold),
            fetch: None,
        }
    }

    /// `protocol://host[:port]` this connection talks to
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Wait for this host's next fetch-start slot.
    ///
    /// # Arguments
    /// * `fetch_type` - Label for the activity record (`Data`, `Robot`)
    pub async fn begin_fetch(&mut self, fetch_type: &str) {
        // A fetch left open is finished silently before the next one starts.
        self.fetch = None;
        let series = self
            .throttle
            .begin_fetch_series(Duration::from_millis(self.spec.min_ms_per_fetch))
            .await;
        self.fetch = Some(ActiveFetch {
            fetch_type: fetch_type.to_string(),
            _series: series,
            start_ms: now_millis(),
            url: None,
            status_code: FETCH_NOT_TRIED,
            error: None,
            bytes_read: Arc::new(AtomicU64::new(0)),
            head: None,
            body: None,
            worker: None,
        });
    }

    /// Issue a GET for `path` (path plus query) on this server.
    ///
    /// # Returns
    /// The permanent outcome of the request.
    ///
    /// # Errors
    /// Transient failures come back as `FetchError::ServiceInterruption`;
    /// calling this without `begin_fetch` is a `FetchError::Transport`.
    pub async fn execute_fetch(
        &mut self,
        path: &str,
        user_agent: &str,
        from: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> FetchResult<FetchStatus> {
        let url = format!("{}{}", self.base, path);
        let fetch = self
            .fetch
            .as_mut()
            .ok_or_else(|| FetchError::Transport("Fetch executed before it was begun".into()))?;
        fetch.url = Some(url.clone());
        fetch.start_ms = now_millis();

        let request = TransportRequest {
            url: url.clone(),
            user_agent: user_agent.to_string(),
            from: from.to_string(),
            etag: etag.map(str::to_string),
            last_modified: last_modified.map(str::to_string),
        };

        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let transport = Arc::clone(&self.transport);
        let hold = Arc::clone(&self.hold);
        fetch.worker = Some(tokio::spawn(async move {
            let _hold = hold;
            match transport.execute(request).await {
                Err(error) => {
                    let _ = head_tx.send(Err(error));
                }
                Ok(response) => {
                    let mut body = response.body;
                    if head_tx.send(Ok((response.status, response.headers))).is_err() {
                        return;
                    }
                    while let Some(chunk) = futures::StreamExt::next(&mut body).await {
                        let failed = chunk.is_err();
                        if body_tx.send(chunk).await.is_err() || failed {
                            break;
                        }
                    }
                }
            }
        }));

        let outcome = match tokio::time::timeout(self.timeout, head_rx).await {
            Err(_) => {
                if let Some(worker) = fetch.worker.take() {
                    worker.abort();
                }
                let error = read_timeout(
                    &url,
                    &format!("no response within {}ms", self.timeout.as_millis()),
                    now_millis(),
                );
                fetch.error = Some(error.to_string());
                return Err(error);
            }
            Ok(Err(_)) => {
                fetch.status_code = FETCH_UNKNOWN_ERROR;
                fetch.error = Some("Fetch worker ended without a response".into());
                return Ok(FetchStatus::PageError);
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            Err(error) => {
                fetch.error = Some(error.message.clone());
                let (status, code) = classify_transport_error(&error, &url, now_millis())?;
                fetch.status_code = code;
                Ok(status)
            }
            Ok((code, headers)) => {
                fetch.status_code = i32::from(code);
                fetch.head = Some(ResponseHead { headers });
                fetch.body = Some(body_rx);
                classify_status(code, &url, now_millis())
            }
        }
    }

    /// Raw response code of the current fetch, or a negative error code
    #[must_use]
    pub fn response_code(&self) -> i32 {
        self.fetch
            .as_ref()
            .map_or(FETCH_NOT_TRIED, |fetch| fetch.status_code)
    }

    /// First value of header `name` (case-insensitive)
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        let head = self.fetch.as_ref()?.head.as_ref()?;
        head.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Take the response body.
    ///
    /// # Errors
    /// Returns `FetchError::Transport` if no response has been received or
    /// the body was already taken.
    pub fn response_body(&mut self) -> FetchResult<ThrottledBody> {
        let fetch = self
            .fetch
            .as_mut()
            .ok_or_else(|| FetchError::Transport("No fetch in progress".into()))?;
        let receiver = fetch
            .body
            .take()
            .ok_or_else(|| FetchError::Transport("No response body available".into()))?;
        Ok(ThrottledBody::new(
            receiver,
            Arc::clone(&self.throttle),
            self.spec.min_ms_per_byte,
            self.timeout,
            fetch.url.clone().unwrap_or_default(),
            Arc::clone(&fetch.bytes_read),
        ))
    }

    /// Finish the current fetch: stop the worker, end the fetch series and
    /// record the `fetch` activity.
    pub fn done_fetch(&mut self, activities: &dyn Activities) {
        let Some(fetch) = self.fetch.take() else {
            return;
        };
        let url = fetch.url.clone().unwrap_or_else(|| self.base.clone());
        let elapsed = now_millis() - fetch.start_ms;
        let bytes = fetch.bytes_read.load(Ordering::Relaxed);

        activities.record_activity(ActivityRecord {
            start_time_ms: fetch.start_ms,
            activity: ACTIVITY_FETCH.to_string(),
            byte_count: Some(bytes),
            entity: url.clone(),
            result_code: fetch.status_code.to_string(),
            result_description: fetch.error.clone(),
        });
        tracing::info!(
            "FETCH {}|{}|{}+{}|{}|{}|{}",
            fetch.fetch_type,
            url,
            fetch.start_ms,
            elapsed,
            fetch.status_code,
            bytes,
            fetch.error.as_deref().unwrap_or("")
        );
        if let Some(error) = fetch.error.as_deref() {
            log::debug!("Fetch exception for '{url}': {error}");
        }
    }

    /// Release the connection slots.
    pub fn close(self) {}
}
