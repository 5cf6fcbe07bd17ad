//! Bandwidth-throttled response body

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use super::errors::{FetchError, FetchResult};
use super::status::{classify_transport_error, read_timeout};
use super::transport::TransportError;
use crate::throttle::HostThrottle;
use crate::utils::{READ_CHUNK_LENGTH, now_millis};

pub(crate) type BodyReceiver = mpsc::Receiver<Result<Vec<u8>, TransportError>>;

/// Response body of an executed fetch.
///
/// Every chunk handed out is at most [`READ_CHUNK_LENGTH`] bytes and was
/// admitted by the host's byte-rate gate, so concurrent bodies from one
/// server share its bandwidth cap.
#[derive(Debug)]
pub struct ThrottledBody {
    receiver: BodyReceiver,
    throttle: Arc<HostThrottle>,
    min_ms_per_byte: f64,
    timeout: Duration,
    url: String,
    bytes_read: Arc<AtomicU64>,
    pending: Vec<u8>,
    offset: usize,
    finished: bool,
}

impl ThrottledBody {
    pub(crate) fn new(
        receiver: BodyReceiver,
        throttle: Arc<HostThrottle>,
        min_ms_per_byte: f64,
        timeout: Duration,
        url: String,
        bytes_read: Arc<AtomicU64>,
    ) -> Self {
        Self {
            receiver,
            throttle,
            min_ms_per_byte,
            timeout,
            url,
            bytes_read,
            pending: Vec::new(),
            offset: 0,
            finished: false,
        }
    }

    /// Next chunk of the body, or `None` at end of stream.
    ///
    /// # Errors
    /// A stalled peer yields a read-timeout service interruption; other
    /// transport failures are classified like fetch failures.
    pub async fn next_chunk(&mut self) -> FetchResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        let read = self
            .throttle
            .begin_byte_read(READ_CHUNK_LENGTH, self.min_ms_per_byte)
            .await;

        if self.offset >= self.pending.len() {
            match tokio::time::timeout(self.timeout, self.receiver.recv()).await {
                Err(_) => {
                    return Err(read_timeout(
                        &self.url,
                        &format!("no data for {}ms", self.timeout.as_millis()),
                        now_millis(),
                    ));
                }
                Ok(None) => {
                    read.finish(0);
                    self.finished = true;
                    return Ok(None);
                }
                Ok(Some(Err(error))) => {
                    read.finish(0);
                    self.finished = true;
                    return Err(match classify_transport_error(&error, &self.url, now_millis()) {
                        Ok(_) => FetchError::Transport(format!(
                            "I/O exception reading stream: {}",
                            error.message
                        )),
                        Err(interruption) => interruption,
                    });
                }
                Ok(Some(Ok(bytes))) => {
                    self.pending = bytes;
                    self.offset = 0;
                }
            }
        }

        let end = (self.offset + READ_CHUNK_LENGTH).min(self.pending.len());
        let chunk = self.pending[self.offset..end].to_vec();
        self.offset = end;
        read.finish(chunk.len());
        self.bytes_read
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        Ok(Some(chunk))
    }

    /// Read the remaining body into memory.
    ///
    /// # Errors
    /// See [`ThrottledBody::next_chunk`].
    pub async fn read_to_end(&mut self) -> FetchResult<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}
