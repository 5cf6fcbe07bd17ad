//! Outcome classification for fetches
//!
//! Two fixed tables: HTTP status codes, and transport failures. Each entry
//! either yields a permanent [`FetchStatus`] or a transient
//! [`FetchError::ServiceInterruption`] with its retry window.

use super::errors::FetchError;
use super::transport::{TransportError, TransportErrorKind};
use crate::utils::MINUTE_MS;

/// Result of an executed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// 200: body available
    Ok,
    /// 304: unchanged since the supplied etag or last-modified
    NoChange,
    /// Fetching from this site is not allowed (401, 305)
    SiteError,
    /// This page cannot be fetched
    PageError,
}

impl FetchStatus {
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::NoChange)
    }
}

/// Response code recorded before any request was made
pub const FETCH_NOT_TRIED: i32 = -1;
/// Activity code for a fetch refused by robots.txt
pub const FETCH_ROBOTS_EXCLUSION: i32 = -2;
pub const FETCH_IO_ERROR: i32 = -101;
pub const FETCH_CIRCULAR_REDIRECT: i32 = -102;
pub const FETCH_BAD_URI: i32 = -103;
pub const FETCH_UNKNOWN_ERROR: i32 = -104;

/// Classify an HTTP response code.
///
/// # Errors
/// 408, 500, 503 and 504 are temporary: retry in an hour, give up after a day.
pub fn classify_status(code: u16, url: &str, now_ms: i64) -> Result<FetchStatus, FetchError> {
    match code {
        200 => Ok(FetchStatus::Ok),
        304 => Ok(FetchStatus::NoChange),
        401 | 305 => Ok(FetchStatus::SiteError),
        408 | 503 | 504 => Err(FetchError::interruption(
            format!("Http response temporary error on '{url}': {code}"),
            now_ms,
            60 * MINUTE_MS,
            Some(1440 * MINUTE_MS),
        )),
        500 => Err(FetchError::interruption(
            format!("Http response internal server error on '{url}': {code}"),
            now_ms,
            60 * MINUTE_MS,
            Some(1440 * MINUTE_MS),
        )),
        _ => Ok(FetchStatus::PageError),
    }
}

/// Classify a transport failure.
///
/// # Returns
/// The permanent status and the negative response code to record, or the
/// transient interruption to surface.
///
/// # Errors
/// Timeouts, missing responses and refused connections are transient.
pub fn classify_transport_error(
    error: &TransportError,
    url: &str,
    now_ms: i64,
) -> Result<(FetchStatus, i32), FetchError> {
    match error.kind {
        TransportErrorKind::MalformedUrl => Ok((FetchStatus::PageError, FETCH_BAD_URI)),
        TransportErrorKind::CircularRedirect => {
            Ok((FetchStatus::PageError, FETCH_CIRCULAR_REDIRECT))
        }
        TransportErrorKind::Other => Ok((FetchStatus::PageError, FETCH_IO_ERROR)),
        TransportErrorKind::ReadTimeout => Err(read_timeout(url, &error.message, now_ms)),
        TransportErrorKind::ConnectTimeout => Err(FetchError::interruption(
            format!("Timed out waiting for connect for '{url}': {}", error.message),
            now_ms,
            60 * MINUTE_MS,
            Some(720 * MINUTE_MS),
        )),
        TransportErrorKind::NoResponse => Err(FetchError::interruption(
            format!("Timed out waiting for response for '{url}'"),
            now_ms,
            15 * MINUTE_MS,
            Some(120 * MINUTE_MS),
        )),
        TransportErrorKind::ConnectionRefused => Err(FetchError::interruption(
            format!("Timed out waiting for a connection for '{url}'"),
            now_ms,
            1_000_000,
            Some(720 * MINUTE_MS),
        )),
    }
}

/// The interruption raised when no bytes arrive within the cutoff
#[must_use]
pub fn read_timeout(url: &str, detail: &str, now_ms: i64) -> FetchError {
    FetchError::interruption(
        format!("Timed out waiting for IO for '{url}': {detail}"),
        now_ms,
        300_000,
        Some(120 * MINUTE_MS),
    )
}
