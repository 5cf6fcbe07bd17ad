//! Shared constants for the feed crawler
//!
//! Default limits, retry windows and well-known names used across the
//! throttle, fetch, robots and connector modules.

/// Process-wide cap on outstanding fetch handles across all hosts.
pub const DEFAULT_GLOBAL_CONNECTION_LIMIT: usize = 200;

/// Default per-server connection cap when the configuration is silent.
pub const DEFAULT_MAX_OPEN_CONNECTIONS_PER_SERVER: usize = 10;

/// Largest body chunk gated by a single bandwidth reservation.
pub const READ_CHUNK_LENGTH: usize = 4096;

/// Capacity (in chunks) of the channel carrying a response body from the
/// fetch worker to the reader.
pub const BODY_CHANNEL_CAPACITY: usize = 16;

/// Default feed fetch timeout: 60 seconds
pub const DEFAULT_FEED_TIMEOUT_MS: u64 = 60_000;

/// Timeout used when fetching robots.txt
pub const ROBOTS_FETCH_TIMEOUT_MS: u64 = 60_000;

/// A populated robots record stays valid for 24 hours.
pub const ROBOTS_VALIDITY_MS: u64 = 24 * 60 * 60 * 1000;

/// Retry delay after robots.txt could not be read
pub const ROBOTS_RETRY_MS: i64 = 300_000;

/// Maximum redirects followed by the HTTP transport
pub const MAX_REDIRECTS: usize = 10;

pub const MINUTE_MS: i64 = 60_000;

/// Deny token attached to every secured document.
pub const DEFAULT_AUTHORITY_DENY_TOKEN: &str = "DEAD_AUTHORITY";

/// Activity names recorded through the activities collaborator
pub const ACTIVITY_FETCH: &str = "fetch";
pub const ACTIVITY_ROBOTS_PARSE: &str = "robots parse";
pub const ACTIVITY_PROCESS: &str = "process";

/// Fetch types used in activity records and the FETCH log line
pub const FETCH_TYPE_DATA: &str = "Data";
pub const FETCH_TYPE_ROBOTS: &str = "Robot";

/// Product token placed in the user agent ahead of the contact email.
pub const USER_AGENT_PRODUCT: &str = "KodegenFeedScrape";

/// Result codes of the `process` activity
pub const RESULT_OK: &str = "OK";
pub const RESULT_EXCLUDED_LENGTH: &str = "EXCLUDEDLENGTH";
pub const RESULT_EXCLUDED_URL: &str = "EXCLUDEDURL";
pub const RESULT_EXCLUDED_MIMETYPE: &str = "EXCLUDEDMIMETYPE";
pub const RESULT_INGEST_ERROR: &str = "INGESTERROR";

/// Retry delay after a body could not be spooled
pub const DATA_RETRY_MS: i64 = 300_000;

/// Give up on a body that keeps failing to spool after 12 hours
pub const DATA_FAIL_AFTER_MS: i64 = 12 * 60 * MINUTE_MS;

/// Name under which inline feed content is carried down
pub const CARRY_DOWN_DATA: &str = "data";
