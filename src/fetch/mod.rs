//! Throttled HTTP fetching
//!
//! Key features:
//! - Per-server connection cap, fetch spacing and bandwidth cap
//! - Request executed on a worker task with a wall-clock cutoff
//! - Fixed classification of HTTP codes and transport failures into
//!   permanent statuses or scheduled retries
//! - `fetch` activity record and log line for every attempt

mod body;
mod connection;
pub mod errors;
mod fetcher;
pub mod status;
pub mod transport;

pub use body::ThrottledBody;
pub use connection::FetchConnection;
pub use errors::{FetchError, FetchResult};
pub use fetcher::{FetchContext, ThrottledFetcher, server_key};
pub use status::{FETCH_ROBOTS_EXCLUSION, FetchStatus};
pub use transport::{
    BodyStream, ProxySettings, ReqwestTransport, Transport, TransportError, TransportErrorKind,
    TransportRequest, TransportResponse,
};
