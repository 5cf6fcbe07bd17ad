//! Per-server courtesy limits
//!
//! Key features:
//! - Connection cap per server plus a process-wide handle cap
//! - Fetch starts spaced by a watermark, not a ticker
//! - Aggregate bandwidth cap calibrated from the first chunk of a series
//! - Reference-counted registry of fetchers and robots caches per
//!   throttle group

mod handle_gate;
mod host_throttle;
mod registry;

pub use handle_gate::HandleGate;
pub use host_throttle::{ByteRead, ConnectionSlot, EstimatePhase, FetchSeries, HostThrottle};
pub use registry::{ThrottleGroupLease, ThrottleRegistry};

use serde::{Deserialize, Serialize};

/// Limits applied to every server of a connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSpec {
    /// Concurrently open connections per server
    pub max_open_connections: usize,
    /// Minimum spacing between fetch starts on one server
    pub min_ms_per_fetch: u64,
    /// Minimum milliseconds per byte read from one server (0 = unlimited)
    pub min_ms_per_byte: f64,
}

impl Default for ThrottleSpec {
    fn default() -> Self {
        Self {
            max_open_connections: crate::utils::DEFAULT_MAX_OPEN_CONNECTIONS_PER_SERVER,
            min_ms_per_fetch: 0,
            min_ms_per_byte: 0.0,
        }
    }
}
