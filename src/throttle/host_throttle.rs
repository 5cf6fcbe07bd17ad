//! Per-host throttle state machine
//!
//! One [`HostThrottle`] exists per `protocol://host[:port]` and is shared by
//! every fetch to that server. It enforces three limits:
//!
//! - concurrently registered connections (`register_connection`)
//! - spacing between fetch starts (`begin_fetch_series`)
//! - aggregate bytes per millisecond across all reads (`begin_byte_read`)
//!
//! All state sits behind a single mutex; waiters park on a `Notify` and
//! re-check after every state change.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Progress of the bandwidth-rate estimate for the current fetch series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimatePhase {
    /// No estimate; the next read calibrates.
    Unknown,
    /// A calibrating read is in flight; other readers wait for it.
    InProgress,
    /// Calibrated milliseconds per byte.
    Valid { ms_per_byte: f64 },
}

#[derive(Debug)]
struct HostState {
    open_connections: usize,
    next_fetch_at: Option<Instant>,
    active_series: usize,
    series_start: Option<Instant>,
    total_bytes: i64,
    phase: EstimatePhase,
}

impl HostState {
    fn new() -> Self {
        Self {
            open_connections: 0,
            next_fetch_at: None,
            active_series: 0,
            series_start: None,
            total_bytes: 0,
            phase: EstimatePhase::Unknown,
        }
    }

    fn reset_estimator(&mut self) {
        self.series_start = None;
        self.total_bytes = 0;
        self.phase = EstimatePhase::Unknown;
    }
}

/// Shared throttle state for a single server
#[derive(Debug)]
pub struct HostThrottle {
    host: String,
    state: Mutex<HostState>,
    notify: Notify,
}

impl HostThrottle {
    /// Create throttle state for `host` (a `protocol://host[:port]` key)
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(HostState::new()),
            notify: Notify::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Wait until fewer than `max_open` connections are registered for this
    /// host, then take a slot.
    ///
    /// The slot is released when the returned guard drops.
    pub async fn register_connection(self: &Arc<Self>, max_open: usize) -> ConnectionSlot {
        let max_open = max_open.max(1);
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if state.open_connections < max_open {
                    state.open_connections += 1;
                    return ConnectionSlot {
                        throttle: Arc::clone(self),
                    };
                }
            }
            notified.await;
        }
    }

    fn release_connection(&self) {
        {
            let mut state = self.state.lock();
            state.open_connections = state.open_connections.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Number of connections currently registered
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.lock().open_connections
    }

    /// Reserve the next fetch-start slot and sleep until it arrives.
    ///
    /// Starts are spaced at least `min_interval` apart by advancing a
    /// watermark; an idle host starts immediately rather than catching up on
    /// missed slots. The first series to become active resets the bandwidth
    /// estimator.
    ///
    /// # Returns
    /// A guard holding the reserved start instant; dropping it ends the series.
    pub async fn begin_fetch_series(self: &Arc<Self>, min_interval: Duration) -> FetchSeries {
        let now = Instant::now();
        let start = {
            let mut state = self.state.lock();
            let start = match state.next_fetch_at {
                Some(next) if now < next => next,
                _ => now,
            };
            state.next_fetch_at = Some(start + min_interval);
            if state.active_series == 0 {
                state.reset_estimator();
            }
            state.active_series += 1;
            start
        };

        // Registered before sleeping so a cancelled sleep still ends the series.
        let series = FetchSeries {
            throttle: Arc::clone(self),
            started_at: start,
        };
        if start > now {
            log::debug!(
                "Waiting {}ms before fetching from '{}'",
                (start - now).as_millis(),
                self.host
            );
            tokio::time::sleep_until(start).await;
        }
        series
    }

    fn end_fetch_series(&self) {
        let mut state = self.state.lock();
        state.active_series = state.active_series.saturating_sub(1);
    }

    /// Number of fetch series currently active
    #[must_use]
    pub fn active_series(&self) -> usize {
        self.state.lock().active_series
    }

    /// Reserve bandwidth for reading up to `byte_count` bytes.
    ///
    /// The first read of a series proceeds at once and calibrates the rate
    /// estimate; reads arriving meanwhile wait for calibration to finish.
    /// Later reads sleep long enough that the series total stays under
    /// `min_ms_per_byte`.
    pub async fn begin_byte_read(
        self: &Arc<Self>,
        byte_count: usize,
        min_ms_per_byte: f64,
    ) -> ByteRead {
        let requested = i64::try_from(byte_count).unwrap_or(i64::MAX);
        loop {
            let notified = self.notify.notified();
            let wait = {
                let mut state = self.state.lock();
                let phase = state.phase;
                match phase {
                    EstimatePhase::InProgress => None,
                    EstimatePhase::Unknown => {
                        state.series_start = Some(Instant::now());
                        state.phase = EstimatePhase::InProgress;
                        state.total_bytes += requested;
                        return ByteRead {
                            throttle: Arc::clone(self),
                            requested,
                            calibrating: true,
                            finished: false,
                        };
                    }
                    EstimatePhase::Valid { ms_per_byte } => {
                        state.total_bytes += requested;
                        let now = Instant::now();
                        let series_start = *state.series_start.get_or_insert(now);
                        let desired_end_ms = state.total_bytes as f64 * min_ms_per_byte;
                        let estimated_ms = ms_per_byte * requested as f64;
                        let elapsed_ms = (now - series_start).as_secs_f64() * 1000.0;
                        let wait_ms = desired_end_ms - estimated_ms - elapsed_ms;
                        Some(if wait_ms > 0.0 {
                            Duration::from_secs_f64(wait_ms / 1000.0)
                        } else {
                            Duration::ZERO
                        })
                    }
                }
            };

            match wait {
                None => notified.await,
                Some(wait) => {
                    let read = ByteRead {
                        throttle: Arc::clone(self),
                        requested,
                        calibrating: false,
                        finished: false,
                    };
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    return read;
                }
            }
        }
    }

    fn end_byte_read(&self, requested: i64, actual: i64, calibrating: bool) {
        let mut state = self.state.lock();
        state.total_bytes += actual - requested;
        if calibrating && state.phase == EstimatePhase::InProgress {
            let elapsed_ms = state
                .series_start
                .map_or(0.0, |start| start.elapsed().as_secs_f64() * 1000.0);
            let ms_per_byte = if actual == 0 {
                0.0
            } else {
                elapsed_ms / actual as f64
            };
            state.phase = EstimatePhase::Valid { ms_per_byte };
            drop(state);
            self.notify.notify_waiters();
        }
    }

    fn abandon_byte_read(&self, requested: i64, calibrating: bool) {
        let mut state = self.state.lock();
        state.total_bytes -= requested;
        if calibrating && state.phase == EstimatePhase::InProgress {
            state.phase = EstimatePhase::Unknown;
            drop(state);
            self.notify.notify_waiters();
        }
    }

    /// Current estimator phase
    #[must_use]
    pub fn estimate_phase(&self) -> EstimatePhase {
        self.state.lock().phase
    }

    /// Whether this host can be forgotten: no connections, no series and
    /// no fetch slot reserved in the future.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.open_connections == 0
            && state.active_series == 0
            && state.next_fetch_at.is_none_or(|next| next <= Instant::now())
    }
}

/// A registered connection slot; released on drop.
#[derive(Debug)]
pub struct ConnectionSlot {
    throttle: Arc<HostThrottle>,
}

impl ConnectionSlot {
    #[must_use]
    pub fn throttle(&self) -> &Arc<HostThrottle> {
        &self.throttle
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.throttle.release_connection();
    }
}

/// An active fetch series; ends on drop.
#[derive(Debug)]
pub struct FetchSeries {
    throttle: Arc<HostThrottle>,
    started_at: Instant,
}

impl FetchSeries {
    /// The watermark slot this series was granted
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

impl Drop for FetchSeries {
    fn drop(&mut self) {
        self.throttle.end_fetch_series();
    }
}

/// A granted byte-read reservation.
///
/// Call [`ByteRead::finish`] with the number of bytes actually read. A
/// reservation dropped unfinished returns its bytes and, if it was
/// calibrating, lets the next reader calibrate instead.
#[derive(Debug)]
pub struct ByteRead {
    throttle: Arc<HostThrottle>,
    requested: i64,
    calibrating: bool,
    finished: bool,
}

impl ByteRead {
    #[must_use]
    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Settle the reservation against the bytes actually read.
    pub fn finish(mut self, actual: usize) {
        self.finished = true;
        let actual = i64::try_from(actual).unwrap_or(i64::MAX);
        self.throttle
            .end_byte_read(self.requested, actual, self.calibrating);
    }
}

impl Drop for ByteRead {
    fn drop(&mut self) {
        if !self.finished {
            self.throttle
                .abandon_byte_read(self.requested, self.calibrating);
        }
    }
}
