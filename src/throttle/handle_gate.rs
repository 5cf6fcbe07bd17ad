//! Process-wide fetch handle cap
//!
//! Every open fetch connection holds one handle in addition to its per-host
//! slot, so the total number of outstanding connections across all hosts
//! stays bounded.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate; clones share one pool of handles.
#[derive(Debug, Clone)]
pub struct HandleGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl HandleGate {
    /// Create a gate admitting at most `limit` concurrent handles
    ///
    /// # Arguments
    /// * `limit` - Maximum outstanding handles (at least 1)
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a free handle.
    ///
    /// The handle returns to the gate when the permit drops.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => return permit,
                Err(_) => {
                    // Never closed; yield and retry rather than panic.
                    log::error!("Global handle gate was closed unexpectedly");
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Handles currently free
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for HandleGate {
    fn default() -> Self {
        Self::new(crate::utils::DEFAULT_GLOBAL_CONNECTION_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn gate_blocks_at_limit() {
        let gate = HandleGate::new(1);
        let held = gate.acquire().await;
        assert_eq!(gate.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(held);
        let _again = gate.acquire().await;
    }

    #[tokio::test]
    async fn clones_draw_from_one_pool() {
        let gate = HandleGate::new(1);
        let other = gate.clone();
        let _held = gate.acquire().await;
        assert_eq!(other.available(), 0);
        let blocked = tokio::time::timeout(Duration::from_millis(20), other.acquire()).await;
        assert!(blocked.is_err());
    }
}
