//! Throttle-group registry
//!
//! Connectors that share a throttle group share one [`ThrottledFetcher`]
//! and one [`RobotsCache`]. The registry hands out reference-counted
//! leases; the group is torn down when the last lease goes away. All
//! groups draw connection handles from the registry's single gate.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::handle_gate::HandleGate;
use crate::config::ConnectorConfig;
use crate::fetch::ThrottledFetcher;
use crate::robots::RobotsCache;

#[derive(Debug)]
struct GroupEntry {
    fetcher: Arc<ThrottledFetcher>,
    robots: Arc<RobotsCache>,
    leases: usize,
}

/// Owner of every live throttle group
#[derive(Debug, Clone)]
pub struct ThrottleRegistry {
    groups: Arc<Mutex<HashMap<String, GroupEntry>>>,
    gate: HandleGate,
}

impl ThrottleRegistry {
    /// # Arguments
    /// * `global_limit` - Outstanding connections allowed across every group
    #[must_use]
    pub fn new(global_limit: usize) -> Self {
        Self {
            groups: Arc::new(Mutex::new(HashMap::new())),
            gate: HandleGate::new(global_limit),
        }
    }

    /// Registry capped at `config`'s global connection limit
    #[must_use]
    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self::new(config.global_connection_limit())
    }

    /// Lease the fetcher and robots cache of `group`, creating them if this
    /// is the first lease.
    #[must_use]
    pub fn acquire(&self, group: &str) -> ThrottleGroupLease {
        let mut groups = self.groups.lock();
        let entry = groups.entry(group.to_string()).or_insert_with(|| {
            log::debug!("Creating throttle group '{group}'");
            let fetcher = Arc::new(ThrottledFetcher::with_gate(self.gate.clone()));
            let robots = Arc::new(RobotsCache::new(Arc::clone(&fetcher)));
            GroupEntry {
                fetcher,
                robots,
                leases: 0,
            }
        });
        entry.leases += 1;
        ThrottleGroupLease {
            registry: self.clone(),
            group: group.to_string(),
            fetcher: Arc::clone(&entry.fetcher),
            robots: Arc::clone(&entry.robots),
            released: false,
        }
    }

    /// The gate shared by every group
    #[must_use]
    pub fn gate(&self) -> &HandleGate {
        &self.gate
    }

    fn release(&self, group: &str) {
        let mut groups = self.groups.lock();
        let Some(entry) = groups.get_mut(group) else {
            return;
        };
        entry.leases = entry.leases.saturating_sub(1);
        if entry.leases == 0 {
            if let Some(entry) = groups.remove(group) {
                entry.robots.clear();
                log::debug!("Throttle group '{group}' released");
            }
        }
    }

    /// Number of leases currently held on `group`
    #[must_use]
    pub fn lease_count(&self, group: &str) -> usize {
        self.groups.lock().get(group).map_or(0, |entry| entry.leases)
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }
}

impl Default for ThrottleRegistry {
    fn default() -> Self {
        Self::new(crate::utils::DEFAULT_GLOBAL_CONNECTION_LIMIT)
    }
}

/// A held reference to one throttle group; released on drop
#[derive(Debug)]
pub struct ThrottleGroupLease {
    registry: ThrottleRegistry,
    group: String,
    fetcher: Arc<ThrottledFetcher>,
    robots: Arc<RobotsCache>,
    released: bool,
}

impl ThrottleGroupLease {
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn fetcher(&self) -> &Arc<ThrottledFetcher> {
        &self.fetcher
    }

    #[must_use]
    pub fn robots(&self) -> &Arc<RobotsCache> {
        &self.robots
    }

    /// Periodic housekeeping: expire stale robots records, forget idle hosts.
    pub fn poll(&self) {
        self.robots.poll();
        self.fetcher.poll();
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.group);
        }
    }
}

impl Drop for ThrottleGroupLease {
    fn drop(&mut self) {
        self.release_once();
    }
}
