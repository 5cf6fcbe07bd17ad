//! Per-host robots.txt cache with single-flight population
//!
//! Each host entry is either being populated by exactly one caller, or
//! read by any number of checkers. A populator waits until no checker
//! holds the old record; checkers wait until population is over. Both
//! roles are RAII guards, so a cancelled caller leaves the entry usable.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

use super::parser::{RobotsRecord, is_path_allowed, parse_robots_txt};
use crate::activities::{Activities, ActivityRecord};
use crate::fetch::{FetchContext, FetchError, FetchResult, FetchStatus, ThrottledFetcher, server_key};
use crate::utils::{
    ACTIVITY_ROBOTS_PARSE, FETCH_TYPE_ROBOTS, ROBOTS_FETCH_TIMEOUT_MS, ROBOTS_RETRY_MS,
    ROBOTS_VALIDITY_MS, now_millis,
};

const ROBOTS_FILE_NAME: &str = "/robots.txt";

#[derive(Debug, Default)]
struct RobotsState {
    valid: bool,
    invalid_at: Option<Instant>,
    records: Option<Vec<RobotsRecord>>,
    reading: bool,
    checking: usize,
}

impl RobotsState {
    fn expired(&self, now: Instant) -> bool {
        self.invalid_at.is_none_or(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct HostRobots {
    state: Mutex<RobotsState>,
    notify: Notify,
}

enum Role {
    Populate,
    Check(Option<Vec<RobotsRecord>>),
}

/// Ends a populate or check on drop and wakes waiters
struct RoleGuard<'a> {
    host: &'a HostRobots,
    populating: bool,
}

impl Drop for RoleGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.host.state.lock();
            if self.populating {
                state.reading = false;
            } else {
                state.checking = state.checking.saturating_sub(1);
            }
        }
        self.host.notify.notify_waiters();
    }
}

impl HostRobots {
    async fn enter(&self) -> (Role, RoleGuard<'_>) {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if !state.reading {
                    if !state.valid || state.expired(Instant::now()) {
                        if state.checking == 0 {
                            state.valid = false;
                            state.records = None;
                            state.reading = true;
                            return (
                                Role::Populate,
                                RoleGuard {
                                    host: self,
                                    populating: true,
                                },
                            );
                        }
                    } else {
                        state.checking += 1;
                        return (
                            Role::Check(state.records.clone()),
                            RoleGuard {
                                host: self,
                                populating: false,
                            },
                        );
                    }
                }
            }
            notified.await;
        }
    }

    fn can_be_flushed(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if state.reading || state.checking > 0 {
            return false;
        }
        if !state.valid {
            return true;
        }
        if state.expired(now) {
            state.valid = false;
            state.records = None;
            return true;
        }
        false
    }
}

/// robots.txt records for every host of one throttle group
#[derive(Debug)]
pub struct RobotsCache {
    hosts: DashMap<String, Arc<HostRobots>>,
    fetcher: Arc<ThrottledFetcher>,
}

impl RobotsCache {
    #[must_use]
    pub fn new(fetcher: Arc<ThrottledFetcher>) -> Self {
        Self {
            hosts: DashMap::new(),
            fetcher,
        }
    }

    /// Whether `context.user_agent` may fetch `target` according to its
    /// host's robots.txt, fetching that file first if the cached copy is
    /// missing or older than a day.
    ///
    /// # Errors
    /// A robots.txt that cannot be read yields a service interruption
    /// retried five minutes later; cancellation yields `Interrupted`.
    pub async fn is_fetch_allowed(
        &self,
        target: &Url,
        context: &FetchContext,
        activities: &dyn Activities,
    ) -> FetchResult<bool> {
        let server = server_key(target)?;
        let host = self
            .hosts
            .entry(server.clone())
            .or_insert_with(|| Arc::new(HostRobots::default()))
            .clone();

        let (role, _guard) = host.enter().await;
        let records = match role {
            Role::Check(records) => records,
            Role::Populate => {
                let fetched_at = Instant::now();
                let records = self.populate(target, &server, context, activities).await?;
                let mut state = host.state.lock();
                state.records.clone_from(&records);
                state.invalid_at = Some(fetched_at + Duration::from_millis(ROBOTS_VALIDITY_MS));
                state.valid = true;
                records
            }
        };

        Ok(records.is_none_or(|records| is_path_allowed(&records, &context.user_agent, target.path())))
    }

    async fn populate(
        &self,
        target: &Url,
        server: &str,
        context: &FetchContext,
        activities: &dyn Activities,
    ) -> FetchResult<Option<Vec<RobotsRecord>>> {
        let host_name = target.host_str().unwrap_or_default().to_string();
        let mut connection = self
            .fetcher
            .create_connection(
                target,
                context,
                Duration::from_millis(ROBOTS_FETCH_TIMEOUT_MS),
            )
            .await?;
        connection.begin_fetch(FETCH_TYPE_ROBOTS).await;

        let outcome: FetchResult<Option<Vec<RobotsRecord>>> = async {
            let status = connection
                .execute_fetch(ROBOTS_FILE_NAME, &context.user_agent, &context.from, None, None)
                .await?;
            match status {
                FetchStatus::Ok => {
                    let started = now_millis();
                    let body = connection
                        .response_body()?
                        .read_to_end()
                        .await
                        .map_err(|e| match e {
                            FetchError::Interrupted => FetchError::Interrupted,
                            _ => FetchError::ServiceInterruption {
                                message: format!("Couldn't fetch robots.txt from {server}"),
                                retry_at_ms: started + ROBOTS_RETRY_MS,
                                fail_at_ms: None,
                            },
                        })?;
                    let parsed = parse_robots_txt(&String::from_utf8_lossy(&body), &host_name);
                    activities.record_activity(ActivityRecord {
                        start_time_ms: started,
                        activity: ACTIVITY_ROBOTS_PARSE.to_string(),
                        byte_count: None,
                        entity: host_name.clone(),
                        result_code: parsed.outcome.result_code().to_string(),
                        result_description: parsed.outcome.description(),
                    });
                    Ok(parsed.records)
                }
                FetchStatus::SiteError => Ok(Some(vec![RobotsRecord::deny_all()])),
                FetchStatus::PageError | FetchStatus::NoChange => Ok(None),
            }
        }
        .await;

        connection.done_fetch(activities);
        connection.close();
        outcome
    }

    /// Evict hosts that are idle and hold no current record.
    pub fn poll(&self) {
        let now = Instant::now();
        self.hosts.retain(|_, host| !host.can_be_flushed(now));
    }

    /// Drop every cached record
    pub fn clear(&self) {
        self.hosts.clear();
    }

    #[must_use]
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}
