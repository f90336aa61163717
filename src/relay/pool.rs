//! Process-wide relay cache.
//!
//! The pool refreshes itself from a [`RelaySource`] when the last refresh is
//! older than the refresh interval, or when it is empty and the empty-pool
//! cooldown has passed. A refresh always stamps the time, even when the new
//! collection is empty. Refreshes are serialized by a gate so concurrent
//! callers that find the pool stale wait for the in-flight refresh instead of
//! starting their own.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use super::{RelayAddress, RelaySource};

/// Time source for refresh decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Default)]
struct PoolState {
    relays: Vec<RelayAddress>,
    last_refresh: Option<DateTime<Utc>>,
}

/// Point-in-time view of the pool for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub pool_size: usize,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_refresh: Option<DateTime<Utc>>,
    pub refresh_interval_secs: u64,
    pub refresh_count: u64,
}

pub struct RelayPool {
    source: Arc<dyn RelaySource>,
    clock: Arc<dyn Clock>,
    refresh_interval: chrono::Duration,
    empty_retry: chrono::Duration,
    state: RwLock<PoolState>,
    refresh_gate: Mutex<()>,
    refresh_count: AtomicU64,
}

impl RelayPool {
    pub fn new(source: Arc<dyn RelaySource>, refresh_interval: Duration, empty_retry: Duration) -> Self {
        Self::with_clock(source, Arc::new(SystemClock), refresh_interval, empty_retry)
    }

    pub fn with_clock(
        source: Arc<dyn RelaySource>,
        clock: Arc<dyn Clock>,
        refresh_interval: Duration,
        empty_retry: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            refresh_interval: to_chrono(refresh_interval),
            empty_retry: to_chrono(empty_retry),
            state: RwLock::new(PoolState::default()),
            refresh_gate: Mutex::new(()),
            refresh_count: AtomicU64::new(0),
        }
    }

    fn needs_refresh(&self, state: &PoolState, now: DateTime<Utc>) -> bool {
        let Some(last) = state.last_refresh else {
            return true;
        };

        let age = now - last;
        age > self.refresh_interval || (state.relays.is_empty() && age >= self.empty_retry)
    }

    /// Refresh from the source if the pool is stale or empty.
    ///
    /// Returns `true` when this call performed a collection.
    pub async fn ensure_fresh(&self) -> bool {
        {
            let state = self.state.read().await;
            if !self.needs_refresh(&state, self.clock.now()) {
                return false;
            }
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited on the gate
        {
            let state = self.state.read().await;
            if !self.needs_refresh(&state, self.clock.now()) {
                return false;
            }
        }

        let collected = self.source.collect().await;
        let mut relays: Vec<RelayAddress> = collected.into_iter().collect();
        relays.sort_unstable();

        let now = self.clock.now();
        let mut state = self.state.write().await;
        tracing::info!(
            previous = state.relays.len(),
            current = relays.len(),
            "relay pool refreshed"
        );
        state.relays = relays;
        state.last_refresh = Some(now);
        self.refresh_count.fetch_add(1, Ordering::Relaxed);

        true
    }

    /// Uniformly random relay after making sure the pool is fresh
    pub async fn pick_random(&self) -> Option<RelayAddress> {
        self.pick_random_excluding(&HashSet::new()).await
    }

    /// Uniformly random relay among those not in `exclude`
    pub async fn pick_random_excluding(&self, exclude: &HashSet<RelayAddress>) -> Option<RelayAddress> {
        self.ensure_fresh().await;

        let state = self.state.read().await;
        let candidates: Vec<&RelayAddress> = state
            .relays
            .iter()
            .filter(|relay| !exclude.contains(relay))
            .collect();

        candidates.choose(&mut rand::thread_rng()).map(|relay| **relay)
    }

    /// Up to `count` distinct relays chosen at random, without refreshing
    pub async fn sample(&self, count: usize) -> Vec<RelayAddress> {
        let state = self.state.read().await;
        state
            .relays
            .choose_multiple(&mut rand::thread_rng(), count)
            .copied()
            .collect()
    }

    /// Current contents, sorted
    pub async fn relays(&self) -> Vec<RelayAddress> {
        self.state.read().await.relays.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.relays.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_refresh
    }

    /// Number of collections performed since startup
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.read().await;
        PoolSnapshot {
            pool_size: state.relays.len(),
            last_refresh: state.last_refresh,
            next_refresh: state.last_refresh.map(|last| last + self.refresh_interval),
            refresh_interval_secs: self.refresh_interval.num_seconds().max(0) as u64,
            refresh_count: self.refresh_count(),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36500))
}
