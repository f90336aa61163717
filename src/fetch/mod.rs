//! Direct fetch with relay fallback.
//!
//! A request first goes out directly. Only a failure classified as blocking
//! enters the relay path, which draws relays from the shared pool without
//! replacement, validates each one, and retries through it. Every attempt uses
//! its own [`Transport`], so nothing leaks between attempts or into other
//! in-flight requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

pub mod classify;

pub use classify::{classify_failure, FailureKind};

use crate::captions::{CaptionFetcher, CaptionSegment};
use crate::config::FetchConfig;
use crate::net::{random_user_agent, Transport};
use crate::relay::{RelayAddress, RelayPool, RelayProbe};

/// Terminal result of one transcript request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(Vec<CaptionSegment>),
    /// Direct fetch was blocked and every relay attempt failed
    Blocked {
        relays_tried: usize,
        pool_size: usize,
        last_error: String,
    },
    /// Captions are disabled or absent for the video
    Unavailable(String),
    OtherError(String),
}

/// Tunables for the relay fallback path
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub max_relay_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub request_timeout: Duration,
    pub validate_against_target: bool,
}

impl From<&FetchConfig> for FetchSettings {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_relay_attempts: config.max_relay_attempts,
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            validate_against_target: config.validate_against_target,
        }
    }
}

pub struct FetchOrchestrator {
    fetcher: Arc<dyn CaptionFetcher>,
    pool: Arc<RelayPool>,
    probe: Arc<dyn RelayProbe>,
    direct: Transport,
    settings: FetchSettings,
}

impl FetchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn CaptionFetcher>,
        pool: Arc<RelayPool>,
        probe: Arc<dyn RelayProbe>,
        settings: FetchSettings,
    ) -> crate::Result<Self> {
        let direct = Transport::direct(settings.request_timeout)?;

        Ok(Self {
            fetcher,
            pool,
            probe,
            direct,
            settings,
        })
    }

    pub fn pool(&self) -> &Arc<RelayPool> {
        &self.pool
    }

    /// Fetch captions for `video_id`, falling back to relays when blocked
    pub async fn fetch_with_fallback(&self, video_id: &str) -> FetchOutcome {
        let error = match self.fetcher.fetch(video_id, &self.direct).await {
            Ok(segments) => {
                tracing::info!(video_id = %video_id, segments = segments.len(), "direct fetch succeeded");
                return FetchOutcome::Success(segments);
            }
            Err(e) => e.to_string(),
        };

        match classify_failure(&error) {
            FailureKind::Unavailable => {
                tracing::info!(video_id = %video_id, error = %error, "transcript unavailable");
                FetchOutcome::Unavailable(error)
            }
            FailureKind::Other => {
                tracing::warn!(video_id = %video_id, error = %error, "direct fetch failed");
                FetchOutcome::OtherError(error)
            }
            FailureKind::Blocked => {
                tracing::warn!(video_id = %video_id, error = %error, "direct fetch blocked, trying relays");
                self.fetch_via_relays(video_id, error).await
            }
        }
    }

    async fn fetch_via_relays(&self, video_id: &str, mut last_error: String) -> FetchOutcome {
        self.pool.ensure_fresh().await;
        let pool_size = self.pool.len().await;
        let attempts = self.settings.max_relay_attempts.min(pool_size);

        let mut tried: HashSet<RelayAddress> = HashSet::new();

        for attempt in 1..=attempts {
            let Some(relay) = self.pool.pick_random_excluding(&tried).await else {
                tracing::debug!(video_id = %video_id, "relay pool exhausted");
                break;
            };
            tried.insert(relay);

            // A relay that fails validation still uses up its attempt
            if !self.validate(&relay).await {
                tracing::debug!(video_id = %video_id, relay = %relay, attempt, "relay failed validation");
                continue;
            }

            let transport =
                match Transport::via_relay(relay, self.settings.request_timeout, random_user_agent()) {
                    Ok(transport) => transport,
                    Err(e) => {
                        tracing::warn!(relay = %relay, error = %e, "could not build relay transport");
                        continue;
                    }
                };

            self.pause_before_retry().await;

            match self.fetcher.fetch(video_id, &transport).await {
                Ok(segments) => {
                    tracing::info!(
                        video_id = %video_id,
                        relay = %relay,
                        attempt,
                        segments = segments.len(),
                        "relay fetch succeeded"
                    );
                    return FetchOutcome::Success(segments);
                }
                Err(e) => {
                    let message = e.to_string();
                    // Reaching YouTube and hearing "no captions" is a definitive answer
                    if classify_failure(&message) == FailureKind::Unavailable {
                        tracing::info!(video_id = %video_id, relay = %relay, error = %message, "transcript unavailable");
                        return FetchOutcome::Unavailable(message);
                    }
                    tracing::debug!(video_id = %video_id, relay = %relay, attempt, error = %message, "relay fetch failed");
                    last_error = message;
                }
            }
        }

        tracing::warn!(
            video_id = %video_id,
            relays_tried = tried.len(),
            pool_size,
            "all relay attempts exhausted"
        );

        FetchOutcome::Blocked {
            relays_tried: tried.len(),
            pool_size,
            last_error,
        }
    }

    async fn validate(&self, relay: &RelayAddress) -> bool {
        if self.settings.validate_against_target {
            self.probe.is_compatible_with_target(relay).await
        } else {
            self.probe.is_reachable(relay).await
        }
    }

    async fn pause_before_retry(&self) {
        let delay = random_delay(self.settings.min_delay, self.settings.max_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}
