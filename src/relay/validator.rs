use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::RelayAddress;
use crate::config::ValidatorConfig;
use crate::net::{random_user_agent, Transport};

/// Liveness checks performed through a candidate relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayProbe: Send + Sync {
    /// True when any generic probe endpoint answers 200 through the relay
    async fn is_reachable(&self, relay: &RelayAddress) -> bool;

    /// True when the target site itself answers 200 through the relay
    async fn is_compatible_with_target(&self, relay: &RelayAddress) -> bool;
}

/// Probes relays with plain GET requests against IP-echo and target endpoints
pub struct HttpRelayValidator {
    probe_urls: Vec<String>,
    target_probe_url: String,
    timeout: Duration,
}

impl HttpRelayValidator {
    pub fn new(probe_urls: Vec<String>, target_probe_url: String, timeout: Duration) -> Self {
        Self {
            probe_urls,
            target_probe_url,
            timeout,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.probe_urls.clone(),
            config.target_probe_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn probe(&self, relay: &RelayAddress, url: &str) -> bool {
        let transport = match Transport::via_relay(*relay, self.timeout, random_user_agent()) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::debug!(relay = %relay, error = %e, "could not build relay client");
                return false;
            }
        };

        match transport.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::debug!(relay = %relay, probe = %url, "relay probe succeeded");
                true
            }
            Ok(response) => {
                tracing::debug!(relay = %relay, probe = %url, status = %response.status(), "relay probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!(relay = %relay, probe = %url, error = %e, "relay probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl RelayProbe for HttpRelayValidator {
    async fn is_reachable(&self, relay: &RelayAddress) -> bool {
        for url in &self.probe_urls {
            if self.probe(relay, url).await {
                return true;
            }
        }
        false
    }

    async fn is_compatible_with_target(&self, relay: &RelayAddress) -> bool {
        self.probe(relay, &self.target_probe_url).await
    }
}
