//! Per-call network configuration.
//!
//! Every outbound request is made through a [`Transport`] value handed to the
//! caller, so routing a fetch through a relay never touches state shared with
//! other in-flight requests.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy, RequestBuilder};

use crate::relay::RelayAddress;

/// Desktop browser user agents rotated across relay attempts
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Pick a user agent uniformly at random
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// HTTP client bundled with the routing and identity it was built for
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    relay: Option<RelayAddress>,
    user_agent: String,
}

impl Transport {
    /// Unmodified network configuration: no relay, default user agent
    pub fn direct(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            relay: None,
            user_agent: USER_AGENTS[0].to_string(),
        })
    }

    /// Route both `http` and `https` traffic through `relay`
    pub fn via_relay(
        relay: RelayAddress,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let proxy = Proxy::all(relay.proxy_url())?;
        let client = Client::builder().proxy(proxy).timeout(timeout).build()?;

        Ok(Self {
            client,
            relay: Some(relay),
            user_agent: user_agent.into(),
        })
    }

    pub fn relay(&self) -> Option<RelayAddress> {
        self.relay
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET with this transport's browser identity applied
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, DEFAULT_ACCEPT_LANGUAGE)
    }

    /// POST with this transport's browser identity applied
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client
            .post(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, DEFAULT_ACCEPT_LANGUAGE)
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self.relay {
            Some(relay) => format!("relay {}", relay),
            None => "direct".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_comes_from_the_rotation() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn direct_transport_has_no_relay() {
        let transport = Transport::direct(Duration::from_secs(5)).unwrap();
        assert!(transport.relay().is_none());
        assert_eq!(transport.describe(), "direct");
        assert_eq!(transport.user_agent(), USER_AGENTS[0]);
    }

    #[test]
    fn relay_transport_keeps_its_own_identity() {
        let relay: RelayAddress = "198.51.100.4:3128".parse().unwrap();
        let transport =
            Transport::via_relay(relay, Duration::from_secs(5), USER_AGENTS[3]).unwrap();

        assert_eq!(transport.relay(), Some(relay));
        assert_eq!(transport.user_agent(), USER_AGENTS[3]);
        assert_eq!(transport.describe(), "relay 198.51.100.4:3128");
    }
}
