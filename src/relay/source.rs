use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;

use super::RelayAddress;
use crate::config::RelayConfig;
use crate::Result;

/// Supplier of candidate relays.
///
/// Collection never fails: an unreachable list simply contributes nothing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelaySource: Send + Sync {
    /// Gather a de-duplicated set of candidate relays
    async fn collect(&self) -> HashSet<RelayAddress>;
}

/// Pulls plaintext `host:port` lists from public HTTP endpoints
pub struct HttpRelaySource {
    client: Client,
    sources: Vec<String>,
    per_source_limit: usize,
}

impl HttpRelaySource {
    pub fn new(sources: Vec<String>, per_source_limit: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            sources,
            per_source_limit,
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Self::new(
            config.sources.clone(),
            config.per_source_limit,
            Duration::from_secs(config.source_timeout_secs),
        )
    }

    /// Fetch a single list, treating any failure as an empty contribution
    async fn fetch_list(&self, url: &str) -> Vec<RelayAddress> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(source = %url, error = %e, "relay list request failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(source = %url, status = %response.status(), "relay list returned non-success status");
            return Vec::new();
        }

        match response.text().await {
            Ok(body) => {
                let relays = parse_relay_list(&body, self.per_source_limit);
                tracing::debug!(source = %url, count = relays.len(), "relay list fetched");
                relays
            }
            Err(e) => {
                tracing::warn!(source = %url, error = %e, "failed to read relay list body");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RelaySource for HttpRelaySource {
    async fn collect(&self) -> HashSet<RelayAddress> {
        let lists = join_all(self.sources.iter().map(|url| self.fetch_list(url))).await;
        let relays: HashSet<RelayAddress> = lists.into_iter().flatten().collect();

        tracing::info!(
            sources = self.sources.len(),
            relays = relays.len(),
            "collected relay candidates"
        );

        relays
    }
}

/// Parse the first `limit` lines of a plaintext list, keeping valid `host:port` entries
pub fn parse_relay_list(body: &str, limit: usize) -> Vec<RelayAddress> {
    body.lines()
        .take(limit)
        .filter_map(|line| line.trim().parse::<RelayAddress>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a fixed plaintext list on a local port and return its URL
    async fn spawn_list_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        status_line,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://127.0.0.1:{}/list.txt", port)
    }

    /// A local URL with nothing listening behind it
    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/list.txt", port)
    }

    #[test]
    fn parse_keeps_only_well_formed_lines() {
        let body = "1.2.3.4:80\n  5.6.7.8:3128  \r\nnot-a-proxy\n300.1.1.1:80\n9.9.9.9:8080\n";
        let relays = parse_relay_list(body, 20);

        let rendered: Vec<String> = relays.iter().map(|r| r.to_string()).collect();
        assert_eq!(rendered, vec!["1.2.3.4:80", "5.6.7.8:3128", "9.9.9.9:8080"]);
    }

    #[test]
    fn parse_only_considers_the_line_prefix() {
        let body = (1..=40)
            .map(|i| format!("10.0.0.{}:8080", i))
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(parse_relay_list(&body, 15).len(), 15);
        // Invalid lines inside the prefix still count against the limit
        let body = format!("garbage\ngarbage\n{}", body);
        assert_eq!(parse_relay_list(&body, 15).len(), 13);
    }

    #[test]
    fn parse_handles_empty_body() {
        assert!(parse_relay_list("", 20).is_empty());
    }

    #[tokio::test]
    async fn unreachable_sources_yield_an_empty_set() {
        let source = HttpRelaySource::new(
            vec![
                "http://127.0.0.1:9/list.txt".to_string(),
                "not a url".to_string(),
            ],
            20,
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(source.collect().await.is_empty());
    }

    #[tokio::test]
    async fn collect_unions_working_lists_and_skips_failing_ones() {
        let first = spawn_list_server("200 OK", "1.1.1.1:80\n2.2.2.2:8080\n").await;
        let second = spawn_list_server("200 OK", "2.2.2.2:8080\n3.3.3.3:3128\nnot-a-relay\n").await;
        let failing = spawn_list_server("503 Service Unavailable", "9.9.9.9:80\n").await;
        let dead = closed_port_url().await;

        let source =
            HttpRelaySource::new(vec![first, failing, dead, second], 20, Duration::from_secs(5)).unwrap();
        let relays = source.collect().await;

        let mut rendered: Vec<String> = relays.iter().map(|r| r.to_string()).collect();
        rendered.sort();
        assert_eq!(rendered, vec!["1.1.1.1:80", "2.2.2.2:8080", "3.3.3.3:3128"]);
    }

    #[tokio::test]
    async fn collect_applies_the_limit_per_list() {
        let first = spawn_list_server("200 OK", "1.1.1.1:80\n1.1.1.2:80\n1.1.1.3:80\n").await;
        let second = spawn_list_server("200 OK", "2.2.2.1:80\n2.2.2.2:80\n2.2.2.3:80\n").await;

        let source = HttpRelaySource::new(vec![first, second], 2, Duration::from_secs(5)).unwrap();
        let relays = source.collect().await;

        assert_eq!(relays.len(), 4);
        assert!(relays.contains(&"1.1.1.2:80".parse::<RelayAddress>().unwrap()));
        assert!(!relays.contains(&"1.1.1.3:80".parse::<RelayAddress>().unwrap()));
        assert!(!relays.contains(&"2.2.2.3:80".parse::<RelayAddress>().unwrap()));
    }
}
