use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Relay list sources and refresh policy
    pub relays: RelayConfig,

    /// Relay liveness probing
    pub validator: ValidatorConfig,

    /// Direct fetch and relay fallback behaviour
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP service binds to
    pub bind_addr: String,

    /// Name reported by the health endpoint
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Plaintext `host:port` list endpoints
    pub sources: Vec<String>,

    /// Lines considered from the top of each list
    pub per_source_limit: usize,

    /// Timeout for each list request
    pub source_timeout_secs: u64,

    /// Maximum pool age before a refresh
    pub refresh_interval_secs: u64,

    /// Minimum wait between refreshes while the pool is empty; 0 re-collects on every call that finds it empty
    pub empty_retry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// IP-echo endpoints used to check a relay works at all
    pub probe_urls: Vec<String>,

    /// Target-site path used to check a relay is not itself blocked
    pub target_probe_url: String,

    /// Timeout for each probe
    pub timeout_secs: u64,

    /// Relays probed by the status endpoint
    pub status_sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Relay attempts after a blocked direct fetch (capped by pool size)
    pub max_relay_attempts: usize,

    /// Lower bound of the random pause before a relayed retry
    pub min_delay_ms: u64,

    /// Upper bound of the random pause before a relayed retry
    pub max_delay_ms: u64,

    /// Timeout for each upstream caption request
    pub request_timeout_secs: u64,

    /// Validate relays against the target site instead of the IP-echo probes
    pub validate_against_target: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            service_name: "youtube-transcript-api".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                "https://api.proxyscrape.com/v2/?request=get&protocol=http&timeout=10000&country=all&ssl=all&anonymity=all".to_string(),
                "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt".to_string(),
                "https://raw.githubusercontent.com/clarketm/proxy-list/master/proxy-list-raw.txt".to_string(),
            ],
            per_source_limit: 20,
            source_timeout_secs: 10,
            refresh_interval_secs: 3600,
            empty_retry_secs: 0,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            probe_urls: vec![
                "http://httpbin.org/ip".to_string(),
                "https://api.ipify.org?format=json".to_string(),
            ],
            target_probe_url: "https://www.youtube.com/robots.txt".to_string(),
            timeout_secs: 10,
            status_sample_size: 5,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_relay_attempts: 3,
            min_delay_ms: 1000,
            max_delay_ms: 3000,
            request_timeout_secs: 20,
            validate_against_target: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, the default locations, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => Self::config_path()?,
        };

        let config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            tracing::debug!(path = %config_path.display(), "configuration loaded");
            config
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-relay").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.trim().is_empty() {
            anyhow::bail!("server.bind_addr must not be empty");
        }

        if !(15..=30).contains(&self.relays.per_source_limit) {
            anyhow::bail!("relays.per_source_limit must be between 15 and 30");
        }
        if !(10..=15).contains(&self.relays.source_timeout_secs) {
            anyhow::bail!("relays.source_timeout_secs must be between 10 and 15");
        }
        if self.relays.refresh_interval_secs == 0 {
            anyhow::bail!("relays.refresh_interval_secs must be positive");
        }
        for source in &self.relays.sources {
            url::Url::parse(source)
                .with_context(|| format!("relays.sources contains an invalid URL: {}", source))?;
        }

        if !(8..=10).contains(&self.validator.timeout_secs) {
            anyhow::bail!("validator.timeout_secs must be between 8 and 10");
        }
        for probe in self.validator.probe_urls.iter().chain([&self.validator.target_probe_url]) {
            url::Url::parse(probe)
                .with_context(|| format!("validator contains an invalid probe URL: {}", probe))?;
        }

        if !(3..=5).contains(&self.fetch.max_relay_attempts) {
            anyhow::bail!("fetch.max_relay_attempts must be between 3 and 5");
        }
        if self.fetch.min_delay_ms > self.fetch.max_delay_ms {
            anyhow::bail!("fetch.min_delay_ms must not exceed fetch.max_delay_ms");
        }
        if !(8..=20).contains(&self.fetch.request_timeout_secs) {
            anyhow::bail!("fetch.request_timeout_secs must be between 8 and 20");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Bind Address: {}", self.server.bind_addr);
        println!("  Service Name: {}", self.server.service_name);
        println!("  Relay Sources:");
        for source in &self.relays.sources {
            println!("    • {}", source);
        }
        println!("  Lines Per Source: {}", self.relays.per_source_limit);
        println!("  Pool Refresh: every {}s", self.relays.refresh_interval_secs);
        println!("  Probe URLs: {}", self.validator.probe_urls.join(", "));
        println!("  Target Probe: {}", self.validator.target_probe_url);
        println!("  Relay Attempts: {}", self.fetch.max_relay_attempts);
        println!(
            "  Retry Delay: {}-{}ms",
            self.fetch.min_delay_ms, self.fetch.max_delay_ms
        );
        println!(
            "  Validation: {}",
            if self.fetch.validate_against_target { "target probe" } else { "IP-echo probes" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.relays.refresh_interval_secs, 3600);
        assert_eq!(config.relays.empty_retry_secs, 0);
        assert_eq!(config.fetch.max_relay_attempts, 3);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config = serde_yaml::from_str("fetch:\n  max_relay_attempts: 5\n").unwrap();
        assert_eq!(config.fetch.max_relay_attempts, 5);
        assert_eq!(config.fetch.min_delay_ms, 1000);
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.relays.sources.len(), 3);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.fetch.max_relay_attempts = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.relays.per_source_limit = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.min_delay_ms = 5000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.validator.probe_urls.push("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.server.bind_addr = "127.0.0.1:8080".to_string();
        config.fetch.validate_against_target = true;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.server.bind_addr, "127.0.0.1:8080");
        assert!(loaded.fetch.validate_against_target);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
