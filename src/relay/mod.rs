//! Third-party relay proxies used when YouTube blocks the service's own address.
//!
//! - [`source`]: collects candidate `host:port` lines from public proxy lists
//! - [`pool`]: process-wide cache of candidates with a staleness-based refresh
//! - [`validator`]: liveness probes routed through a candidate relay

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

pub mod pool;
pub mod source;
pub mod validator;

pub use pool::{Clock, PoolSnapshot, RelayPool, SystemClock};
pub use source::{HttpRelaySource, RelaySource};
pub use validator::{HttpRelayValidator, RelayProbe};

fn relay_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3}):(\d{1,5})$")
            .expect("valid relay address regex")
    })
}

/// Reasons a `host:port` line is rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayParseError {
    #[error("not a host:port address: {0:?}")]
    Format(String),

    #[error("IPv4 octet out of range in {0:?}")]
    Octet(String),

    #[error("port out of range in {0:?}")]
    Port(String),
}

/// An IPv4 relay endpoint. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayAddress {
    host: Ipv4Addr,
    port: u16,
}

impl RelayAddress {
    pub fn new(host: Ipv4Addr, port: u16) -> Result<Self, RelayParseError> {
        if port == 0 {
            return Err(RelayParseError::Port(format!("{}:{}", host, port)));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Proxy URL understood by the HTTP client for both plain and TLS targets
    pub fn proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for RelayAddress {
    type Err = RelayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let caps = relay_line_regex()
            .captures(line)
            .ok_or_else(|| RelayParseError::Format(line.to_string()))?;

        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = caps[i + 1]
                .parse::<u8>()
                .map_err(|_| RelayParseError::Octet(line.to_string()))?;
        }

        let port = caps[5]
            .parse::<u16>()
            .map_err(|_| RelayParseError::Port(line.to_string()))?;

        Self::new(Ipv4Addr::from(octets), port).map_err(|_| RelayParseError::Port(line.to_string()))
    }
}
