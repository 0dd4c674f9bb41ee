//! Resolver configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Default polling interval of DNS watchers.
pub(crate) const DEFAULT_FREQ: Duration = Duration::from_secs(30 * 60);

/// Default port for targets without one.
pub(crate) const DEFAULT_PORT: u16 = 443;

/// Configuration for DNS watchers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Interval between two polls of the name servers.
    #[serde(rename = "freq_secs", deserialize_with = "duration_from_secs")]
    pub freq: Duration,

    /// Port used when the target does not carry one.
    pub default_port: u16,

    /// Service label of the SRV query (`_<service>._<proto>.<host>`).
    pub srv_service: String,

    /// Protocol label of the SRV query.
    pub srv_proto: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            freq: DEFAULT_FREQ,
            default_port: DEFAULT_PORT,
            srv_service: "spine".to_string(),
            srv_proto: "tcp".to_string(),
        }
    }
}

impl DnsConfig {
    /// Create a new DNS configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the polling interval.
    #[must_use]
    pub fn freq(mut self, freq: Duration) -> Self {
        self.freq = freq;
        self
    }

    /// Set the default port.
    #[must_use]
    pub fn default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    /// Set the SRV service and protocol labels.
    #[must_use]
    pub fn srv(mut self, service: impl Into<String>, proto: impl Into<String>) -> Self {
        self.srv_service = service.into();
        self.srv_proto = proto.into();
        self
    }
}

/// Configuration for a naming [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Scheme applied to names that carry none.
    pub default_scheme: String,

    /// Settings of the `dns` scheme.
    pub dns: DnsConfig,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            default_scheme: "passthrough".to_string(),
            dns: DnsConfig::default(),
        }
    }
}

impl NamingConfig {
    /// Create a new naming configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default scheme.
    #[must_use]
    pub fn default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    /// Set the DNS configuration.
    #[must_use]
    pub fn dns(mut self, dns: DnsConfig) -> Self {
        self.dns = dns;
        self
    }
}

fn duration_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}
