//! Configuration shared by the gateway and its tooling

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Location of the HTTP execution backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// `http` or `https`
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Connection timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout; 0 leaves the request unbounded
    #[serde(default)]
    pub request_timeout_secs: u64,
    /// Max idle connections per host
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_pool_max_idle() -> usize {
    16
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: "localhost".to_string(),
            port: 6300,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: 0,
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

impl BackendSettings {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Base URL every backend endpoint hangs off
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let settings = BackendSettings::new("https", "engine.internal", 443);
        assert_eq!(settings.base_url(), "https://engine.internal:443");
    }

    #[test]
    fn test_request_timeout_zero_is_unbounded() {
        let mut settings = BackendSettings::default();
        assert!(settings.request_timeout().is_none());
        settings.request_timeout_secs = 30;
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let settings: BackendSettings =
            serde_json::from_str(r#"{"host":"engine","port":6300}"#).unwrap();
        assert_eq!(settings.protocol, "http");
        assert_eq!(settings.connect_timeout_secs, 10);
        assert_eq!(settings.request_timeout_secs, 0);
    }
}
