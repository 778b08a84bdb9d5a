//! SOCKS proxy settings consumed by the HTTP layer.

use serde::{Deserialize, Serialize};

/// SOCKS5 proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Whether the proxy is used.
    pub enabled: bool,
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyConfig {
    /// Creates an enabled proxy configuration.
    pub fn socks5(host: impl Into<String>, port: u16) -> Self {
        Self {
            enabled: true,
            host: host.into(),
            port,
        }
    }

    /// Proxy URL, or `None` when disabled.
    ///
    /// Uses `socks5h` so host names resolve on the proxy side.
    pub fn url(&self) -> Option<String> {
        self.enabled
            .then(|| format!("socks5h://{}:{}", self.host, self.port))
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 1080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_has_no_url() {
        assert_eq!(ProxyConfig::default().url(), None);
    }

    #[test]
    fn test_enabled_url() {
        let proxy = ProxyConfig::socks5("10.0.0.2", 9050);
        assert_eq!(proxy.url().as_deref(), Some("socks5h://10.0.0.2:9050"));
    }
}
