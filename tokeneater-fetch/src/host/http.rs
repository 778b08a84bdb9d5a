//! HTTP client with tracing and optional SOCKS proxy.

use std::time::Duration;

use reqwest::{Client, Proxy, Response, header};
use tokeneater_core::ProxyConfig;
use tracing::{debug, instrument};

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for `TokenEater`.
const USER_AGENT: &str = concat!("TokenEater/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and proxy support.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    proxied: bool,
}

impl HttpClient {
    /// Creates a direct client with default settings.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Request` if the TLS backend cannot initialise.
    pub fn new() -> Result<Self, HttpError> {
        Self::builder().build()
    }

    /// Starts a builder.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Returns true if requests go through a proxy.
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    /// Performs a GET request with an authorization header and extra headers.
    #[instrument(skip(self, auth_header, headers), fields(url = %url, proxied = self.proxied))]
    pub async fn get_with_auth(
        &self,
        url: &str,
        auth_header: &str,
        headers: &[(&str, &str)],
    ) -> Result<Response, HttpError> {
        debug!("GET request with auth");

        let mut request = self.inner.get(url).header(header::AUTHORIZATION, auth_header);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    timeout: Duration,
    proxy: Option<ProxyConfig>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            proxy: None,
        }
    }
}

impl HttpClientBuilder {
    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Routes requests through a proxy when it is enabled.
    #[must_use]
    pub fn proxy(mut self, proxy: Option<&ProxyConfig>) -> Self {
        self.proxy = proxy.filter(|p| p.enabled).cloned();
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::Proxy` for an unusable proxy address and
    /// `HttpError::Request` if the client cannot be constructed.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        let proxied = match self.proxy.as_ref().and_then(ProxyConfig::url) {
            Some(url) => {
                debug!(proxy = %url, "Using SOCKS proxy");
                let proxy = Proxy::all(&url).map_err(|e| HttpError::Proxy(e.to_string()))?;
                builder = builder.proxy(proxy);
                true
            }
            None => false,
        };

        Ok(HttpClient {
            inner: builder.build()?,
            proxied,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_proxy_is_direct() {
        let client = HttpClient::builder()
            .proxy(Some(&ProxyConfig::default()))
            .build()
            .unwrap();
        assert!(!client.is_proxied());
    }

    #[test]
    fn test_enabled_proxy() {
        let proxy = ProxyConfig::socks5("127.0.0.1", 1080);
        let client = HttpClient::builder().proxy(Some(&proxy)).build().unwrap();
        assert!(client.is_proxied());
    }
}
