//! Remote usage client.
//!
//! # API Endpoint
//!
//! ```text
//! GET https://api.anthropic.com/api/oauth/usage
//! Authorization: Bearer <access_token>
//! anthropic-beta: oauth-2025-04-20
//! ```
//!
//! # Response Format
//!
//! ```json
//! {
//!   "five_hour": {"utilization": 25.0, "resets_at": "2025-01-01T12:00:00.394Z"},
//!   "seven_day": {"utilization": 45.0, "resets_at": "2025-01-05T00:00:00Z"},
//!   "seven_day_sonnet": {"utilization": 30.0, "resets_at": null},
//!   "extra_usage": {"is_enabled": false}
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokeneater_core::{Credential, ProxyConfig, UsageSnapshot};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::host::http::HttpClient;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the Anthropic API.
pub const API_BASE_URL: &str = "https://api.anthropic.com";

/// Usage endpoint path.
pub const USAGE_PATH: &str = "/api/oauth/usage";

/// API-version header name.
pub const BETA_HEADER: &str = "anthropic-beta";

/// API-version header value.
pub const BETA_VERSION: &str = "oauth-2025-04-20";

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Connection Test
// ============================================================================

/// Outcome of a connection test, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTestResult {
    /// Whether the token was accepted and usage decoded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
}

impl ConnectionTestResult {
    /// Summarises a fetch outcome.
    pub fn from_fetch(result: &Result<UsageSnapshot, FetchError>) -> Self {
        match result {
            Ok(snapshot) => {
                let session = snapshot
                    .five_hour
                    .as_ref()
                    .map_or(0, tokeneater_core::UsageBucket::whole_percent);
                Self {
                    success: true,
                    message: format!("Connected. Session usage at {session}%"),
                }
            }
            Err(FetchError::AuthFailure { status }) => Self {
                success: false,
                message: format!("Token expired or rejected (HTTP {status})"),
            },
            Err(FetchError::Http(code)) => Self {
                success: false,
                message: format!("Unexpected HTTP status {code}"),
            },
            Err(FetchError::MalformedResponse(_)) => Self {
                success: false,
                message: "Unsupported plan: no usage data in response".to_string(),
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Client Trait
// ============================================================================

/// Stateless fetch of a usage snapshot.
#[async_trait]
pub trait RemoteUsageClient: Send + Sync {
    /// Fetches the current snapshot.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` for 401/403
    /// - `Http(code)` for any other non-2xx
    /// - `Network` for transport failures
    /// - `MalformedResponse` when no bucket decodes
    async fn fetch(
        &self,
        credential: &Credential,
        proxy: Option<&ProxyConfig>,
    ) -> Result<UsageSnapshot, FetchError>;

    /// Fetches once and summarises the outcome.
    async fn test_connection(
        &self,
        credential: &Credential,
        proxy: Option<&ProxyConfig>,
    ) -> ConnectionTestResult {
        ConnectionTestResult::from_fetch(&self.fetch(credential, proxy).await)
    }
}

// ============================================================================
// Anthropic Client
// ============================================================================

/// Production client for the OAuth usage endpoint.
#[derive(Debug, Clone)]
pub struct AnthropicUsageClient {
    base_url: String,
    timeout: Duration,
}

impl Default for AnthropicUsageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicUsageClient {
    /// Creates a client for the public API.
    pub fn new() -> Self {
        Self::with_base_url(API_BASE_URL)
    }

    /// Creates a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the base URL does not parse.
    pub fn endpoint(&self) -> Result<Url, FetchError> {
        Url::parse(&self.base_url)
            .and_then(|base| base.join(USAGE_PATH))
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }
}

#[async_trait]
impl RemoteUsageClient for AnthropicUsageClient {
    #[instrument(skip(self, credential, proxy))]
    async fn fetch(
        &self,
        credential: &Credential,
        proxy: Option<&ProxyConfig>,
    ) -> Result<UsageSnapshot, FetchError> {
        let url = self.endpoint()?;
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()?;

        debug!(url = %url, proxied = http.is_proxied(), "Fetching usage");

        let response = http
            .get_with_auth(
                url.as_str(),
                &credential.authorization_header(),
                &[(BETA_HEADER, BETA_VERSION)],
            )
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            warn!(status = %status, "Credential rejected");
            return Err(FetchError::AuthFailure {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            warn!(status = %status, "Unexpected status from usage endpoint");
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = response.bytes().await?;
        let mut snapshot = UsageSnapshot::from_json_slice(&body)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        snapshot.sanitize();

        let buckets = snapshot.bucket_count();
        let snapshot = snapshot.non_empty().ok_or_else(|| {
            FetchError::MalformedResponse("no decodable usage bucket".to_string())
        })?;

        debug!(buckets, "Usage decoded");
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(USAGE_PATH))
            .and(header("authorization", "Bearer tok"))
            .and(header(BETA_HEADER, BETA_VERSION))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    async fn fetch_from(server: &MockServer) -> Result<UsageSnapshot, FetchError> {
        AnthropicUsageClient::with_base_url(server.uri())
            .fetch(&Credential::token("tok"), None)
            .await
    }

    #[tokio::test]
    async fn test_success_decodes_tolerantly() {
        let server = serve(
            200,
            r#"{
                "five_hour": {"utilization": 42.0, "resets_at": "2025-01-01T12:00:00.394Z"},
                "seven_day": {"utilization": "oops"},
                "brand_new_field": [1, 2, 3]
            }"#,
        )
        .await;

        let snapshot = fetch_from(&server).await.unwrap();
        assert!(snapshot.five_hour.is_some());
        assert!(snapshot.seven_day.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_utilization_is_clamped() {
        let server = serve(
            200,
            r#"{"five_hour": {"utilization": 112.5}, "seven_day": {"utilization": -4}}"#,
        )
        .await;

        let snapshot = fetch_from(&server).await.unwrap();
        let five_hour = snapshot.five_hour.unwrap();
        let seven_day = snapshot.seven_day.unwrap();
        assert!((five_hour.utilization - 100.0).abs() < f64::EPSILON);
        assert!(seven_day.utilization.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_401_and_403_are_auth_failures() {
        for status in [401, 403] {
            let server = serve(status, "{}").await;
            let err = fetch_from(&server).await.unwrap_err();
            assert!(matches!(err, FetchError::AuthFailure { status: s } if s == status));
        }
    }

    #[tokio::test]
    async fn test_other_status_is_http_error() {
        let server = serve(503, "unavailable").await;
        assert!(matches!(
            fetch_from(&server).await.unwrap_err(),
            FetchError::Http(503)
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_is_malformed() {
        let server = serve(200, r#"{"extra_usage": {"is_enabled": true}}"#).await;
        assert!(matches!(
            fetch_from(&server).await.unwrap_err(),
            FetchError::MalformedResponse(_)
        ));

        let server = serve(200, "not json").await;
        assert!(matches!(
            fetch_from(&server).await.unwrap_err(),
            FetchError::MalformedResponse(_)
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        // Nothing listens on port 9 in the test environment.
        let client = AnthropicUsageClient::with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let err = client
            .fetch(&Credential::token("tok"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_connection_messages() {
        let server = serve(200, r#"{"five_hour": {"utilization": 37.9}}"#).await;
        let client = AnthropicUsageClient::with_base_url(server.uri());
        let result = client.test_connection(&Credential::token("tok"), None).await;
        assert!(result.success);
        assert!(result.message.contains("37%"));

        let server = serve(401, "{}").await;
        let client = AnthropicUsageClient::with_base_url(server.uri());
        let result = client.test_connection(&Credential::token("tok"), None).await;
        assert!(!result.success);
        assert!(result.message.contains("401"));
    }

    #[test]
    fn test_invalid_base_url() {
        let client = AnthropicUsageClient::with_base_url("not a url");
        assert!(matches!(client.endpoint(), Err(FetchError::InvalidUrl(_))));
    }
}
