//! HTTP transport to the upstream control API.
//!
//! The [`UpstreamTransport`] trait is the seam between the gateway's
//! rate-limit and retry logic and the actual wire. Production uses
//! [`HttpTransport`]; tests script responses through the same trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::config::UpstreamConfig;
use crate::{Result, WardenError};

/// User agent string for upstream requests.
const USER_AGENT: &str = "Warden/1.0";

/// Rate-limit headers the upstream answers with.
const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
const HEADER_RESET: &str = "X-RateLimit-Reset";

/// HTTP method of an upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// One physical request to the upstream API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path under the base URL, e.g. `/server/players`.
    pub path: &'static str,
    /// Credential sent as the `Server-Key` header.
    pub server_key: String,
    /// JSON body for POST requests.
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: &'static str, server_key: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path,
            server_key: server_key.into(),
            body: None,
        }
    }

    pub fn post(path: &'static str, server_key: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path,
            server_key: server_key.into(),
            body: Some(body),
        }
    }
}

/// What came back from one physical request.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// `X-RateLimit-Remaining`, when present and numeric.
    pub rate_remaining: Option<i64>,
    /// `X-RateLimit-Reset` (epoch seconds), when present and numeric.
    pub rate_reset: Option<i64>,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam between gateway logic and the wire.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Issue one physical request. Timeouts surface as
    /// [`WardenError::Timeout`].
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpTransport {
    /// Create a transport from upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| WardenError::Validation(format!("bad upstream base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WardenError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .header("Server-Key", &request.server_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WardenError::Timeout(self.timeout_secs)
                } else {
                    WardenError::Transport(format!("upstream request failed: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        let rate_remaining = header_i64(response.headers(), HEADER_REMAINING);
        let rate_reset = header_i64(response.headers(), HEADER_RESET);
        let body = response
            .text()
            .await
            .map_err(|e| WardenError::Transport(format!("failed to read response: {e}")))?;

        Ok(ApiResponse {
            status,
            rate_remaining,
            rate_reset,
            body,
        })
    }
}
