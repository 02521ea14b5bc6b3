//! Hosted-git API client
//!
//! Minimal authenticated HTTP client for the GraphQL endpoint and the per-commit REST endpoint.

use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use reqwest::header::HeaderMap;
use serde_json::Value;

const LOG_TARGET: &str = "    client";

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Why an API call produced no usable payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The service answered with a non-success status.
    Status { status: u16, body: String },

    /// The request failed before a status was received, or the body could not be decoded.
    Request(String),
}

impl CallError {
    /// HTTP status code, when the service answered
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(_) => None,
        }
    }
}

impl Display for CallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "HTTP status {status}: {body}"),
            Self::Request(message) => write!(f, "{message}"),
        }
    }
}

impl core::error::Error for CallError {}

/// Hosting API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
}

impl Client {
    /// Create a new client sending `token` as a bearer token on every request
    pub fn new(token: Option<&str>, user_agent: &str) -> crate::Result<Self> {
        use reqwest::header::{AUTHORIZATION, HeaderValue};

        let mut client_builder = reqwest::Client::builder().user_agent(user_agent);

        if let Some(t) = token.filter(|t| !t.is_empty()) {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {t}"))?;
            auth_val.set_sensitive(true);

            let mut headers = HeaderMap::new();
            let _ = headers.insert(AUTHORIZATION, auth_val);

            client_builder = client_builder.default_headers(headers);
        }

        Ok(Self {
            client: client_builder.build()?,
        })
    }

    /// POST a JSON payload and decode the JSON response
    pub async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, CallError> {
        let request = self.client.post(url).json(payload);
        Self::execute(request, url).await
    }

    /// GET a URL and decode the JSON response
    pub async fn get_json(&self, url: &str) -> Result<Value, CallError> {
        let request = self.client.get(url);
        Self::execute(request, url).await
    }

    async fn execute(request: reqwest::RequestBuilder, url: &str) -> Result<Value, CallError> {
        let resp = request
            .send()
            .await
            .map_err(|e| CallError::Request(format!("sending request to '{url}': {e}")))?;

        if let Some(rl) = extract_rate_limit_from_headers(resp.headers()) {
            log::trace!(
                target: LOG_TARGET,
                "{} API call(s) remaining, quota resets at {}",
                rl.remaining,
                rl.reset_at.format("%T")
            );
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::debug!(target: LOG_TARGET, "Request to '{url}' failed with HTTP status {status}");
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| CallError::Request(format!("decoding response from '{url}': {e}")))?;

        if let Some(errors) = json.get("errors").and_then(Value::as_array)
            && let Some(first) = errors.first()
        {
            log::warn!(target: LOG_TARGET, "Response from '{url}' reported {} error(s), first: {first}", errors.len());
        }

        Ok(json)
    }
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}
