//! HTTP utilities for GCP REST API calls

use crate::resource::ProviderError;
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate long responses and drop non-printable characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Turn a non-2xx reply into a [`ProviderError`]
///
/// GCP error bodies look like
/// `{"error": {"code": 403, "status": "PERMISSION_DENIED", "message": "...", "errors": [{"reason": "forbidden"}]}}`.
pub fn parse_error_body(status: u16, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let code = error
        .and_then(|e| e.get("status").and_then(|s| s.as_str()))
        .or_else(|| {
            error
                .and_then(|e| e.get("errors"))
                .and_then(|errs| errs.get(0))
                .and_then(|e| e.get("reason"))
                .and_then(|r| r.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP_{}", status));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {}", status));

    ProviderError::api(status, code, message)
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cloudctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str, token: &str) -> Result<Response, ProviderError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        // Only log sanitized/truncated error body to avoid leaking sensitive data
        tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
        Err(parse_error_body(status.as_u16(), &body))
    }

    /// GET a JSON document
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, ProviderError> {
        let body = self
            .send(url, token)
            .await?
            .text()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to read response body: {}", e)))?;

        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Unparseable response: {}", sanitize_for_log(&body));
            ProviderError::malformed(format!("Failed to parse response JSON: {}", e))
        })
    }

    /// GET raw bytes (object media downloads)
    pub async fn get_bytes(&self, url: &str, token: &str) -> Result<Vec<u8>, ProviderError> {
        let bytes = self
            .send(url, token)
            .await?
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to read response body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
