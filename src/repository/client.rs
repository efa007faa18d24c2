//! Shared HTTP plumbing for the external visitor API

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::{
    config::UpstreamConfig,
    error::{AppError, AppResult},
};

#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(token)
    }

    pub fn put(&self, path: &str, token: &str) -> RequestBuilder {
        self.http.put(self.url(path)).bearer_auth(token)
    }

    /// Send a request, mapping non-success statuses to `AppError::Upstream`
    pub async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Upstream {
            status: status.as_u16(),
            message: extract_message(status, &body),
        })
    }
}

/// Pull a human-readable message out of an upstream error body.
///
/// Looks at `message`, then `error` (string or `{ message }`), and falls back
/// to the status reason.
pub fn extract_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.get("message"),
            value.get("error"),
            value.get("error").and_then(|e| e.get("message")),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(msg) = candidate.as_str().filter(|m| !m.trim().is_empty()) {
                return msg.to_string();
            }
        }
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message() {
        assert_eq!(
            extract_message(StatusCode::BAD_REQUEST, r#"{"message": "Phone already registered"}"#),
            "Phone already registered"
        );
        assert_eq!(
            extract_message(StatusCode::BAD_REQUEST, r#"{"error": {"message": "Invalid date"}}"#),
            "Invalid date"
        );
        assert_eq!(
            extract_message(StatusCode::UNAUTHORIZED, "<html>nope</html>"),
            "Unauthorized"
        );
    }

    #[test]
    fn test_url_joining() {
        let client = UpstreamClient::new(&UpstreamConfig {
            base_url: "http://api.local/api/".to_string(),
            ..UpstreamConfig::default()
        })
        .unwrap();
        assert_eq!(client.url("/visitors"), "http://api.local/api/visitors");
        assert_eq!(client.url("employees"), "http://api.local/api/employees");
    }
}
