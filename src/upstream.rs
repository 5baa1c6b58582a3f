//! Upstream model API client.
//!
//! Wraps the shared reqwest client with the Vertex publisher-model URL
//! scheme: `:streamRawPredict` for streaming sessions, `:rawPredict` for
//! synchronous ones. Every session opens its own response; nothing is shared
//! across requests except the connection pool.

use crate::auth::TokenProvider;
use crate::types::{Result, VeristreamError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    tokens: Arc<TokenProvider>,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        http: reqwest::Client,
        location: &str,
        project: &str,
        model: &str,
        tokens: Arc<TokenProvider>,
        request_timeout: Duration,
    ) -> Self {
        let base_url = format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{proj}/locations/{loc}/publishers/mistralai/models/{model}",
            loc = location,
            proj = project,
            model = model,
        );
        Self {
            http,
            base_url,
            model: model.to_string(),
            tokens,
            request_timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn stream_url(&self) -> String {
        format!("{}:streamRawPredict", self.base_url)
    }

    fn predict_url(&self) -> String {
        format!("{}:rawPredict", self.base_url)
    }

    /// Open a streaming session. The credential is resolved before any
    /// connection is made, so a configuration error never opens a socket.
    /// A non-2xx status is read to completion and surfaced as an upstream
    /// error.
    pub async fn open_stream<B: Serialize>(&self, body: &B) -> Result<reqwest::Response> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(self.stream_url())
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(VeristreamError::Network)?;

        Self::check_status(response).await
    }

    /// One-shot (non-streaming) prediction, returning the parsed JSON body.
    pub async fn predict<B: Serialize>(&self, body: &B) -> Result<serde_json::Value> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .post(self.predict_url())
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(VeristreamError::Network)?;

        let response = Self::check_status(response).await?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| VeristreamError::Network(e).into())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(text) => text,
            Err(_) => "Unknown error (failed to read response text)".to_string(),
        };
        tracing::error!("[upstream] error status {}: {}", status, body);
        Err(VeristreamError::Upstream(
            axum::http::StatusCode::from_u16(status.as_u16())
                .unwrap_or(axum::http::StatusCode::BAD_GATEWAY),
            body,
        )
        .into())
    }
}

/// Extract `choices[0].message.content` from a synchronous prediction.
/// A missing field is a hard failure here, unlike the streaming path where
/// malformed chunks are skipped.
pub fn extract_message_content(body: &serde_json::Value) -> Result<String> {
    body.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            VeristreamError::UnexpectedResponse(format!(
                "missing choices[0].message.content in: {}",
                crate::str_utils::log_snippet(&body.to_string(), 300)
            ))
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"content": "module m;\nendmodule"}}]
        });
        assert_eq!(
            extract_message_content(&body).unwrap(),
            "module m;\nendmodule"
        );
    }

    #[test]
    fn test_extract_missing_field_is_hard_error() {
        let body = serde_json::json!({"choices": []});
        let err = extract_message_content(&body).unwrap_err();
        assert!(matches!(err.inner, VeristreamError::UnexpectedResponse(_)));
    }
}
