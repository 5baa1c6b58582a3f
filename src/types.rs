use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_error::SpanTrace;

#[derive(Error, Debug)]
pub enum VeristreamError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidIngress(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Upstream error (status {0}): {1}")]
    Upstream(axum::http::StatusCode, String),

    #[error("Unexpected upstream response shape: {0}")]
    UnexpectedResponse(String),

    #[error("Toolchain error: {0}")]
    Toolchain(String),
}

/// An error with the span trace captured at the point it was observed.
#[derive(Debug)]
pub struct ObservedError {
    pub inner: VeristreamError,
    pub span_trace: SpanTrace,
}

impl std::fmt::Display for ObservedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<VeristreamError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;

impl axum::response::IntoResponse for ObservedError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, code) = match &self.inner {
            VeristreamError::Upstream(s, m) => (*s, m.clone(), "UPSTREAM_ERROR"),
            VeristreamError::InvalidIngress(m) => (
                axum::http::StatusCode::BAD_REQUEST,
                m.clone(),
                "INVALID_INGRESS",
            ),
            VeristreamError::Credentials(m) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                m.clone(),
                "CREDENTIALS_ERROR",
            ),
            VeristreamError::Network(e) => (
                axum::http::StatusCode::BAD_GATEWAY,
                e.to_string(),
                "NETWORK_ERROR",
            ),
            VeristreamError::UnexpectedResponse(m) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                m.clone(),
                "UNEXPECTED_RESPONSE",
            ),
            VeristreamError::Toolchain(m) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                m.clone(),
                "TOOLCHAIN_ERROR",
            ),
            VeristreamError::Serialization(e) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                "SERIALIZATION_ERROR",
            ),
            VeristreamError::Io(e) => (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                "IO_ERROR",
            ),
        };
        (
            status,
            axum::Json(serde_json::json!({
                "error": msg,
                "code": code,
            })),
        )
            .into_response()
    }
}

/// --- CONVERSATION WIRE TYPES ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// --- OUTBOUND STREAM EVENTS ---

/// One unit written to the client. The relay task produces these; the HTTP
/// layer turns each into an SSE frame at the response boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Chat relay: one raw delta fragment, passed through as-is.
    Content(String),
    /// Completion relay: the full repaired text accumulated so far.
    Text(String),
    Error(String),
    Done,
}

impl OutboundEvent {
    /// Serialize into the `data: <payload>` SSE frame the client expects.
    pub fn into_sse(self) -> axum::response::sse::Event {
        let event = axum::response::sse::Event::default();
        match self {
            OutboundEvent::Content(fragment) => {
                event.data(serde_json::json!({ "content": fragment }).to_string())
            }
            OutboundEvent::Text(text) => {
                event.data(serde_json::json!({ "text": text }).to_string())
            }
            OutboundEvent::Error(message) => {
                event.data(serde_json::json!({ "error": message }).to_string())
            }
            OutboundEvent::Done => event.data(crate::constants::DONE_SENTINEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::new(Role::System, "hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_observed_error_carries_kind() {
        let err: ObservedError = VeristreamError::InvalidIngress("empty prompt".into()).into();
        assert!(matches!(err.inner, VeristreamError::InvalidIngress(_)));
        assert!(err.to_string().contains("empty prompt"));
    }
}
