//! Provider adapters for the Parley conversation service.
//!
//! Two chat-completion backends with different wire formats sit behind the
//! [`ChatProvider`] trait: an OpenAI-compatible service (the primary, with
//! native token streaming) and a Gemini-compatible service (the secondary,
//! request/response only). An offline [`MockProvider`] stands in for both
//! when mock responses are enabled.
//!
//! The crate also carries the resilience pieces the conversation layer
//! composes around those calls: the [`CircuitBreaker`], per-call deadlines
//! and the word-chunking emulation used for backends without streaming.

pub mod circuit_breaker;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod registry;
pub mod selection;
pub mod streaming;
pub mod timeout;
pub mod tuning;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use gemini::GeminiProvider;
pub use mock::{MockProvider, MOCK_SOURCE};
pub use openai::OpenAiCompatibleProvider;
pub use registry::ProviderSet;
pub use selection::select_model;
pub use streaming::{emulated_stream, split_fragments, TextStream};
pub use timeout::{with_deadline, TimeoutError};
pub use tuning::{tuned_params, GenerationParams};

use async_trait::async_trait;
use parley_core::ConversationTurn;
use thiserror::Error;

/// Longest provider error body kept in logs and error messages
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Provider is not configured")]
    NotConfigured,

    #[error("Streaming is not supported by {0}")]
    StreamingUnsupported(String),
}

/// Coarse classification used by the failover logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Network, auth, quota or deadline failure
    Unavailable,
    /// The call succeeded but produced no usable text
    EmptyResponse,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::EmptyResponse => ProviderErrorKind::EmptyResponse,
            _ => ProviderErrorKind::Unavailable,
        }
    }

    /// Map a non-success HTTP status and body to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate_body(body);
        match status {
            401 | 403 => ProviderError::Auth(message),
            429 => ProviderError::RateLimited(message),
            _ => ProviderError::Api { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Connection(err.to_string())
        }
    }
}

/// Turn a non-success HTTP response into the matching error
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status.as_u16(), &body))
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty error response body>".to_string();
    }
    match trimmed.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Everything an adapter needs for one outbound call
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    /// Conversation so far, oldest first, already truncated by the caller
    pub turns: &'a [ConversationTurn],
    /// Persona / system instruction text
    pub system_instructions: &'a str,
    /// Caller-supplied generation parameters; adapters clamp them
    pub params: GenerationParams,
}

/// A uniform "send conversation, get text" interface over one backend.
///
/// Implementations hold no per-conversation state and may be shared between
/// sessions behind an `Arc`.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Backend family name, e.g. `together` or `gemini`
    fn name(&self) -> &str;

    /// Model identifier chosen at construction
    fn model(&self) -> &str;

    /// Provenance tag reported to callers
    fn source(&self) -> String {
        format!("{}:{}", self.name(), self.model())
    }

    /// Whether [`ChatProvider::send_stream`] delivers text incrementally
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generation defaults for the selected model
    fn tuned_params(&self) -> GenerationParams {
        tuned_params(self.model())
    }

    /// Send the conversation and return the complete reply text
    async fn send(&self, request: &ChatRequest<'_>) -> Result<String>;

    /// Send the conversation and return reply fragments as they arrive
    async fn send_stream(&self, _request: &ChatRequest<'_>) -> Result<TextStream> {
        Err(ProviderError::StreamingUnsupported(self.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(ProviderError::EmptyResponse.kind(), ProviderErrorKind::EmptyResponse);
        assert_eq!(
            ProviderError::Connection("reset".into()).kind(),
            ProviderErrorKind::Unavailable
        );
        assert_eq!(ProviderError::NotConfigured.kind(), ProviderErrorKind::Unavailable);
        let timeout = TimeoutError {
            duration: Duration::from_secs(1),
            operation: "send".into(),
        };
        assert_eq!(ProviderError::from(timeout).kind(), ProviderErrorKind::Unavailable);
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ProviderError::from_status(401, "bad key"), ProviderError::Auth(_)));
        assert!(matches!(ProviderError::from_status(403, ""), ProviderError::Auth(_)));
        assert!(matches!(
            ProviderError::from_status(429, "slow down"),
            ProviderError::RateLimited(_)
        ));
        match ProviderError::from_status(500, "boom") {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 100);
        let message = truncate_body(&body);
        assert!(message.ends_with("..."));
        assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 3);
    }
}
