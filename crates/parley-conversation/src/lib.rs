//! Conversation orchestration for Parley.
//!
//! A [`ConversationManager`] owns one session: its token-bounded
//! [`ConversationHistory`], its circuit breaker and the ordered provider pair
//! it fails over between. Replies from the primary must pass the quality
//! gate in [`quality`]; the secondary's reply is accepted either way.

pub mod history;
pub mod manager;
pub mod quality;
pub mod streaming;

pub use history::{ConversationHistory, ExportFormat};
pub use manager::{ConversationManager, ConversationManagerBuilder, MessageResponse, ResponseOutcome};
pub use quality::{assess, is_quality_response, QualityRules, QualityVerdict};
pub use streaming::{SseFormatter, StreamChunk, SOURCE_DEGRADED, SOURCE_ERROR};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Message must not be empty")]
    EmptyInput,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConversationError>;
