//! HTTP surface for Parley.
//!
//! Each session id maps to its own [`ConversationManager`]; provider adapters
//! are shared across sessions.
//!
//! [`ConversationManager`]: parley_conversation::ConversationManager

pub mod error;
pub mod rest;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use rest::router::create_router;
pub use state::{AppState, SessionStore};
