//! Shared types and configuration for the Parley conversation service.
//!
//! Everything that more than one crate needs to agree on lives here: the
//! shape of a conversation turn, the application configuration and the
//! configuration error type.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{CoreError, Result};
pub use types::*;
