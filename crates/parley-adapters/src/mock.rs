//! Offline provider for demos and tests without API keys

use crate::{ChatProvider, ChatRequest, Result};
use async_trait::async_trait;
use parley_core::Role;
use tracing::debug;

/// Provenance tag reported for mock replies
pub const MOCK_SOURCE: &str = "mock";

const MOCK_MODEL: &str = "keyword-table";

/// Keyword (lowercase substring) to canned reply, checked in order
const RESPONSES: &[(&[&str], &str)] = &[
    (
        &["superpower"],
        "If I could pick a superpower, I'd choose the ability to pause time. \
I'd use it to finish every book on my list and still be early for everything.",
    ),
    (
        &["hello", "hi ", "hey"],
        "Hey there! It's really nice to hear from you. What's on your mind today?",
    ),
    (
        &["your name", "who are you"],
        "I'm your conversation companion for today. I'm happy to chat about pretty much anything you like.",
    ),
    (
        &["help"],
        "Of course, I'd be glad to help. Tell me a bit more about what you're working on and we'll figure it out together.",
    ),
    (
        &["thank"],
        "You're very welcome! I enjoyed that. Come back any time you feel like talking.",
    ),
];

const DEFAULT_RESPONSE: &str = "That's something I'd love to dig into with you. \
Here's my take: start small, stay curious, and see where it leads.";

/// Deterministic keyword-table responder; never touches the network
#[derive(Debug, Default, Clone)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    fn respond_to(message: &str) -> &'static str {
        let lowered = message.to_lowercase();
        RESPONSES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, reply)| *reply)
            .unwrap_or(DEFAULT_RESPONSE)
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        MOCK_SOURCE
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }

    fn source(&self) -> String {
        MOCK_SOURCE.to_string()
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String> {
        let last_user = request
            .turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();

        let reply = Self::respond_to(last_user);
        debug!(chars = reply.len(), "Serving mock response");
        Ok(reply.to_string())
    }
}
