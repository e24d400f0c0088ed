//! Failover orchestration for one conversation session

use crate::history::{ConversationHistory, ExportFormat};
use crate::quality::{assess, QualityRules};
use crate::streaming::StreamChunk;
use crate::{ConversationError, Result};
use futures::{Stream, StreamExt};
use parley_adapters::{
    emulated_stream, with_deadline, ChatProvider, ChatRequest, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, ProviderError, ProviderSet, TimeoutError,
};
use parley_core::{ConversationConfig, ConversationTurn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Returned while the circuit is open; no provider is contacted
pub const DEGRADED_MESSAGE: &str = "I need a short breather right now. \
Give me a minute and ask me again, I'll be right back with you.";

/// Returned when every provider failed for a request
pub const TROUBLE_MESSAGE: &str = "I'm having a little trouble connecting my thoughts at the moment. \
Could you try asking me that again in a little while?";

const LOW_QUALITY_SUFFIX: &str = " (low quality)";

/// How a reply was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Primary,
    Secondary,
    /// Secondary reply that failed the quality gate but was used anyway
    SecondaryLowQuality,
    AllProvidersFailed,
    CircuitOpen,
}

/// Reply to one user message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    /// Provenance tag; `None` for the degraded and trouble fallbacks
    pub source: Option<String>,
    pub outcome: ResponseOutcome,
}

impl MessageResponse {
    fn fallback(message: &str, outcome: ResponseOutcome) -> Self {
        Self {
            message: message.to_string(),
            source: None,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Primary,
    Secondary,
}

/// A reply that made it through the gate
struct Accepted {
    text: String,
    source: String,
    outcome: ResponseOutcome,
}

/// One conversation session: history, circuit breaker and provider failover.
///
/// All methods take `&mut self`; a multi-session host keeps one manager per
/// session behind its own lock. Provider adapters are shared.
pub struct ConversationManager {
    providers: ProviderSet,
    history: ConversationHistory,
    breaker: CircuitBreaker,
    rules: QualityRules,
    system_instructions: String,
    provider_timeout: Duration,
    stream_chunk_delay: Duration,
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("providers", &self.providers)
            .field("turns", &self.history.len())
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl ConversationManager {
    pub fn builder() -> ConversationManagerBuilder {
        ConversationManagerBuilder::new()
    }

    pub fn from_config(providers: ProviderSet, config: &ConversationConfig) -> Self {
        Self::builder()
            .providers(providers)
            .config(config.clone())
            .build()
    }

    /// Answer one user message, failing over from primary to secondary.
    ///
    /// Provider failures never surface as errors; they produce the trouble
    /// message instead. Only blank input is rejected.
    #[instrument(skip(self, message), fields(chars = message.chars().count()))]
    pub async fn get_response(&mut self, message: &str) -> Result<MessageResponse> {
        let message = validate(message)?;

        if self.breaker.is_open() {
            info!("Circuit open, returning degraded response");
            self.history.append(ConversationTurn::user(message));
            self.record_reply(DEGRADED_MESSAGE);
            return Ok(MessageResponse::fallback(DEGRADED_MESSAGE, ResponseOutcome::CircuitOpen));
        }

        self.history.append(ConversationTurn::user(message));
        self.history.truncate_to_limit();

        for (slot, provider) in self.slots() {
            let Some(accepted) = self.attempt(slot, provider.as_ref()).await else {
                continue;
            };

            self.breaker.record_success();
            self.record_reply(accepted.text.as_str());
            info!(source = %accepted.source, outcome = ?accepted.outcome, "Reply accepted");
            return Ok(MessageResponse {
                message: accepted.text,
                source: Some(accepted.source),
                outcome: accepted.outcome,
            });
        }

        Ok(self.all_failed())
    }

    /// Stream the reply to one user message as `{chunk, source}` fragments.
    ///
    /// Blank input is rejected before any stream exists. The user turn is
    /// recorded immediately; the assistant turn only once the reply has been
    /// fully produced, so dropping the stream early leaves just the user turn.
    pub fn get_streaming_response(
        &mut self,
        message: &str,
    ) -> Result<impl Stream<Item = StreamChunk> + Send + '_> {
        let message = validate(message)?;

        let circuit_open = self.breaker.is_open();
        self.history.append(ConversationTurn::user(message));
        self.history.truncate_to_limit();

        let this = self;
        Ok(async_stream::stream! {
            if circuit_open {
                info!("Circuit open, streaming degraded response");
                this.record_reply(DEGRADED_MESSAGE);
                yield StreamChunk::degraded(DEGRADED_MESSAGE);
                return;
            }

            for (slot, provider) in this.slots() {
                if provider.supports_streaming() {
                    let opened = {
                        let request = this.request_for(provider.as_ref());
                        with_deadline(this.provider_timeout, "send_stream", || {
                            provider.send_stream(&request)
                        })
                        .await
                    };
                    let mut fragments = match opened {
                        Ok(fragments) => fragments,
                        Err(e) => {
                            warn!(provider = %provider.source(), error = %e, "Stream could not be opened");
                            continue;
                        }
                    };

                    let source = provider.source();
                    let mut collected = String::new();
                    let mut failure = None;
                    loop {
                        match tokio::time::timeout(this.provider_timeout, fragments.next()).await {
                            Ok(Some(Ok(fragment))) => {
                                if fragment.is_empty() {
                                    continue;
                                }
                                collected.push_str(&fragment);
                                yield StreamChunk::new(fragment, source.as_str());
                            }
                            Ok(Some(Err(e))) => {
                                failure = Some(e);
                                break;
                            }
                            Ok(None) => break,
                            Err(_) => {
                                failure = Some(ProviderError::Timeout(TimeoutError {
                                    duration: this.provider_timeout,
                                    operation: "stream_fragment".to_string(),
                                }));
                                break;
                            }
                        }
                    }

                    match failure {
                        None if !collected.trim().is_empty() => {
                            this.breaker.record_success();
                            this.record_reply(collected);
                            info!(%source, "Streamed reply complete");
                            return;
                        }
                        None => {
                            warn!(%source, "Stream ended without any text");
                            continue;
                        }
                        Some(e) if collected.is_empty() => {
                            warn!(%source, error = %e, "Stream failed before first fragment");
                            continue;
                        }
                        Some(e) => {
                            warn!(%source, error = %e, "Stream failed after partial output");
                            this.record_reply(collected);
                            this.breaker.record_failure();
                            yield StreamChunk::error("");
                            return;
                        }
                    }
                }

                let Some(accepted) = this.attempt(slot, provider.as_ref()).await else {
                    continue;
                };

                this.breaker.record_success();
                let mut replay = emulated_stream(accepted.text.clone(), this.stream_chunk_delay);
                while let Some(Ok(fragment)) = replay.next().await {
                    yield StreamChunk::new(fragment, accepted.source.as_str());
                }
                this.record_reply(accepted.text);
                info!(source = %accepted.source, "Emulated stream complete");
                return;
            }

            let fallback = this.all_failed();
            yield StreamChunk::error(fallback.message);
        })
    }

    /// Forget the conversation; the circuit breaker keeps its state
    pub fn clear_conversation(&mut self) -> usize {
        self.history.reset()
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.history.turns()
    }

    pub fn history_snapshot(&self) -> Vec<ConversationTurn> {
        self.history.snapshot()
    }

    pub fn export_history(&self, format: ExportFormat) -> Result<String> {
        self.history.export(format)
    }

    pub fn circuit_state(&mut self) -> CircuitState {
        self.breaker.state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.breaker.failure_count()
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    fn slots(&self) -> Vec<(Slot, Arc<dyn ChatProvider>)> {
        let primary = self.providers.primary.clone().map(|p| (Slot::Primary, p));
        let secondary = self.providers.secondary.clone().map(|p| (Slot::Secondary, p));
        primary.into_iter().chain(secondary).collect()
    }

    fn request_for<'a>(&'a self, provider: &dyn ChatProvider) -> ChatRequest<'a> {
        ChatRequest {
            turns: self.history.turns(),
            system_instructions: &self.system_instructions,
            params: provider.tuned_params(),
        }
    }

    /// One deadline-bounded call plus the quality gate; `None` means try the next provider
    async fn attempt(&self, slot: Slot, provider: &dyn ChatProvider) -> Option<Accepted> {
        let source = provider.source();
        let request = self.request_for(provider);
        let text = match with_deadline(self.provider_timeout, "send", || provider.send(&request)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(%source, error = %e, kind = ?e.kind(), "Provider call failed");
                return None;
            }
        };

        let verdict = assess(&text, &self.rules);
        match (slot, verdict.is_acceptable()) {
            (Slot::Primary, true) => Some(Accepted {
                text,
                source,
                outcome: ResponseOutcome::Primary,
            }),
            (Slot::Primary, false) => {
                warn!(%source, %verdict, "Primary reply rejected by quality gate");
                None
            }
            (Slot::Secondary, true) => Some(Accepted {
                text,
                source,
                outcome: ResponseOutcome::Secondary,
            }),
            (Slot::Secondary, false) => {
                warn!(%source, %verdict, "Accepting low-quality secondary reply");
                Some(Accepted {
                    text,
                    source: format!("{source}{LOW_QUALITY_SUFFIX}"),
                    outcome: ResponseOutcome::SecondaryLowQuality,
                })
            }
        }
    }

    /// Append an assistant turn and re-apply the token budget
    fn record_reply(&mut self, text: impl Into<String>) {
        self.history.append(ConversationTurn::assistant(text));
        self.history.truncate_to_limit();
    }

    fn all_failed(&mut self) -> MessageResponse {
        self.breaker.record_failure();
        warn!(
            failures = self.breaker.failure_count(),
            "All providers failed, returning trouble message"
        );
        self.record_reply(TROUBLE_MESSAGE);
        MessageResponse::fallback(TROUBLE_MESSAGE, ResponseOutcome::AllProvidersFailed)
    }
}

fn validate(message: &str) -> Result<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        debug!("Rejecting blank message");
        return Err(ConversationError::EmptyInput);
    }
    Ok(trimmed)
}

/// Builder for [`ConversationManager`]
pub struct ConversationManagerBuilder {
    providers: ProviderSet,
    config: ConversationConfig,
    rules: QualityRules,
}

impl ConversationManagerBuilder {
    pub fn new() -> Self {
        Self {
            providers: ProviderSet::default(),
            config: ConversationConfig::default(),
            rules: QualityRules::default(),
        }
    }

    pub fn providers(mut self, providers: ProviderSet) -> Self {
        self.providers = providers;
        self
    }

    pub fn primary(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.primary = Some(provider);
        self
    }

    pub fn secondary(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.providers.secondary = Some(provider);
        self
    }

    pub fn config(mut self, config: ConversationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn quality_rules(mut self, rules: QualityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn build(self) -> ConversationManager {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: self.config.failure_threshold,
            cooldown: self.config.cooldown(),
        });
        ConversationManager {
            providers: self.providers,
            history: ConversationHistory::from_config(&self.config),
            breaker,
            rules: self.rules,
            system_instructions: self.config.system_instructions.clone(),
            provider_timeout: self.config.provider_timeout(),
            stream_chunk_delay: self.config.stream_chunk_delay(),
        }
    }
}

impl Default for ConversationManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::is_quality_response;
    use parley_adapters::MockProvider;
    use parley_core::Role;

    fn mock_manager() -> ConversationManager {
        ConversationManager::builder()
            .primary(Arc::new(MockProvider::new()))
            .build()
    }

    #[tokio::test]
    async fn test_blank_input_rejected_without_side_effects() {
        let mut manager = mock_manager();
        assert!(matches!(
            manager.get_response("   \n").await,
            Err(ConversationError::EmptyInput)
        ));
        assert!(manager.history().is_empty());
        assert!(manager.get_streaming_response("").is_err());
        assert!(manager.history().is_empty());
    }

    #[tokio::test]
    async fn test_mock_primary_answers() {
        let mut manager = mock_manager();
        let response = manager.get_response("Hello there").await.unwrap();
        assert_eq!(response.outcome, ResponseOutcome::Primary);
        assert_eq!(response.source.as_deref(), Some("mock"));
        assert_eq!(manager.history().len(), 2);
        assert_eq!(manager.history()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_no_providers_yields_trouble_message() {
        let mut manager = ConversationManager::builder().build();
        let response = manager.get_response("Anyone there?").await.unwrap();
        assert_eq!(response.outcome, ResponseOutcome::AllProvidersFailed);
        assert_eq!(response.source, None);
        assert_eq!(response.message, TROUBLE_MESSAGE);
        assert_eq!(manager.consecutive_failures(), 1);
    }

    #[test]
    fn test_fallback_messages_pass_quality_gate() {
        let rules = QualityRules::default();
        assert!(is_quality_response(DEGRADED_MESSAGE, &rules));
        assert!(is_quality_response(TROUBLE_MESSAGE, &rules));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&ResponseOutcome::SecondaryLowQuality).unwrap();
        assert_eq!(json, "\"secondary_low_quality\"");
    }
}
