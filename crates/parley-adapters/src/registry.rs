//! Builds the primary/secondary provider pair from configuration

use crate::{ChatProvider, GeminiProvider, MockProvider, OpenAiCompatibleProvider};
use parley_core::AppConfig;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The ordered providers a conversation fails over between.
///
/// Adapters are stateless, so one set can be shared by every session.
#[derive(Clone, Default)]
pub struct ProviderSet {
    pub primary: Option<Arc<dyn ChatProvider>>,
    pub secondary: Option<Arc<dyn ChatProvider>>,
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("primary", &self.primary.as_ref().map(|p| p.source()))
            .field("secondary", &self.secondary.as_ref().map(|p| p.source()))
            .finish()
    }
}

impl ProviderSet {
    pub fn new(
        primary: Option<Arc<dyn ChatProvider>>,
        secondary: Option<Arc<dyn ChatProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Construct adapters for every configured backend.
    ///
    /// With mock responses enabled the offline provider replaces the primary
    /// and the secondary stays unconfigured.
    pub fn from_config(config: &AppConfig) -> Self {
        if config.conversation.use_mock_responses {
            info!("Mock responses enabled, external providers disabled");
            return Self::new(Some(Arc::new(MockProvider::new())), None);
        }

        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        let primary = OpenAiCompatibleProvider::from_config(&config.primary, http.clone())
            .map(|p| Arc::new(p) as Arc<dyn ChatProvider>);
        let secondary = GeminiProvider::from_config(&config.secondary, http)
            .map(|p| Arc::new(p) as Arc<dyn ChatProvider>);

        let set = Self::new(primary, secondary);
        if !set.any_configured() {
            warn!("No chat provider is configured; every request will fall back to the trouble message");
        }
        info!(providers = ?set, "Provider set ready");
        set
    }

    pub fn any_configured(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Providers in failover order
    pub fn ordered(&self) -> impl Iterator<Item = &Arc<dyn ChatProvider>> {
        self.primary.iter().chain(self.secondary.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MOCK_SOURCE;

    fn base_config() -> AppConfig {
        let mut config = AppConfig::load_from_file("does/not/exist.toml").unwrap();
        config.primary.api_key = None;
        config.secondary.api_key = None;
        config.conversation.use_mock_responses = false;
        config
    }

    #[test]
    fn test_mock_mode_replaces_primary() {
        let mut config = base_config();
        config.conversation.use_mock_responses = true;
        config.secondary.api_key = Some("g-key".into());

        let set = ProviderSet::from_config(&config);
        assert_eq!(set.primary.as_ref().map(|p| p.source()).as_deref(), Some(MOCK_SOURCE));
        assert!(set.secondary.is_none());
    }

    #[test]
    fn test_missing_keys_leave_slots_empty() {
        let set = ProviderSet::from_config(&base_config());
        assert!(!set.any_configured());
        assert_eq!(set.ordered().count(), 0);
    }

    #[test]
    fn test_order_is_primary_then_secondary() {
        let mut config = base_config();
        config.primary.api_key = Some("sk-test".into());
        config.secondary.api_key = Some("g-key".into());

        let set = ProviderSet::from_config(&config);
        let names: Vec<_> = set.ordered().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["together", "gemini"]);
    }
}
