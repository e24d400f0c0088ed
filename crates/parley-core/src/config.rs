use crate::error::{CoreError, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `PARLEY_PRIMARY__API_KEY`
pub const ENV_PREFIX: &str = "PARLEY";

/// Conventional key variables honoured when the prefixed ones are absent
pub const PRIMARY_KEY_ENV: &str = "TOGETHER_API_KEY";
pub const SECONDARY_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MOCK_FLAG_ENV: &str = "USE_MOCK_RESPONSES";

pub const DEFAULT_SYSTEM_INSTRUCTIONS: &str = "You are a warm, curious conversational companion. \
Always answer in the first person, stay in character, and keep replies to a few sentences.";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub primary: ProviderConfig,
    pub secondary: ProviderConfig,
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load configuration from defaults and the environment
    pub fn load() -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(Self::environment())
            .build()?;
        Self::finish(config)
    }

    /// Load configuration from a file, with environment overrides on top
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::with_name(path).required(false))
            .add_source(Self::environment())
            .build()?;
        Self::finish(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("primary.models")
            .with_list_parse_key("secondary.models")
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>> {
        let mut builder = Config::builder()
            .set_default("primary.name", "together")?
            .set_default("primary.base_url", "https://api.together.xyz/v1")?
            .set_default(
                "primary.models",
                vec![
                    "meta-llama/Llama-3.3-70B-Instruct-Turbo".to_string(),
                    "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".to_string(),
                    "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string(),
                ],
            )?
            .set_default("secondary.name", "gemini")?
            .set_default(
                "secondary.base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default(
                "secondary.models",
                vec![
                    "gemini-1.5-flash".to_string(),
                    "gemini-1.5-pro".to_string(),
                    "gemini-pro".to_string(),
                ],
            )?
            .set_default("conversation.max_context_tokens", 4000)?
            .set_default("conversation.tokens_per_char", 0.25)?
            .set_default("conversation.failure_threshold", 3)?
            .set_default("conversation.cooldown_ms", 60_000)?
            .set_default("conversation.provider_timeout_ms", 30_000)?
            .set_default("conversation.stream_chunk_delay_ms", 50)?
            .set_default("conversation.use_mock_responses", false)?
            .set_default(
                "conversation.system_instructions",
                DEFAULT_SYSTEM_INSTRUCTIONS,
            )?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.session_idle_timeout_secs", 1800)?
            .set_default("server.session_sweep_interval_secs", 60)?;

        // Plain vendor variables act as defaults so prefixed ones still win
        if let Ok(key) = std::env::var(PRIMARY_KEY_ENV) {
            builder = builder.set_default("primary.api_key", key)?;
        }
        if let Ok(key) = std::env::var(SECONDARY_KEY_ENV) {
            builder = builder.set_default("secondary.api_key", key)?;
        }
        if let Ok(flag) = std::env::var(MOCK_FLAG_ENV) {
            builder = builder.set_default(
                "conversation.use_mock_responses",
                matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            )?;
        }

        Ok(builder)
    }

    fn finish(config: Config) -> Result<Self> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let conversation = &self.conversation;
        if conversation.max_context_tokens == 0 {
            return Err(CoreError::invalid("conversation.max_context_tokens must be positive"));
        }
        if !(conversation.tokens_per_char.is_finite() && conversation.tokens_per_char > 0.0) {
            return Err(CoreError::invalid("conversation.tokens_per_char must be positive"));
        }
        if conversation.failure_threshold == 0 {
            return Err(CoreError::invalid("conversation.failure_threshold must be at least 1"));
        }
        if conversation.provider_timeout_ms == 0 {
            return Err(CoreError::invalid("conversation.provider_timeout_ms must be positive"));
        }
        if conversation.cooldown_ms == 0 {
            return Err(CoreError::invalid("conversation.cooldown_ms must be positive"));
        }
        if self.server.session_idle_timeout_secs == 0 || self.server.session_sweep_interval_secs == 0 {
            return Err(CoreError::invalid("server session eviction settings must be positive"));
        }
        Ok(())
    }
}

/// Connection settings for one chat-completion backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Family name used in logs and provenance tags
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Candidate model identifiers, preferred first
    #[serde(default)]
    pub models: Vec<String>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            base_url: base_url.into(),
            models: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// The API key, treating blank values as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Per-session conversation behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_tokens_per_char")]
    pub tokens_per_char: f64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_stream_chunk_delay_ms")]
    pub stream_chunk_delay_ms: u64,
    #[serde(default)]
    pub use_mock_responses: bool,
    #[serde(default = "default_system_instructions")]
    pub system_instructions: String,
}

impl ConversationConfig {
    pub fn with_max_context_tokens(mut self, tokens: usize) -> Self {
        self.max_context_tokens = tokens;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_ms = ceil_millis(cooldown);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout_ms = ceil_millis(timeout);
        self
    }

    pub fn with_stream_chunk_delay(mut self, delay: Duration) -> Self {
        self.stream_chunk_delay_ms = ceil_millis(delay);
        self
    }

    pub fn with_mock_responses(mut self, enabled: bool) -> Self {
        self.use_mock_responses = enabled;
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn stream_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.stream_chunk_delay_ms)
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            tokens_per_char: default_tokens_per_char(),
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            provider_timeout_ms: default_provider_timeout_ms(),
            stream_chunk_delay_ms: default_stream_chunk_delay_ms(),
            use_mock_responses: false,
            system_instructions: default_system_instructions(),
        }
    }
}

fn default_max_context_tokens() -> usize {
    4000
}

fn default_tokens_per_char() -> f64 {
    0.25
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_ms() -> u64 {
    60_000
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

/// Whole milliseconds, rounding any sub-millisecond remainder up
fn ceil_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis() + u128::from(duration.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

fn default_stream_chunk_delay_ms() -> u64 {
    50
}

fn default_system_instructions() -> String {
    DEFAULT_SYSTEM_INSTRUCTIONS.to_string()
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Sessions untouched for this long are dropped
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,
    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
        }
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_session_idle_timeout_secs() -> u64 {
    1800
}

fn default_session_sweep_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load_without_environment() {
        let config = AppConfig::load_from_file("does/not/exist.toml").unwrap();

        assert_eq!(config.conversation.failure_threshold, 3);
        assert_eq!(config.conversation.cooldown(), Duration::from_secs(60));
        assert_eq!(config.conversation.max_context_tokens, 4000);
        assert_eq!(config.secondary.models[0], "gemini-1.5-flash");
        assert!(!config.primary.models.is_empty());
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let provider = ProviderConfig::new("test", "http://localhost").with_api_key("   ");
        assert_eq!(provider.api_key(), None);

        let provider = ProviderConfig::new("test", "http://localhost").with_api_key("sk-test");
        assert_eq!(provider.api_key(), Some("sk-test"));
    }

    #[test]
    fn test_conversation_config_builders() {
        let config = ConversationConfig::default()
            .with_failure_threshold(5)
            .with_cooldown(Duration::from_secs(10))
            .with_stream_chunk_delay(Duration::from_millis(5))
            .with_mock_responses(true);

        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.stream_chunk_delay(), Duration::from_millis(5));
        assert!(config.use_mock_responses);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = AppConfig::load_from_file("does/not/exist.toml").unwrap();
        config.conversation.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sub_second_durations_survive_builders() {
        let config = ConversationConfig::default()
            .with_provider_timeout(Duration::from_millis(500))
            .with_cooldown(Duration::from_millis(800))
            .with_stream_chunk_delay(Duration::from_micros(1500));

        assert_eq!(config.provider_timeout(), Duration::from_millis(500));
        assert_eq!(config.cooldown(), Duration::from_millis(800));
        assert_eq!(config.stream_chunk_delay(), Duration::from_millis(2));

        let config = ConversationConfig::default().with_provider_timeout(Duration::from_micros(10));
        assert_eq!(config.provider_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_validate_rejects_zero_timeout_and_cooldown() {
        let mut config = AppConfig::load_from_file("does/not/exist.toml").unwrap();
        assert!(config.validate().is_ok());

        config.conversation.provider_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.conversation.provider_timeout_ms = 500;
        config.conversation.cooldown_ms = 0;
        assert!(config.validate().is_err());

        config.conversation.cooldown_ms = 800;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig::new()
            .with_host("127.0.0.1".to_string())
            .with_port(3000);
        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.session_idle_timeout(), Duration::from_secs(1800));
    }
}
