//! CLI command implementations

pub mod ask;
pub mod chat;

use anyhow::{Context, Result};
use futures::StreamExt;
use parley_adapters::ProviderSet;
use parley_conversation::ConversationManager;
use parley_core::AppConfig;
use std::io::Write;
use std::path::Path;

use crate::output;

/// Build a local session from configuration
pub fn build_manager(config_path: &Path, mock: bool) -> Result<ConversationManager> {
    let path = config_path.to_string_lossy();
    let mut config = AppConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load configuration from {path}"))?;
    if mock {
        config.conversation.use_mock_responses = true;
    }

    let providers = ProviderSet::from_config(&config);
    if !providers.any_configured() {
        output::warning("No provider API keys configured; replies will be fallback messages. Try --mock.");
    }
    Ok(ConversationManager::from_config(providers, &config.conversation))
}

/// Stream one reply to stdout, ending the line once it is complete
pub async fn stream_reply(manager: &mut ConversationManager, message: &str) -> Result<()> {
    write_reply(manager, message, &mut std::io::stdout()).await
}

async fn write_reply<W: Write>(
    manager: &mut ConversationManager,
    message: &str,
    out: &mut W,
) -> Result<()> {
    let chunks = manager.get_streaming_response(message)?;
    futures::pin_mut!(chunks);

    while let Some(chunk) = chunks.next().await {
        output::write_chunk(out, &chunk)?;
    }
    writeln!(out)?;
    Ok(())
}
