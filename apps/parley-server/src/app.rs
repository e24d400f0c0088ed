//! Application wiring: configuration, providers and shared state

use anyhow::{Context, Result};
use parley_adapters::ProviderSet;
use parley_api::AppState;
use parley_core::AppConfig;
use tracing::info;

use crate::cli::Args;
use crate::server::Server;

pub struct App {
    config: AppConfig,
    state: AppState,
}

impl App {
    pub fn build(args: Args) -> Result<Self> {
        let config = load_config(&args)?;

        let providers = ProviderSet::from_config(&config);
        if config.conversation.use_mock_responses {
            info!("Serving offline mock responses");
        }

        let state = AppState::new(providers, config.conversation.clone());
        Ok(Self { config, state })
    }

    pub async fn run(self) -> Result<()> {
        Server::new(self.config.server, self.state).run().await
    }
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let path = args.config.to_string_lossy();
    let mut config = AppConfig::load_from_file(&path)
        .with_context(|| format!("Failed to load configuration from {path}"))?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.mock {
        config.conversation.use_mock_responses = true;
    }
    Ok(config)
}
