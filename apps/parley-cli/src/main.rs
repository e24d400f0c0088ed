//! Parley CLI
//!
//! Runs a conversation session locally against the configured providers.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "parley",
    version,
    about = "Chat with Parley from the terminal",
    long_about = "Runs a local Parley conversation session.\n\n\
                  Provider keys come from the configuration file or the environment \
                  (TOGETHER_API_KEY, GEMINI_API_KEY, PARLEY_* overrides)."
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PARLEY_CONFIG", default_value = "config/parley.toml")]
    config: PathBuf,

    /// Use offline mock responses instead of real providers
    #[arg(long)]
    mock: bool,

    /// Log filter for diagnostics on stderr (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Enable verbose error output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Stream replies as they are produced
        #[arg(short, long)]
        stream: bool,
    },

    /// Send a single message and print the reply
    Ask {
        /// The message to send
        message: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Stream the reply as it is produced (text format only)
        #[arg(short, long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    output::init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Chat { stream } => commands::chat::run(&cli.config, cli.mock, stream).await,
        Commands::Ask {
            message,
            format,
            stream,
        } => commands::ask::run(&cli.config, cli.mock, &message, format, stream).await,
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if cli.verbose {
                for cause in e.chain().skip(1) {
                    eprintln!("{}: {}", "Caused by".yellow(), cause);
                }
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_ask_parses_format() {
        let cli = Cli::parse_from(["parley", "--mock", "ask", "hello", "--format", "json"]);
        assert!(cli.mock);
        match cli.command {
            Commands::Ask { format, .. } => assert_eq!(format, OutputFormat::Json),
            _ => panic!("expected ask"),
        }
    }
}
