//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "parley-server",
    about = "Parley conversation server",
    version,
    long_about = "Serves multi-provider conversations over HTTP with quality-gated \
                  failover, a per-session circuit breaker and SSE streaming."
)]
pub struct Args {
    /// Path to configuration file (optional; defaults and environment still apply)
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/parley.toml")]
    pub config: PathBuf,

    /// HTTP server port, overriding the configured one
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// Answer from the offline keyword table instead of real providers
    #[arg(long)]
    pub mock: bool,
}
