//! Output formatting utilities

use colored::{ColoredString, Colorize};
use parley_conversation::{MessageResponse, StreamChunk, SOURCE_DEGRADED, SOURCE_ERROR};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Output format for one-shot replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Diagnostics go to stderr so replies stay pipeable
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn source_label(source: Option<&str>) -> ColoredString {
    match source {
        Some(source) if source.ends_with("(low quality)") => source.yellow(),
        Some(source) => source.dimmed(),
        None => "fallback".red(),
    }
}

pub fn print_reply(response: &MessageResponse) {
    println!();
    println!("{}: {}", "Parley".cyan().bold(), response.message);
    println!("{}", format!("[{}]", source_label(response.source.as_deref())).dimmed());
    println!();
}

/// Write one streamed chunk without a newline
pub fn write_chunk<W: Write>(out: &mut W, chunk: &StreamChunk) -> std::io::Result<()> {
    match chunk.source.as_str() {
        SOURCE_ERROR if chunk.chunk.is_empty() => {
            write!(out, " {}", "[interrupted]".red())?;
        }
        SOURCE_ERROR | SOURCE_DEGRADED => write!(out, "{}", chunk.chunk.yellow())?,
        _ => write!(out, "{}", chunk.chunk)?,
    }
    out.flush()
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn dimmed(message: &str) {
    println!("{}", message.dimmed());
}

pub fn section(title: &str) {
    println!();
    println!("{}", title.bold().underline());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
