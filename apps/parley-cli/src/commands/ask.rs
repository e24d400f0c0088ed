//! Single message command

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use crate::commands::{build_manager, stream_reply};
use crate::output::{self, OutputFormat};

pub async fn run(
    config_path: &Path,
    mock: bool,
    message: &str,
    format: OutputFormat,
    stream: bool,
) -> Result<()> {
    let mut manager = build_manager(config_path, mock)?;

    if stream && format == OutputFormat::Text {
        stream_reply(&mut manager, message).await?;
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let response = manager.get_response(message).await;
    spinner.finish_and_clear();
    let response = response?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => {
            println!("{}", response.message);
            eprintln!();
            eprintln!("[{}]", output::source_label(response.source.as_deref()));
        }
    }

    Ok(())
}
