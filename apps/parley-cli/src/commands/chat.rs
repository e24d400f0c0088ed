//! Interactive chat command

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use indicatif::{ProgressBar, ProgressStyle};
use parley_conversation::{ConversationManager, ExportFormat};
use parley_core::Role;
use std::path::Path;
use std::time::Duration;

use crate::commands::{build_manager, stream_reply};
use crate::output;

pub async fn run(config_path: &Path, mock: bool, stream: bool) -> Result<()> {
    let mut manager = build_manager(config_path, mock)?;

    println!("{} new chat session...", "Starting".green());
    output::dimmed("Type '/exit' to end the session, '/help' for commands.");
    println!();

    loop {
        let input: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let mut words = input.split_whitespace();
        match words.next().map(str::to_lowercase).as_deref() {
            Some("/exit") | Some("/quit") | Some("exit") | Some("quit") => {
                println!("{}", "Goodbye!".green());
                break;
            }
            Some("/help") => {
                print_help();
                continue;
            }
            Some("/clear") => {
                let cleared = manager.clear_conversation();
                output::success(&format!("Cleared {cleared} turns"));
                continue;
            }
            Some("/history") => {
                show_history(&manager);
                continue;
            }
            Some("/export") => {
                let format = match words.next().map(str::parse::<ExportFormat>) {
                    None => ExportFormat::Json,
                    Some(Ok(format)) => format,
                    Some(Err(e)) => {
                        output::warning(&e);
                        continue;
                    }
                };
                export_history(&manager, format)?;
                continue;
            }
            _ => {}
        }

        if stream {
            print!("{}: ", "Parley".cyan().bold());
            stream_reply(&mut manager, input).await?;
        } else {
            send_message(&mut manager, input).await?;
        }
    }

    Ok(())
}

async fn send_message(manager: &mut ConversationManager, message: &str) -> Result<()> {
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

    output::print_reply(&response?);
    Ok(())
}

fn print_help() {
    output::section("Available Commands:");
    println!("  {}        - End the chat session", "/exit".cyan());
    println!("  {}        - Show this help message", "/help".cyan());
    println!("  {}       - Forget the conversation so far", "/clear".cyan());
    println!("  {}     - Show conversation history", "/history".cyan());
    println!("  {} - Export history (json, markdown, text)", "/export [fmt]".cyan());
    println!();
}

fn show_history(manager: &ConversationManager) {
    output::section("Conversation History:");
    if manager.history().is_empty() {
        output::dimmed("(empty)");
    }
    for turn in manager.history() {
        let role = match turn.role {
            Role::User => "You".green(),
            Role::Assistant => "Parley".cyan(),
        };
        println!("{}: {}", role.bold(), turn.content);
        println!();
    }
}

fn export_history(manager: &ConversationManager, format: ExportFormat) -> Result<()> {
    let extension = match format {
        ExportFormat::Json => "json",
        ExportFormat::Markdown => "md",
        ExportFormat::Text => "txt",
    };
    let filename = format!(
        "parley_conversation_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        extension
    );

    let contents = manager.export_history(format)?;
    std::fs::write(&filename, contents).with_context(|| format!("Failed to write {filename}"))?;

    output::success(&format!("Exported conversation to {}", filename.cyan()));
    Ok(())
}
