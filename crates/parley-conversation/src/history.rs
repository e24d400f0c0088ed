//! Token-bounded conversation history with export

use crate::Result;
use parley_core::{ConversationConfig, ConversationTurn, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Export format for conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Ordered turns of one session, oldest first.
///
/// The estimated token total stays within `max_context_tokens` after every
/// [`truncate_to_limit`](Self::truncate_to_limit), except that the newest
/// turn is always retained even when it alone exceeds the limit.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    max_context_tokens: usize,
    tokens_per_char: f64,
}

impl ConversationHistory {
    pub fn new(max_context_tokens: usize, tokens_per_char: f64) -> Self {
        Self {
            turns: Vec::new(),
            max_context_tokens,
            tokens_per_char,
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_context_tokens, config.tokens_per_char)
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        debug!(role = %turn.role, chars = turn.content.chars().count(), "Appending turn");
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    /// Remove every turn
    pub fn reset(&mut self) -> usize {
        let count = self.turns.len();
        self.turns.clear();
        info!(turns = count, "Cleared conversation history");
        count
    }

    /// Estimated cost of one turn; never less than one token
    pub fn estimate_turn(&self, turn: &ConversationTurn) -> usize {
        let chars = turn.content.chars().count() as f64;
        ((chars * self.tokens_per_char).ceil() as usize).max(1)
    }

    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(|turn| self.estimate_turn(turn)).sum()
    }

    /// Drop the oldest turns until the estimate fits the limit.
    ///
    /// Keeps the longest contiguous newest suffix that fits, and at least the
    /// newest turn. Returns the number of turns dropped.
    pub fn truncate_to_limit(&mut self) -> usize {
        let mut total = 0usize;
        let mut kept = 0usize;

        for turn in self.turns.iter().rev() {
            let cost = self.estimate_turn(turn);
            if kept > 0 && total + cost > self.max_context_tokens {
                break;
            }
            total += cost;
            kept += 1;
        }

        let dropped = self.turns.len() - kept;
        if dropped > 0 {
            self.turns.drain(..dropped);
            debug!(
                dropped,
                kept,
                estimated_tokens = total,
                limit = self.max_context_tokens,
                "Truncated history to token limit"
            );
        }
        dropped
    }

    pub fn export(&self, format: ExportFormat) -> Result<String> {
        info!(turns = self.turns.len(), ?format, "Exporting history");
        match format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(&self.turns)?),
            ExportFormat::Markdown => Ok(self.export_as_markdown()),
            ExportFormat::Text => Ok(self.export_as_text()),
        }
    }

    fn export_as_markdown(&self) -> String {
        let mut output = String::from("# Conversation History\n\n");
        for turn in &self.turns {
            let role = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            output.push_str(&format!(
                "## {} - {}\n\n{}\n\n---\n\n",
                role,
                turn.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                turn.content
            ));
        }
        output
    }

    fn export_as_text(&self) -> String {
        let mut output = String::from("Conversation History\n");
        output.push_str(&"=".repeat(50));
        output.push_str("\n\n");
        for turn in &self.turns {
            output.push_str(&format!(
                "[{}] {}: {}\n\n",
                turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                turn.role.as_str().to_uppercase(),
                turn.content
            ));
        }
        output
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::from_config(&ConversationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_of(chars: usize, role: Role) -> ConversationTurn {
        ConversationTurn::new(role, "x".repeat(chars))
    }

    #[test]
    fn test_estimate_rounds_up_with_floor_of_one() {
        let history = ConversationHistory::new(100, 0.25);
        assert_eq!(history.estimate_turn(&ConversationTurn::user("")), 1);
        assert_eq!(history.estimate_turn(&turn_of(5, Role::User)), 2);
        assert_eq!(history.estimate_turn(&turn_of(8, Role::User)), 2);
    }

    #[test]
    fn test_truncation_drops_oldest_first() {
        let mut history = ConversationHistory::new(10, 0.25);
        for i in 0..6 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            history.append(ConversationTurn::new(role, format!("turn-{i}-xxxxx")));
        }
        // 12 chars per turn = 3 tokens each; 3 turns fit in 10
        let dropped = history.truncate_to_limit();
        assert_eq!(dropped, 3);
        assert_eq!(history.len(), 3);
        assert!(history.estimated_tokens() <= 10);
        assert_eq!(history.turns()[0].content, "turn-3-xxxxx");
        assert_eq!(history.turns()[2].content, "turn-5-xxxxx");
    }

    #[test]
    fn test_truncation_is_idempotent() {
        let mut history = ConversationHistory::new(10, 0.25);
        for _ in 0..5 {
            history.append(turn_of(12, Role::User));
        }
        history.truncate_to_limit();
        let before = history.snapshot();
        assert_eq!(history.truncate_to_limit(), 0);
        assert_eq!(history.len(), before.len());
    }

    #[test]
    fn test_oversized_newest_turn_is_kept_alone() {
        let mut history = ConversationHistory::new(10, 0.25);
        history.append(turn_of(8, Role::User));
        history.append(turn_of(400, Role::Assistant));

        assert_eq!(history.truncate_to_limit(), 1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.turns()[0].role, Role::Assistant);
    }

    #[test]
    fn test_stops_at_first_turn_that_does_not_fit() {
        let mut history = ConversationHistory::new(10, 0.25);
        history.append(turn_of(4, Role::User)); // 1
        history.append(turn_of(40, Role::Assistant)); // 10
        history.append(turn_of(20, Role::User)); // 5

        history.truncate_to_limit();
        // The tiny oldest turn would fit but is not contiguous with the suffix
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_reset() {
        let mut history = ConversationHistory::default();
        history.append(ConversationTurn::user("Hello"));
        assert_eq!(history.reset(), 1);
        assert!(history.is_empty());
    }

    #[test]
    fn test_export_formats() {
        let mut history = ConversationHistory::default();
        history.append(ConversationTurn::user("Test message"));
        history.append(ConversationTurn::assistant("Test reply"));

        let json = history.export(ExportFormat::Json).unwrap();
        let parsed: Vec<ConversationTurn> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(json.contains("\"role\": \"user\""));

        let md = history.export(ExportFormat::Markdown).unwrap();
        assert!(md.contains("# Conversation History"));
        assert!(md.contains("## Assistant"));

        let text = history.export(ExportFormat::Text).unwrap();
        assert!(text.contains("USER: Test message"));
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("csv".parse::<ExportFormat>().is_err());
    }
}
