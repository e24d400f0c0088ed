//! Heuristic gate for provider replies

use serde::{Deserialize, Serialize};

pub const DEFAULT_REFUSAL_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i cannot answer",
    "i can't answer",
    "as an ai",
    "i'm sorry, but i cannot",
    "i cannot provide",
    "i am unable to",
];

pub const DEFAULT_GENERIC_PHRASES: &[&str] = &[
    "that's an interesting question",
    "it depends on various factors",
    "it's hard to say",
    "great question",
];

/// Thresholds and phrase lists used by [`assess`].
///
/// Phrases are matched as lowercase substrings of the lowercased reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRules {
    pub refusal_phrases: Vec<String>,
    pub generic_phrases: Vec<String>,
    /// Replies shorter than this (in characters, after trimming) are rejected
    pub min_chars: usize,
    /// Generic phrases only disqualify replies shorter than this
    pub short_response_chars: usize,
}

impl QualityRules {
    pub fn with_refusal_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refusal_phrases = phrases.into_iter().map(|p| p.into().to_lowercase()).collect();
        self
    }

    pub fn with_generic_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_phrases = phrases.into_iter().map(|p| p.into().to_lowercase()).collect();
        self
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            refusal_phrases: DEFAULT_REFUSAL_PHRASES.iter().map(|p| p.to_string()).collect(),
            generic_phrases: DEFAULT_GENERIC_PHRASES.iter().map(|p| p.to_string()).collect(),
            min_chars: 20,
            short_response_chars: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityVerdict {
    Acceptable,
    TooShort { chars: usize },
    Refusal(String),
    Generic(String),
}

impl QualityVerdict {
    pub fn is_acceptable(&self) -> bool {
        matches!(self, QualityVerdict::Acceptable)
    }
}

impl std::fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityVerdict::Acceptable => write!(f, "acceptable"),
            QualityVerdict::TooShort { chars } => write!(f, "too short ({chars} chars)"),
            QualityVerdict::Refusal(phrase) => write!(f, "refusal phrase \"{phrase}\""),
            QualityVerdict::Generic(phrase) => write!(f, "generic phrase \"{phrase}\""),
        }
    }
}

pub fn assess(text: &str, rules: &QualityRules) -> QualityVerdict {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if chars < rules.min_chars {
        return QualityVerdict::TooShort { chars };
    }

    let lowered = trimmed.to_lowercase();
    if let Some(phrase) = rules.refusal_phrases.iter().find(|p| lowered.contains(p.as_str())) {
        return QualityVerdict::Refusal(phrase.clone());
    }

    if chars < rules.short_response_chars {
        if let Some(phrase) = rules.generic_phrases.iter().find(|p| lowered.contains(p.as_str())) {
            return QualityVerdict::Generic(phrase.clone());
        }
    }

    QualityVerdict::Acceptable
}

pub fn is_quality_response(text: &str, rules: &QualityRules) -> bool {
    assess(text, rules).is_acceptable()
}
