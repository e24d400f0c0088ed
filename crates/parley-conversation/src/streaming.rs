//! Stream chunks and their Server-Sent Events rendering

use crate::Result;
use serde::{Deserialize, Serialize};

/// Source tag of the single chunk emitted while the circuit is open
pub const SOURCE_DEGRADED: &str = "Degraded";

/// Source tag of the terminal chunk emitted when a stream cannot finish
pub const SOURCE_ERROR: &str = "Error";

/// One fragment of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub chunk: String,
    pub source: String,
}

impl StreamChunk {
    pub fn new(chunk: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
            source: source.into(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(message, SOURCE_DEGRADED)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, SOURCE_ERROR)
    }

    pub fn is_error(&self) -> bool {
        self.source == SOURCE_ERROR
    }
}

/// SSE event formatter
pub struct SseFormatter;

impl SseFormatter {
    /// Format a chunk as an SSE `data:` event
    pub fn format(chunk: &StreamChunk) -> Result<String> {
        let json = serde_json::to_string(chunk)?;
        Ok(format!("data: {}\n\n", json))
    }

    /// Format an error message as a terminal SSE event
    pub fn format_error(message: &str) -> String {
        Self::format(&StreamChunk::error(message))
            .unwrap_or_else(|_| format!("data: {{\"chunk\":\"\",\"source\":\"{SOURCE_ERROR}\"}}\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_formatting() {
        let chunk = StreamChunk::new("Hello", "together:test-model");
        let sse = SseFormatter::format(&chunk).unwrap();
        assert!(sse.starts_with("data: "));
        assert!(sse.ends_with("\n\n"));
        assert!(sse.contains("\"chunk\":\"Hello\""));
        assert!(sse.contains("\"source\":\"together:test-model\""));
    }

    #[test]
    fn test_error_event() {
        let sse = SseFormatter::format_error("stream interrupted");
        assert!(sse.contains("\"source\":\"Error\""));
        assert!(StreamChunk::error("").is_error());
    }
}
