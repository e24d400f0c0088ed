//! Incremental text delivery
//!
//! Backends without native streaming still present a stream to callers:
//! the complete reply is fetched first and then replayed word by word with a
//! fixed pause between fragments. This is emulation, not incremental
//! generation; the reply already exists in full before the first fragment is
//! yielded.

use crate::Result;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;

/// A stream of reply fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Split text into word fragments, each carrying its trailing whitespace.
///
/// Concatenating the fragments reproduces the input exactly.
pub fn split_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut in_whitespace = false;

    for ch in text.chars() {
        let is_space = ch.is_whitespace();
        if !is_space && in_whitespace && !current.is_empty() {
            fragments.push(std::mem::take(&mut current));
        }
        in_whitespace = is_space;
        current.push(ch);
    }

    if !current.is_empty() {
        fragments.push(current);
    }

    fragments
}

/// Replay an already-complete reply as a stream of word fragments.
///
/// The stream is lazy: nothing is produced ahead of the consumer, and
/// dropping it stops the replay.
pub fn emulated_stream(text: String, delay: Duration) -> TextStream {
    let stream = async_stream::stream! {
        for (index, fragment) in split_fragments(&text).into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            yield Ok(fragment);
        }
    };

    Box::pin(stream)
}
