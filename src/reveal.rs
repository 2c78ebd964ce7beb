//! Progressive response reveal
//!
//! Converts a complete response string into a character stream revealed one
//! character per tick. The orchestrator owns the tick cadence (a
//! `crossbeam_channel::tick` receiver in its select loop); this module owns
//! the reveal state itself. Replacing the source is a single `&mut self`
//! call that also zeroes progress, so no observer can combine a stale count
//! with the new text.

use crate::markup::{parse_segments, ResponseSegment};

/// Configuration for the reveal cadence
#[derive(Clone, Debug)]
pub struct RevealConfig {
    /// Interval between revealed characters, in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 15 }
    }
}

impl RevealConfig {
    /// Set the tick interval in milliseconds
    pub fn with_tick_interval_ms(mut self, interval: u64) -> Self {
        self.tick_interval_ms = interval;
        self
    }
}

/// Reveal progress over one response display cycle
#[derive(Clone, Debug, Default)]
pub struct RevealAnimator {
    source: String,
    revealed_bytes: usize,
    revealed_chars: usize,
}

impl RevealAnimator {
    /// Create an animator with no source text
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source text, atomically discarding all progress
    pub fn set_source(&mut self, text: impl Into<String>) {
        self.source = text.into();
        self.revealed_bytes = 0;
        self.revealed_chars = 0;
    }

    /// Clear the source text and progress
    pub fn clear(&mut self) {
        self.set_source(String::new());
    }

    /// Reveal the next character
    ///
    /// Returns the newly revealed fragment, or `None` once the source is
    /// fully revealed.
    pub fn tick(&mut self) -> Option<&str> {
        let next = self.source[self.revealed_bytes..].chars().next()?;
        let start = self.revealed_bytes;
        self.revealed_bytes += next.len_utf8();
        self.revealed_chars += 1;
        Some(&self.source[start..self.revealed_bytes])
    }

    /// The currently revealed prefix
    pub fn revealed(&self) -> &str {
        &self.source[..self.revealed_bytes]
    }

    /// The full source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of characters revealed so far
    pub fn revealed_chars(&self) -> usize {
        self.revealed_chars
    }

    /// Whether the full source has been revealed
    pub fn is_complete(&self) -> bool {
        self.revealed_bytes == self.source.len()
    }

    /// Whether the caught-up cursor indicator should show
    ///
    /// The cursor marks "revealed text has caught up with the stream": it
    /// appears only once the whole current source is revealed while the
    /// assistant is still in its generating phase, never during typing.
    pub fn cursor_visible(&self, is_generating: bool) -> bool {
        is_generating && self.is_complete()
    }

    /// Prose/code segmentation of the revealed prefix
    ///
    /// Fences whose closing marker has not been revealed yet render as
    /// plain prose.
    pub fn revealed_segments(&self) -> Vec<ResponseSegment> {
        parse_segments(self.revealed())
    }
}
