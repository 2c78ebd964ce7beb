//! Speech recognition provider interface
//!
//! Models a continuous recognition stream: a session is started with a
//! locale, result events carry zero or more segments each tagged
//! interim/final, and the stream ends with an `Ended` event.

use crossbeam_channel::Receiver;

use crate::error::Result;

/// Configuration passed to the recognizer at session creation
#[derive(Clone, Debug)]
pub struct RecognitionConfig {
    /// BCP 47 locale tag handed through to the platform
    pub locale: String,
    /// Keep the session open across utterances
    pub continuous: bool,
    /// Deliver interim (revisable) results
    pub interim_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            continuous: true,
            interim_results: true,
        }
    }
}

impl RecognitionConfig {
    /// Create a config for the given locale
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            ..Default::default()
        }
    }

    /// Set whether the session stays open across utterances
    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Set whether interim results are delivered
    pub fn with_interim_results(mut self, interim_results: bool) -> Self {
        self.interim_results = interim_results;
        self
    }
}

/// One recognition result entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognitionSegment {
    /// Recognized text
    pub text: String,
    /// True when the platform guarantees this text will not be revised
    pub is_final: bool,
}

impl RecognitionSegment {
    /// A finalized segment
    pub fn finalized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    /// An interim (revisable) segment
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Events delivered by a recognition session
#[derive(Clone, Debug)]
pub enum RecognitionEvent {
    /// A result event carrying zero or more segments
    Result(Vec<RecognitionSegment>),
    /// The session ended (requested stop or platform-side end)
    Ended,
    /// A runtime error inside an active session
    Error(String),
}

/// Injected speech recognition capability
///
/// The provider owns a single event channel for its lifetime; `start` and
/// `stop` open and close the flow of events on it. Callers must check
/// `has_support()` before offering the feature; `start` on an unsupported
/// provider is an error, not a crash.
pub trait RecognitionProvider: Send {
    /// Whether the platform can recognize speech at all
    fn has_support(&self) -> bool;

    /// The provider's event stream (stable across sessions)
    fn events(&self) -> Receiver<RecognitionEvent>;

    /// Open a recognition session with the given configuration
    fn start(&mut self, config: &RecognitionConfig) -> Result<()>;

    /// Request the current session to stop; the provider emits `Ended`
    fn stop(&mut self);
}
