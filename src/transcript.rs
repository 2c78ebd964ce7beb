//! Transcript accumulation over a speech recognition stream
//!
//! Wraps a `RecognitionProvider` session and separates interim from final
//! segments: finalized text joins a monotonically growing transcript,
//! interim text is replaced wholesale on every event. One listening session
//! spans one start/stop toggle; starting a new session resets the buffer.

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::error::Result;
use crate::platform::{RecognitionConfig, RecognitionEvent, RecognitionProvider};

/// Transcript state for one listening session
#[derive(Clone, Debug, Default)]
pub struct TranscriptBuffer {
    final_transcript: String,
    interim_transcript: String,
}

impl TranscriptBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized segment, space-joined
    pub fn append_final(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        if !self.final_transcript.is_empty() {
            self.final_transcript.push(' ');
        }
        self.final_transcript.push_str(segment);
    }

    /// Replace the interim transcript wholesale
    pub fn set_interim(&mut self, text: impl Into<String>) {
        self.interim_transcript = text.into();
    }

    /// Clear interim text only (session end)
    pub fn clear_interim(&mut self) {
        self.interim_transcript.clear();
    }

    /// Reset both fields (new session)
    pub fn reset(&mut self) {
        self.final_transcript.clear();
        self.interim_transcript.clear();
    }

    /// The accumulated final transcript
    pub fn final_transcript(&self) -> &str {
        &self.final_transcript
    }

    /// The current interim transcript
    pub fn interim_transcript(&self) -> &str {
        &self.interim_transcript
    }
}

/// Events produced while accumulating a transcript
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A segment was finalized (emitted once per finalized segment)
    FinalSegment(String),
    /// The interim transcript was replaced (empty when cleared)
    InterimChanged(String),
    /// The listening session ended
    SessionEnded,
    /// A runtime recognition error
    Error(String),
}

/// Speech recognition adapter that accumulates a transcript
pub struct TranscriptAccumulator {
    provider: Box<dyn RecognitionProvider>,
    config: RecognitionConfig,
    buffer: TranscriptBuffer,
    listening: bool,
}

impl TranscriptAccumulator {
    /// Create an accumulator over a recognition provider
    pub fn new(provider: Box<dyn RecognitionProvider>, config: RecognitionConfig) -> Self {
        Self {
            provider,
            config,
            buffer: TranscriptBuffer::new(),
            listening: false,
        }
    }

    /// Whether the platform can recognize speech
    pub fn has_support(&self) -> bool {
        self.provider.has_support()
    }

    /// Whether a listening session is open
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// The platform event stream to drive `handle_event` with
    pub fn platform_events(&self) -> Receiver<RecognitionEvent> {
        self.provider.events()
    }

    /// Begin a listening session
    ///
    /// Returns `Ok(true)` when a new session was started, `Ok(false)` on the
    /// no-op paths (unsupported platform, already listening). A rejected
    /// start leaves the accumulator not-listening and propagates the error
    /// for the caller to surface.
    pub fn start_listening(&mut self) -> Result<bool> {
        if !self.has_support() {
            debug!("Recognition unsupported, ignoring start_listening");
            return Ok(false);
        }
        if self.listening {
            debug!("Already listening, ignoring start_listening");
            return Ok(false);
        }

        self.buffer.reset();
        self.provider.start(&self.config)?;
        self.listening = true;
        debug!("Listening session started (locale: {})", self.config.locale);
        Ok(true)
    }

    /// End the listening session (no-op when not listening)
    ///
    /// The provider acknowledges with an `Ended` event, which clears the
    /// interim transcript and yields `SessionEnded`.
    pub fn stop_listening(&mut self) {
        if !self.listening {
            debug!("Not listening, ignoring stop_listening");
            return;
        }
        self.listening = false;
        self.provider.stop();
        debug!("Listening session stop requested");
    }

    /// Process one platform event, in arrival order
    pub fn handle_event(&mut self, event: RecognitionEvent) -> Vec<TranscriptEvent> {
        let mut out = Vec::new();
        match event {
            RecognitionEvent::Result(segments) => {
                let mut interim = String::new();
                for segment in segments {
                    if segment.is_final {
                        self.buffer.append_final(&segment.text);
                        out.push(TranscriptEvent::FinalSegment(segment.text));
                    } else {
                        interim.push_str(&segment.text);
                    }
                }
                // Interim reflects only the current event's unfinalized content
                self.buffer.set_interim(interim.clone());
                out.push(TranscriptEvent::InterimChanged(interim));
            }
            RecognitionEvent::Ended => {
                self.listening = false;
                self.buffer.clear_interim();
                out.push(TranscriptEvent::InterimChanged(String::new()));
                out.push(TranscriptEvent::SessionEnded);
            }
            RecognitionEvent::Error(message) => {
                warn!("Recognition error: {}", message);
                out.push(TranscriptEvent::Error(message));
            }
        }
        out
    }

    /// The accumulated final transcript of the current session
    pub fn final_transcript(&self) -> &str {
        self.buffer.final_transcript()
    }

    /// The latest interim transcript
    pub fn interim_transcript(&self) -> &str {
        self.buffer.interim_transcript()
    }
}
