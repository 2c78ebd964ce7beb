//! Speech synthesis provider interface
//!
//! Models an utterance-playback primitive with start/end/error lifecycle
//! events and an asynchronously populated voice list. The platform may load
//! voices after construction; a `VoicesChanged` event tells consumers to
//! re-query without disturbing an utterance already in progress.

use crossbeam_channel::Receiver;
use uuid::Uuid;

use crate::error::Result;

/// A synthesis voice as reported by the platform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voice {
    /// Platform voice name (used for explicit overrides)
    pub name: String,
    /// BCP 47 language tag, e.g. "en-US"
    pub language: String,
    /// True when the voice runs on-device rather than via a network service
    pub local: bool,
}

impl Voice {
    /// Create a voice descriptor
    pub fn new(name: impl Into<String>, language: impl Into<String>, local: bool) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            local,
        }
    }
}

/// A playback request submitted to the platform
#[derive(Clone, Debug)]
pub struct UtteranceRequest {
    /// Identity used to correlate lifecycle events
    pub id: Uuid,
    /// Text to speak
    pub text: String,
    /// Selected voice, if any was available
    pub voice: Option<Voice>,
    /// Speech rate (1.0 = normal)
    pub rate: f32,
    /// Voice pitch (1.0 = normal)
    pub pitch: f32,
    /// Playback volume (0.0..=1.0)
    pub volume: f32,
}

/// Lifecycle events emitted by the synthesis platform
#[derive(Clone, Debug)]
pub enum SynthesisEvent {
    /// Playback of the identified utterance began
    Started(Uuid),
    /// Playback completed normally
    Ended(Uuid),
    /// Playback failed; no `Ended` follows
    Error { id: Uuid, message: String },
    /// The platform's voice list changed; re-query `voices()`
    VoicesChanged,
}

/// Injected speech synthesis capability
///
/// `cancel` is silent: the platform emits no further lifecycle events for a
/// cancelled utterance, and any that were already in flight are correlated
/// away by the utterance id.
pub trait SynthesisProvider: Send {
    /// Whether the platform can synthesize speech at all
    fn has_support(&self) -> bool;

    /// Currently available voices (may be empty until the platform loads them)
    fn voices(&self) -> Vec<Voice>;

    /// The provider's lifecycle event stream
    fn events(&self) -> Receiver<SynthesisEvent>;

    /// Submit an utterance for playback
    fn speak(&mut self, request: UtteranceRequest) -> Result<()>;

    /// Immediately stop any active utterance, emitting no further events for it
    fn cancel(&mut self);
}
