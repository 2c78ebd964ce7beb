//! Utterance playback over a speech synthesis provider
//!
//! Serializes playback: every `speak` cancels any in-flight utterance before
//! submitting the next one, so at most one utterance is ever active. Each
//! utterance carries a fresh id; lifecycle events for ids other than the
//! active one are dropped, which is what makes cancellation silent.

use crossbeam_channel::Receiver;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::platform::{SynthesisEvent, SynthesisProvider, UtteranceRequest, Voice};

/// Playback parameters fixed at configuration time
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Speech rate (1.0 = normal)
    pub rate: f32,
    /// Voice pitch (1.0 = normal)
    pub pitch: f32,
    /// Playback volume (0.0..=1.0)
    pub volume: f32,
    /// Language prefix used when picking a default voice, e.g. "en"
    pub preferred_language: String,
    /// Explicit voice name override, checked before the language policy
    pub voice_override: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            preferred_language: "en".to_string(),
            voice_override: None,
        }
    }
}

impl PlaybackConfig {
    /// Set the speech rate
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the voice pitch
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the playback volume
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    /// Set the preferred language prefix for voice selection
    pub fn with_preferred_language(mut self, language: impl Into<String>) -> Self {
        self.preferred_language = language.into();
        self
    }

    /// Pin a specific voice by name
    pub fn with_voice_override(mut self, name: impl Into<String>) -> Self {
        self.voice_override = Some(name.into());
        self
    }
}

/// Playback state, transient per utterance
#[derive(Clone, Debug, Default)]
pub struct PlaybackState {
    /// True between the active utterance's `Started` and its terminal event
    pub speaking: bool,
    /// Id and text of the active utterance, if any
    pub active: Option<(Uuid, String)>,
}

/// Player-level lifecycle notifications, already filtered to the active utterance
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The active utterance began playing
    Started,
    /// The active utterance completed normally
    Ended,
    /// The active utterance failed (no `Ended` follows)
    Error(String),
    /// The platform voice list was reloaded
    VoicesChanged,
}

/// Speech synthesis adapter enforcing at-most-one active utterance
pub struct UtterancePlayer {
    provider: Box<dyn SynthesisProvider>,
    config: PlaybackConfig,
    voices: Vec<Voice>,
    state: PlaybackState,
}

impl UtterancePlayer {
    /// Create a player over a synthesis provider
    pub fn new(provider: Box<dyn SynthesisProvider>, config: PlaybackConfig) -> Self {
        let voices = provider.voices();
        Self {
            provider,
            config,
            voices,
            state: PlaybackState::default(),
        }
    }

    /// Whether the platform can synthesize speech
    pub fn has_support(&self) -> bool {
        self.provider.has_support()
    }

    /// Whether an utterance is currently audible
    pub fn is_speaking(&self) -> bool {
        self.state.speaking
    }

    /// Id of the active utterance, if one is in flight
    pub fn active_utterance(&self) -> Option<Uuid> {
        self.state.active.as_ref().map(|(id, _)| *id)
    }

    /// Currently cached voice list
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// The platform event stream to drive `handle_event` with
    pub fn platform_events(&self) -> Receiver<SynthesisEvent> {
        self.provider.events()
    }

    /// Speak a response, cancelling any in-flight utterance first
    ///
    /// No-op returning `None` when synthesis is unsupported; otherwise the
    /// id of the new utterance.
    pub fn speak(&mut self, text: &str) -> Option<Uuid> {
        if !self.has_support() {
            debug!("Synthesis unsupported, ignoring speak");
            return None;
        }

        self.cancel();

        let id = Uuid::new_v4();
        let request = UtteranceRequest {
            id,
            text: text.to_string(),
            voice: select_voice(&self.voices, &self.config),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
        };

        if let Err(e) = self.provider.speak(request) {
            warn!("Utterance submission failed: {}", e);
            return None;
        }

        // speaking flips true only on the platform's Started event
        self.state.active = Some((id, text.to_string()));
        debug!("Utterance {} submitted ({} chars)", id, text.len());
        Some(id)
    }

    /// Silently stop the active utterance, if any
    pub fn cancel(&mut self) {
        if let Some((id, _)) = self.state.active.take() {
            debug!("Cancelling utterance {}", id);
            self.provider.cancel();
            self.state.speaking = false;
        }
    }

    /// Process one platform event
    ///
    /// Returns a player-level event for the active utterance, or `None` for
    /// events belonging to a cancelled/superseded one.
    pub fn handle_event(&mut self, event: SynthesisEvent) -> Option<PlayerEvent> {
        match event {
            SynthesisEvent::Started(id) => {
                if self.is_active(id) {
                    self.state.speaking = true;
                    Some(PlayerEvent::Started)
                } else {
                    debug!("Dropping Started for inactive utterance {}", id);
                    None
                }
            }
            SynthesisEvent::Ended(id) => {
                if self.is_active(id) {
                    self.state.speaking = false;
                    self.state.active = None;
                    Some(PlayerEvent::Ended)
                } else {
                    debug!("Dropping Ended for inactive utterance {}", id);
                    None
                }
            }
            SynthesisEvent::Error { id, message } => {
                if self.is_active(id) {
                    warn!("Playback error for utterance {}: {}", id, message);
                    self.state.speaking = false;
                    self.state.active = None;
                    Some(PlayerEvent::Error(message))
                } else {
                    debug!("Dropping Error for inactive utterance {}", id);
                    None
                }
            }
            SynthesisEvent::VoicesChanged => {
                self.voices = self.provider.voices();
                debug!("Voice list reloaded ({} voices)", self.voices.len());
                Some(PlayerEvent::VoicesChanged)
            }
        }
    }

    fn is_active(&self, id: Uuid) -> bool {
        self.state.active.as_ref().is_some_and(|(active, _)| *active == id)
    }
}

/// Voice selection policy
///
/// Explicit override by name first; else the first voice whose language
/// matches the preferred prefix and runs on-device; else the first voice;
/// else none.
pub(crate) fn select_voice(voices: &[Voice], config: &PlaybackConfig) -> Option<Voice> {
    if let Some(name) = &config.voice_override {
        if let Some(voice) = voices.iter().find(|v| &v.name == name) {
            return Some(voice.clone());
        }
    }

    voices
        .iter()
        .find(|v| v.language.starts_with(&config.preferred_language) && v.local)
        .or_else(|| voices.first())
        .cloned()
}
