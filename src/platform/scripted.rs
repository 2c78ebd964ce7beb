//! Scripted platform providers for tests and the demo binary
//!
//! These providers satisfy the recognition/synthesis contracts without any
//! real audio stack: a controller handle feeds recognition events or drives
//! utterance lifecycles by hand, and the synthesis provider can optionally
//! auto-complete every utterance for end-to-end runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{ParleyError, Result};
use crate::platform::recognition::{
    RecognitionConfig, RecognitionEvent, RecognitionProvider, RecognitionSegment,
};
use crate::platform::synthesis::{SynthesisEvent, SynthesisProvider, UtteranceRequest, Voice};

/// Scripted recognition provider
///
/// Events pushed through the controller handle appear on the provider's
/// event stream in push order. `stop` emits `Ended`, mirroring a platform
/// that acknowledges a requested stop with an end-of-session event.
pub struct ScriptedRecognition {
    supported: bool,
    fail_start: bool,
    active: Arc<AtomicBool>,
    last_config: Arc<Mutex<Option<RecognitionConfig>>>,
    event_tx: Sender<RecognitionEvent>,
    event_rx: Receiver<RecognitionEvent>,
}

impl ScriptedRecognition {
    /// A supported recognizer
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            supported: true,
            fail_start: false,
            active: Arc::new(AtomicBool::new(false)),
            last_config: Arc::new(Mutex::new(None)),
            event_tx,
            event_rx,
        }
    }

    /// A platform with no recognition capability
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// A supported recognizer whose session start is rejected
    /// (e.g. microphone permission denied)
    pub fn with_start_failure() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Controller handle for feeding events from a test
    pub fn controller(&self) -> ScriptedRecognitionHandle {
        ScriptedRecognitionHandle {
            event_tx: self.event_tx.clone(),
            active: self.active.clone(),
            last_config: self.last_config.clone(),
        }
    }
}

impl Default for ScriptedRecognition {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionProvider for ScriptedRecognition {
    fn has_support(&self) -> bool {
        self.supported
    }

    fn events(&self) -> Receiver<RecognitionEvent> {
        self.event_rx.clone()
    }

    fn start(&mut self, config: &RecognitionConfig) -> Result<()> {
        if !self.supported {
            return Err(ParleyError::RecognitionError(
                "recognition is not supported on this platform".into(),
            ));
        }
        if self.fail_start {
            return Err(ParleyError::RecognitionError("permission denied".into()));
        }
        *self.last_config.lock() = Some(config.clone());
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::SeqCst) {
            let _ = self.event_tx.send(RecognitionEvent::Ended);
        }
    }
}

/// Test-side controller for a `ScriptedRecognition`
#[derive(Clone)]
pub struct ScriptedRecognitionHandle {
    event_tx: Sender<RecognitionEvent>,
    active: Arc<AtomicBool>,
    last_config: Arc<Mutex<Option<RecognitionConfig>>>,
}

impl ScriptedRecognitionHandle {
    /// Push a raw recognition event
    pub fn push(&self, event: RecognitionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Push a result event with the given segments
    pub fn result(&self, segments: Vec<RecognitionSegment>) {
        self.push(RecognitionEvent::Result(segments));
    }

    /// Push a single finalized segment
    pub fn finalized(&self, text: &str) {
        self.result(vec![RecognitionSegment::finalized(text)]);
    }

    /// Push a single interim segment
    pub fn interim(&self, text: &str) {
        self.result(vec![RecognitionSegment::interim(text)]);
    }

    /// End the session from the platform side
    pub fn end_session(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.push(RecognitionEvent::Ended);
    }

    /// Emit a runtime recognition error
    pub fn error(&self, message: &str) {
        self.push(RecognitionEvent::Error(message.to_string()));
    }

    /// Whether a session is currently open
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The locale the most recent session was started with
    pub fn last_locale(&self) -> Option<String> {
        self.last_config.lock().as_ref().map(|c| c.locale.clone())
    }
}

/// Scripted synthesis provider
///
/// In auto-finish mode every `speak` immediately emits `Started` followed by
/// `Ended`, which is enough for end-to-end orchestration runs. Manual mode
/// leaves the lifecycle to the controller handle so tests can interleave
/// cancellation with in-flight utterances.
pub struct ScriptedSynthesis {
    supported: bool,
    auto_finish: bool,
    voices: Arc<RwLock<Vec<Voice>>>,
    spoken: Arc<Mutex<Vec<UtteranceRequest>>>,
    cancels: Arc<AtomicUsize>,
    event_tx: Sender<SynthesisEvent>,
    event_rx: Receiver<SynthesisEvent>,
}

impl ScriptedSynthesis {
    /// A supported synthesizer that auto-completes every utterance
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            supported: true,
            auto_finish: true,
            voices: Arc::new(RwLock::new(vec![Voice::new("Default", "en-US", true)])),
            spoken: Arc::new(Mutex::new(Vec::new())),
            cancels: Arc::new(AtomicUsize::new(0)),
            event_tx,
            event_rx,
        }
    }

    /// A supported synthesizer whose lifecycle is driven by the controller
    pub fn manual() -> Self {
        Self {
            auto_finish: false,
            ..Self::new()
        }
    }

    /// A platform with no synthesis capability
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Replace the initial voice list
    pub fn with_voices(self, voices: Vec<Voice>) -> Self {
        *self.voices.write() = voices;
        self
    }

    /// Controller handle for driving lifecycles from a test
    pub fn controller(&self) -> ScriptedSynthesisHandle {
        ScriptedSynthesisHandle {
            event_tx: self.event_tx.clone(),
            voices: self.voices.clone(),
            spoken: self.spoken.clone(),
            cancels: self.cancels.clone(),
        }
    }
}

impl Default for ScriptedSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisProvider for ScriptedSynthesis {
    fn has_support(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.read().clone()
    }

    fn events(&self) -> Receiver<SynthesisEvent> {
        self.event_rx.clone()
    }

    fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        if !self.supported {
            return Err(ParleyError::SynthesisError(
                "synthesis is not supported on this platform".into(),
            ));
        }
        let id = request.id;
        self.spoken.lock().push(request);
        if self.auto_finish {
            let _ = self.event_tx.send(SynthesisEvent::Started(id));
            let _ = self.event_tx.send(SynthesisEvent::Ended(id));
        }
        Ok(())
    }

    fn cancel(&mut self) {
        // Cancellation is silent: no lifecycle events for the dropped utterance
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test-side controller for a `ScriptedSynthesis`
#[derive(Clone)]
pub struct ScriptedSynthesisHandle {
    event_tx: Sender<SynthesisEvent>,
    voices: Arc<RwLock<Vec<Voice>>>,
    spoken: Arc<Mutex<Vec<UtteranceRequest>>>,
    cancels: Arc<AtomicUsize>,
}

impl ScriptedSynthesisHandle {
    /// All utterances submitted so far, in order
    pub fn spoken(&self) -> Vec<UtteranceRequest> {
        self.spoken.lock().clone()
    }

    /// The most recently submitted utterance
    pub fn last_spoken(&self) -> Option<UtteranceRequest> {
        self.spoken.lock().last().cloned()
    }

    /// How many times the platform-level cancel was invoked
    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Emit `Started` for an utterance
    pub fn begin(&self, id: Uuid) {
        let _ = self.event_tx.send(SynthesisEvent::Started(id));
    }

    /// Emit a normal `Ended` for an utterance
    pub fn finish(&self, id: Uuid) {
        let _ = self.event_tx.send(SynthesisEvent::Ended(id));
    }

    /// Emit a playback `Error` for an utterance
    pub fn fail(&self, id: Uuid, message: &str) {
        let _ = self.event_tx.send(SynthesisEvent::Error {
            id,
            message: message.to_string(),
        });
    }

    /// Replace the voice list and signal the change
    pub fn set_voices(&self, voices: Vec<Voice>) {
        *self.voices.write() = voices;
        let _ = self.event_tx.send(SynthesisEvent::VoicesChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_recognition_round_trip() {
        let mut provider = ScriptedRecognition::new();
        let controller = provider.controller();
        let events = provider.events();

        provider.start(&RecognitionConfig::new("en-GB")).unwrap();
        assert!(controller.is_active());
        assert_eq!(controller.last_locale().as_deref(), Some("en-GB"));

        controller.finalized("hello");
        provider.stop();

        match events.recv().unwrap() {
            RecognitionEvent::Result(segments) => {
                assert_eq!(segments, vec![RecognitionSegment::finalized("hello")]);
            }
            other => panic!("Expected Result event, got {:?}", other),
        }
        assert!(matches!(events.recv().unwrap(), RecognitionEvent::Ended));
        assert!(!controller.is_active());
    }

    #[test]
    fn test_unsupported_recognition_rejects_start() {
        let mut provider = ScriptedRecognition::unsupported();
        assert!(!provider.has_support());
        assert!(provider.start(&RecognitionConfig::default()).is_err());
    }

    #[test]
    fn test_start_failure() {
        let mut provider = ScriptedRecognition::with_start_failure();
        assert!(provider.has_support());
        let err = provider.start(&RecognitionConfig::default()).unwrap_err();
        assert!(matches!(err, ParleyError::RecognitionError(_)));
        assert!(!provider.controller().is_active());
    }

    #[test]
    fn test_stop_without_session_is_silent() {
        let mut provider = ScriptedRecognition::new();
        let events = provider.events();
        provider.stop();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_auto_finish_synthesis() {
        let mut provider = ScriptedSynthesis::new();
        let controller = provider.controller();
        let events = provider.events();

        let id = Uuid::new_v4();
        provider
            .speak(UtteranceRequest {
                id,
                text: "hello".into(),
                voice: None,
                rate: 1.0,
                pitch: 1.0,
                volume: 1.0,
            })
            .unwrap();

        assert!(matches!(events.recv().unwrap(), SynthesisEvent::Started(got) if got == id));
        assert!(matches!(events.recv().unwrap(), SynthesisEvent::Ended(got) if got == id));
        assert_eq!(controller.spoken().len(), 1);
    }

    #[test]
    fn test_manual_synthesis_emits_nothing_on_its_own() {
        let mut provider = ScriptedSynthesis::manual();
        let events = provider.events();
        provider
            .speak(UtteranceRequest {
                id: Uuid::new_v4(),
                text: "quiet".into(),
                voice: None,
                rate: 1.0,
                pitch: 1.0,
                volume: 1.0,
            })
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_voices_changed_signal() {
        let provider = ScriptedSynthesis::new();
        let controller = provider.controller();
        let events = provider.events();

        controller.set_voices(vec![Voice::new("Nova", "fi-FI", false)]);
        assert!(matches!(events.recv().unwrap(), SynthesisEvent::VoicesChanged));
        assert_eq!(provider.voices()[0].name, "Nova");
    }
}
