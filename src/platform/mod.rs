//! Platform capability providers
//!
//! The speech recognition and synthesis platforms are external collaborators.
//! Rather than reaching into ambient process-wide state, the core receives
//! them as injected providers; an unsupported platform is expressed through
//! `has_support()` rather than errors, and deterministic scripted providers
//! back the test suite and the demo binary.

pub mod recognition;
pub mod scripted;
pub mod synthesis;

pub use recognition::{
    RecognitionConfig, RecognitionEvent, RecognitionProvider, RecognitionSegment,
};
pub use scripted::{
    ScriptedRecognition, ScriptedRecognitionHandle, ScriptedSynthesis, ScriptedSynthesisHandle,
};
pub use synthesis::{SynthesisEvent, SynthesisProvider, UtteranceRequest, Voice};
