//! Parley - voice-enabled assistant interaction core
//!
//! This crate provides the real-time interaction core of a voice/text
//! assistant: transcript accumulation over a speech recognition stream,
//! serialized utterance playback, progressive character-by-character
//! response reveal, and the state machine that orchestrates all three
//! around an external response generator.

pub mod error;
pub mod generator;
pub mod markup;
pub mod orchestrator;
pub mod platform;
pub mod player;
pub mod policy;
pub mod reveal;
pub mod scenario;
pub mod state;
pub mod transcript;

// Re-export error types
pub use error::{ParleyError, Result};

// Re-export core state types
pub use state::{
    AssistantSession, AssistantStatus, InteractionRecord, NoticeSeverity, SessionCommand,
    SessionEvent, SessionSnapshot, SharedSession,
};

// Re-export the orchestrator surface
pub use orchestrator::{AssistantHandle, Orchestrator, OrchestratorConfig};

// Re-export collaborator contracts
pub use generator::{CannedGenerator, ResponseGenerator};
pub use platform::{RecognitionProvider, SynthesisProvider};
