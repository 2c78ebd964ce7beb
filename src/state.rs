//! Unified session state for the Parley assistant
//!
//! This module provides a thread-safe shared state that can be accessed by:
//! - **Orchestrator**: Writes state changes as the interaction cycle advances
//! - **UI**: Reads state for rendering, sends commands
//! - **ScenarioRunner**: Reads state for assertions, sends commands
//!
//! The design separates:
//! - **State**: Shared data that can be queried synchronously
//! - **Commands**: Requests to change state (sent to the orchestrator)
//! - **Events**: Notifications for UI updates (reveal progress, notices)

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ParleyError;

/// Assistant status over one query/response cycle
///
/// Transitions run strictly forward through
/// `Idle -> Thinking -> Searching? -> Doing? -> Generating -> Idle`;
/// the optional phases may each be skipped, and the only backward edge is
/// the terminal return to `Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    /// Ready for a new query
    #[default]
    Idle,
    /// A query was accepted, response generation dispatched
    Thinking,
    /// Optional presentational phase while generation is pending
    Searching,
    /// Optional presentational phase while generation is pending
    Doing,
    /// Response text available, reveal/playback in progress
    Generating,
}

impl AssistantStatus {
    /// Check if the assistant accepts new input
    pub fn is_idle(&self) -> bool {
        matches!(self, AssistantStatus::Idle)
    }

    /// Check if a response is currently being revealed/spoken
    pub fn is_generating(&self) -> bool {
        matches!(self, AssistantStatus::Generating)
    }

    /// Check if a cycle is in flight (anything but idle)
    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }

    /// Check if generation is still pending (pre-response phases)
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            AssistantStatus::Thinking | AssistantStatus::Searching | AssistantStatus::Doing
        )
    }

    /// Returns whether a transition from `self` to `target` is valid
    ///
    /// Forward edges may skip the optional phases; the return to `Idle` is
    /// allowed from any non-idle state so that failed cycles can recover.
    pub fn can_advance_to(&self, target: AssistantStatus) -> bool {
        use AssistantStatus::*;
        matches!(
            (self, target),
            (Idle, Thinking)
                | (Thinking, Searching)
                | (Thinking, Doing)
                | (Thinking, Generating)
                | (Searching, Doing)
                | (Searching, Generating)
                | (Doing, Generating)
                | (Thinking, Idle)
                | (Searching, Idle)
                | (Doing, Idle)
                | (Generating, Idle)
        )
    }
}

impl std::fmt::Display for AssistantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantStatus::Idle => write!(f, "Idle"),
            AssistantStatus::Thinking => write!(f, "Thinking"),
            AssistantStatus::Searching => write!(f, "Searching"),
            AssistantStatus::Doing => write!(f, "Doing"),
            AssistantStatus::Generating => write!(f, "Generating"),
        }
    }
}

impl std::str::FromStr for AssistantStatus {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(AssistantStatus::Idle),
            "thinking" => Ok(AssistantStatus::Thinking),
            "searching" => Ok(AssistantStatus::Searching),
            "doing" => Ok(AssistantStatus::Doing),
            "generating" => Ok(AssistantStatus::Generating),
            other => Err(ParleyError::ConfigError(format!(
                "Unknown assistant status: {}",
                other
            ))),
        }
    }
}

/// A completed query/response pair
///
/// Immutable once created; appended to history in chronological order only
/// after a response has been received.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    /// Create a new record stamped with the current time
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            response: response.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Assistant session state
///
/// This is the single source of truth for the interaction cycle. It is
/// mutated only through the transition methods below, and only by the
/// orchestrator; the UI and scenario runner read it through `SharedSession`.
#[derive(Clone, Debug, Default)]
pub struct AssistantSession {
    /// Current cycle status
    pub status: AssistantStatus,
    /// Query of the in-flight (or last) cycle
    pub current_query: String,
    /// Response of the in-flight (or last) cycle; empty until generation succeeds
    pub current_response: String,
    /// Completed interactions, insertion order chronological
    pub history: Vec<InteractionRecord>,
    /// Pending input field surfaced to the UI (voice segments accumulate here)
    pub pending_input: String,
}

impl AssistantSession {
    /// Create a new idle session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an immutable snapshot of the current state
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            current_query: self.current_query.clone(),
            current_response: self.current_response.clone(),
            history: self.history.clone(),
            pending_input: self.pending_input.clone(),
        }
    }

    // === State transitions ===

    /// Accept a query and enter the thinking phase
    ///
    /// Clears the previous response so the UI never shows a stale reply
    /// against the new query.
    pub fn begin_thinking(&mut self, query: impl Into<String>) -> Result<(), ParleyError> {
        self.advance(AssistantStatus::Thinking)?;
        self.current_query = query.into();
        self.current_response.clear();
        Ok(())
    }

    /// Enter an optional presentational phase (`Searching` or `Doing`)
    pub fn enter_phase(&mut self, phase: AssistantStatus) -> Result<(), ParleyError> {
        if !matches!(phase, AssistantStatus::Searching | AssistantStatus::Doing) {
            return Err(ParleyError::StateError(format!(
                "{} is not a presentational phase",
                phase
            )));
        }
        self.advance(phase)
    }

    /// Record a successful generation: store the response, append history
    ///
    /// The history entry is created here, when the response completes;
    /// reveal and playback settle later without touching history.
    pub fn complete_response(&mut self, response: impl Into<String>) -> Result<(), ParleyError> {
        self.advance(AssistantStatus::Generating)?;
        self.current_response = response.into();
        self.history.push(InteractionRecord::new(
            self.current_query.clone(),
            self.current_response.clone(),
        ));
        Ok(())
    }

    /// Return to idle after reveal and playback have settled
    pub fn settle(&mut self) -> Result<(), ParleyError> {
        self.advance(AssistantStatus::Idle)
    }

    /// Abort the current cycle: back to idle, no response, no history entry
    pub fn fail_cycle(&mut self) {
        tracing::debug!("Cycle failed in status {}, resetting to idle", self.status);
        self.status = AssistantStatus::Idle;
        self.current_response.clear();
    }

    fn advance(&mut self, target: AssistantStatus) -> Result<(), ParleyError> {
        if self.status.can_advance_to(target) {
            tracing::debug!("Assistant status: {} -> {}", self.status, target);
            self.status = target;
            Ok(())
        } else {
            Err(ParleyError::StateError(format!(
                "Invalid status transition: {} -> {}",
                self.status, target
            )))
        }
    }

    // === Pending input ===

    /// Replace the pending input field (typed edits, history selection)
    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    /// Append a finalized voice segment to the pending input, space-joined
    pub fn append_voice_segment(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }
        if !self.pending_input.is_empty() {
            self.pending_input.push(' ');
        }
        self.pending_input.push_str(segment);
    }

    /// Take and clear the pending input
    pub fn take_pending_input(&mut self) -> String {
        std::mem::take(&mut self.pending_input)
    }
}

/// Immutable snapshot of session state
///
/// Used for assertions and rendering without holding locks.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub status: AssistantStatus,
    pub current_query: String,
    pub current_response: String,
    pub history: Vec<InteractionRecord>,
    pub pending_input: String,
}

/// Thread-safe shared session state
///
/// Wraps `AssistantSession` in `Arc<RwLock<>>` for safe concurrent access.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<RwLock<AssistantSession>>,
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSession {
    /// Create a new shared session
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(AssistantSession::new())),
        }
    }

    /// Get a read lock on the session
    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, AssistantSession> {
        self.inner.read()
    }

    /// Get a write lock on the session
    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, AssistantSession> {
        self.inner.write()
    }

    /// Get a snapshot of the current state (no lock held after return)
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().snapshot()
    }

    // === Convenience read methods ===

    /// Current status
    pub fn status(&self) -> AssistantStatus {
        self.inner.read().status
    }

    /// Check if the assistant accepts new input
    pub fn is_idle(&self) -> bool {
        self.inner.read().status.is_idle()
    }

    /// Number of completed interactions
    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    /// Current response text (empty until generation succeeds)
    pub fn current_response(&self) -> String {
        self.inner.read().current_response.clone()
    }

    /// Pending input field contents
    pub fn pending_input(&self) -> String {
        self.inner.read().pending_input.clone()
    }
}

/// Commands that can be sent to control the assistant
///
/// These are processed by the orchestrator and result in state changes.
#[derive(Clone, Debug)]
pub enum SessionCommand {
    /// Submit a query (empty/whitespace-only queries are ignored)
    Submit(String),
    /// Begin a listening session (no-op when unsupported or already listening)
    StartListening,
    /// End the current listening session (no-op when not listening)
    StopListening,
    /// Start or stop listening depending on the current session state
    ToggleListening,
    /// Copy a history record's query into the pending input field
    SelectHistory(usize),
    /// Silence any active utterance
    CancelPlayback,
    /// Tear down recognition, playback, reveal and the generator worker
    Shutdown,
}

/// Severity of a user-facing notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Error,
}

/// Events emitted by the orchestrator
///
/// These drive UI updates. State should be queried from `SharedSession`
/// rather than reconstructed from events; reveal progress is the exception,
/// since the reveal buffer is owned by the animator and streamed out here.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Session state has changed (trigger a repaint)
    StateChanged,
    /// A new reveal cycle started; any displayed response text is stale
    RevealReset,
    /// The next fragment of the response was revealed
    RevealChar(String),
    /// The full response has been revealed
    RevealCompleted,
    /// Playback started or stopped
    SpeakingChanged(bool),
    /// A listening session started or ended
    ListeningChanged(bool),
    /// Interim transcript replaced (empty when cleared)
    InterimChanged(String),
    /// The pending input field now holds this value
    InputChanged(String),
    /// User-facing notification
    Notice {
        severity: NoticeSeverity,
        message: String,
    },
    /// Orchestrator has shut down
    Shutdown,
}
