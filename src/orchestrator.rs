//! Orchestrator for the assistant interaction cycle
//!
//! This is the interaction state machine. It owns the shared session and is
//! the only writer to it; the transcript accumulator, utterance player,
//! reveal animator and generator worker are driven from a single select
//! loop, so their independently-timed events are serialized into one
//! mutation order:
//! - External commands (from the UI or scenario runner)
//! - Recognition events (in platform arrival order)
//! - Synthesis lifecycle events
//! - Generator completion/failure
//! - The periodic reveal tick
//!
//! A response replacement (new cycle, new response) is applied within a
//! single select arm, so no tick can observe a reveal count against a
//! superseded response.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ParleyError, Result};
use crate::generator::{GeneratorCommand, GeneratorEvent, GeneratorRunner, ResponseGenerator};
use crate::platform::{RecognitionConfig, RecognitionProvider, SynthesisProvider};
use crate::player::{PlaybackConfig, PlayerEvent, UtterancePlayer};
use crate::policy::{KeywordPhasePolicy, PhasePolicy};
use crate::reveal::{RevealAnimator, RevealConfig};
use crate::state::{NoticeSeverity, SessionCommand, SessionEvent, SharedSession};
use crate::transcript::{TranscriptAccumulator, TranscriptEvent};

/// Configuration for the orchestrator
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Recognition session configuration (locale pass-through)
    pub recognition: RecognitionConfig,
    /// Playback parameters and voice selection policy inputs
    pub playback: PlaybackConfig,
    /// Reveal cadence
    pub reveal: RevealConfig,
    /// Dwell time in each optional presentational phase, in milliseconds
    pub phase_interval_ms: u64,
    /// Command channel buffer size
    pub channel_capacity: usize,
    /// Shutdown timeout in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            playback: PlaybackConfig::default(),
            reveal: RevealConfig::default(),
            phase_interval_ms: 900,
            channel_capacity: 64,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recognition configuration
    pub fn with_recognition(mut self, recognition: RecognitionConfig) -> Self {
        self.recognition = recognition;
        self
    }

    /// Set the playback configuration
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// Set the reveal configuration
    pub fn with_reveal(mut self, reveal: RevealConfig) -> Self {
        self.reveal = reveal;
        self
    }

    /// Set the per-phase dwell time
    pub fn with_phase_interval_ms(mut self, interval: u64) -> Self {
        self.phase_interval_ms = interval;
        self
    }

    /// Set the command channel buffer size
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout_ms(mut self, timeout: u64) -> Self {
        self.shutdown_timeout_ms = timeout;
        self
    }
}

/// Handle for controlling the assistant from the UI or tests
///
/// Provides the public interface for sending commands, receiving events,
/// and querying session state.
pub struct AssistantHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<SessionEvent>,
    session: SharedSession,
}

impl AssistantHandle {
    /// Send a command to the orchestrator
    pub fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ParleyError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Submit a query
    pub fn submit(&self, query: &str) -> Result<()> {
        self.send_command(SessionCommand::Submit(query.to_string()))
    }

    /// Begin a listening session
    pub fn start_listening(&self) -> Result<()> {
        self.send_command(SessionCommand::StartListening)
    }

    /// End the current listening session
    pub fn stop_listening(&self) -> Result<()> {
        self.send_command(SessionCommand::StopListening)
    }

    /// Start or stop listening depending on the current session state
    pub fn toggle_listening(&self) -> Result<()> {
        self.send_command(SessionCommand::ToggleListening)
    }

    /// Copy a history record's query into the pending input field
    pub fn select_history(&self, index: usize) -> Result<()> {
        self.send_command(SessionCommand::SelectHistory(index))
    }

    /// Silence any active utterance
    pub fn cancel_playback(&self) -> Result<()> {
        self.send_command(SessionCommand::CancelPlayback)
    }

    /// Request shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.send_command(SessionCommand::Shutdown)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> Result<SessionEvent> {
        self.event_rx
            .recv()
            .map_err(|e| ParleyError::ChannelError(format!("Failed to receive event: {}", e)))
    }

    /// Get a clone of the event stream
    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Get the shared session state
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    // === Convenience state query methods ===

    /// Check if the assistant accepts new input
    pub fn is_idle(&self) -> bool {
        self.session.is_idle()
    }

    /// Number of completed interactions
    pub fn history_len(&self) -> usize {
        self.session.history_len()
    }

    /// Current response text
    pub fn current_response(&self) -> String {
        self.session.current_response()
    }

    /// Pending input field contents
    pub fn pending_input(&self) -> String {
        self.session.pending_input()
    }
}

/// Open a listening session, surfacing support gaps and start failures
fn begin_listening(accumulator: &mut TranscriptAccumulator, emit: &dyn Fn(SessionEvent)) {
    if !accumulator.has_support() {
        emit(SessionEvent::Notice {
            severity: NoticeSeverity::Info,
            message: "Speech recognition is not supported on this platform.".to_string(),
        });
        return;
    }
    match accumulator.start_listening() {
        Ok(true) => {
            emit(SessionEvent::ListeningChanged(true));
            emit(SessionEvent::Notice {
                severity: NoticeSeverity::Info,
                message: "Listening...".to_string(),
            });
        }
        Ok(false) => {}
        Err(e) => {
            warn!("Listening start failed: {}", e);
            emit(SessionEvent::ListeningChanged(false));
            emit(SessionEvent::Notice {
                severity: NoticeSeverity::Error,
                message: e.user_message(),
            });
        }
    }
}

/// Per-cycle bookkeeping for the settle condition
struct CycleState {
    request_id: Uuid,
    phases: VecDeque<crate::state::AssistantStatus>,
    next_phase_at: Instant,
    response_received: bool,
    reveal_done: bool,
    playback_done: bool,
}

impl CycleState {
    fn settled(&self) -> bool {
        self.response_received && self.reveal_done && self.playback_done
    }
}

/// Main orchestrator coordinating the interaction cycle
///
/// Owns the session state, the speech adapters and the reveal animator, and
/// routes events between them and the generator worker.
pub struct Orchestrator {
    config: OrchestratorConfig,
    session: SharedSession,
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    accumulator: TranscriptAccumulator,
    player: UtterancePlayer,
    generator: Option<Box<dyn ResponseGenerator>>,
    policy: Box<dyn PhasePolicy>,
}

impl Orchestrator {
    /// Create a new orchestrator over the injected collaborators
    ///
    /// Returns the orchestrator and a handle for controlling it. Call
    /// `start()` to begin processing.
    pub fn new(
        config: OrchestratorConfig,
        recognition: Box<dyn RecognitionProvider>,
        synthesis: Box<dyn SynthesisProvider>,
        generator: Box<dyn ResponseGenerator>,
    ) -> Result<(Self, AssistantHandle)> {
        let session = SharedSession::new();
        let (command_tx, command_rx) = bounded(config.channel_capacity);
        // Reveal progress streams one event per character; keep headroom
        let (event_tx, event_rx) = bounded(config.channel_capacity * 16);

        let accumulator =
            TranscriptAccumulator::new(recognition, config.recognition.clone());
        let player = UtterancePlayer::new(synthesis, config.playback.clone());

        let handle = AssistantHandle {
            command_tx,
            event_rx,
            session: session.clone(),
        };

        let orchestrator = Self {
            config,
            session,
            command_rx,
            event_tx,
            accumulator,
            player,
            generator: Some(generator),
            policy: Box::new(KeywordPhasePolicy::default()),
        };

        Ok((orchestrator, handle))
    }

    /// Replace the phase policy (defaults to the keyword policy)
    pub fn with_policy(mut self, policy: Box<dyn PhasePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Start the generator worker and the orchestrator loop
    ///
    /// Consumes the orchestrator and returns the loop's join handle.
    pub fn start(mut self) -> Result<JoinHandle<()>> {
        let generator = self
            .generator
            .take()
            .ok_or_else(|| ParleyError::StateError("Orchestrator already started".into()))?;
        let generator_handle = GeneratorRunner::new(generator).start_worker()?;
        info!("Generator worker started");

        let handle = self.run_loop(generator_handle.command_tx, generator_handle.event_rx);
        info!("Orchestrator loop started");
        Ok(handle)
    }

    /// Run the main select loop
    fn run_loop(
        self,
        generator_tx: Sender<GeneratorCommand>,
        generator_rx: Receiver<GeneratorEvent>,
    ) -> JoinHandle<()> {
        let config = self.config;
        let session = self.session;
        let command_rx = self.command_rx;
        let event_tx = self.event_tx;
        let mut accumulator = self.accumulator;
        let mut player = self.player;
        let policy = self.policy;

        let recognition_rx = accumulator.platform_events();
        let synthesis_rx = player.platform_events();
        let reveal_tick = tick(Duration::from_millis(config.reveal.tick_interval_ms.max(1)));
        let phase_interval = Duration::from_millis(config.phase_interval_ms);
        let shutdown_timeout = Duration::from_millis(config.shutdown_timeout_ms);

        thread::spawn(move || {
            info!("Orchestrator main loop starting");

            let mut reveal = RevealAnimator::new();
            let mut cycle: Option<CycleState> = None;

            // Events are best-effort notifications; a saturated consumer
            // must not stall the loop.
            let emit = |event: SessionEvent| {
                if event_tx.try_send(event).is_err() {
                    debug!("Event channel full, dropping event");
                }
            };

            let try_settle =
                |cycle: &mut Option<CycleState>, emit: &dyn Fn(SessionEvent)| {
                    if cycle.as_ref().is_some_and(|c| c.settled()) {
                        match session.write().settle() {
                            Ok(()) => emit(SessionEvent::StateChanged),
                            Err(e) => error!("Settle failed: {}", e),
                        }
                        *cycle = None;
                        debug!("Cycle settled, assistant idle");
                    }
                };

            loop {
                select! {
                    // External commands
                    recv(command_rx) -> command => {
                        let command = match command {
                            Ok(command) => command,
                            Err(_) => {
                                warn!("Command channel disconnected");
                                break;
                            }
                        };
                        match command {
                            SessionCommand::Submit(text) => {
                                let query = text.trim().to_string();
                                if query.is_empty() {
                                    debug!("Ignoring empty query");
                                    continue;
                                }
                                if !session.read().status.is_idle() {
                                    warn!("Submit rejected: cycle already in flight");
                                    emit(SessionEvent::Notice {
                                        severity: NoticeSeverity::Info,
                                        message: "Still working on the previous request."
                                            .to_string(),
                                    });
                                    continue;
                                }

                                {
                                    let mut s = session.write();
                                    if let Err(e) = s.begin_thinking(query.clone()) {
                                        error!("Failed to begin cycle: {}", e);
                                        continue;
                                    }
                                    s.set_pending_input("");
                                }
                                reveal.clear();
                                emit(SessionEvent::InputChanged(String::new()));
                                emit(SessionEvent::RevealReset);
                                emit(SessionEvent::StateChanged);

                                let request_id = Uuid::new_v4();
                                match generator_tx.send(GeneratorCommand::Generate {
                                    request_id,
                                    query: query.clone(),
                                }) {
                                    Ok(()) => {
                                        debug!("Query dispatched: '{}'", query);
                                        cycle = Some(CycleState {
                                            request_id,
                                            phases: policy.plan(&query).into(),
                                            next_phase_at: Instant::now() + phase_interval,
                                            response_received: false,
                                            reveal_done: false,
                                            playback_done: false,
                                        });
                                    }
                                    Err(e) => {
                                        error!("Failed to dispatch query: {}", e);
                                        session.write().fail_cycle();
                                        emit(SessionEvent::StateChanged);
                                        emit(SessionEvent::Notice {
                                            severity: NoticeSeverity::Error,
                                            message: ParleyError::ChannelError(e.to_string())
                                                .user_message(),
                                        });
                                    }
                                }
                            }

                            SessionCommand::StartListening => {
                                begin_listening(&mut accumulator, &emit);
                            }

                            SessionCommand::StopListening => {
                                accumulator.stop_listening();
                            }

                            SessionCommand::ToggleListening => {
                                if accumulator.is_listening() {
                                    accumulator.stop_listening();
                                } else {
                                    begin_listening(&mut accumulator, &emit);
                                }
                            }

                            SessionCommand::SelectHistory(index) => {
                                let query = session
                                    .read()
                                    .history
                                    .get(index)
                                    .map(|record| record.query.clone());
                                match query {
                                    Some(query) => {
                                        session.write().set_pending_input(query.clone());
                                        emit(SessionEvent::InputChanged(query));
                                    }
                                    None => warn!("History index {} out of range", index),
                                }
                            }

                            SessionCommand::CancelPlayback => {
                                player.cancel();
                                emit(SessionEvent::SpeakingChanged(false));
                                if let Some(c) = &mut cycle {
                                    if c.response_received {
                                        c.playback_done = true;
                                    }
                                }
                                try_settle(&mut cycle, &emit);
                            }

                            SessionCommand::Shutdown => {
                                info!("Shutdown requested");
                                accumulator.stop_listening();
                                player.cancel();

                                let _ = generator_tx.send(GeneratorCommand::Shutdown);
                                let deadline = Instant::now() + shutdown_timeout;
                                loop {
                                    match generator_rx.recv_timeout(Duration::from_millis(100)) {
                                        Ok(GeneratorEvent::Shutdown) => {
                                            debug!("Generator shutdown confirmed");
                                            break;
                                        }
                                        Ok(_) => {}
                                        Err(_) => {
                                            if Instant::now() > deadline {
                                                warn!("Shutdown timeout reached, forcing exit");
                                                break;
                                            }
                                        }
                                    }
                                }

                                emit(SessionEvent::Shutdown);
                                info!("Orchestrator shutdown complete");
                                return;
                            }
                        }
                    }

                    // Recognition events, in platform arrival order
                    recv(recognition_rx) -> event => {
                        let Ok(event) = event else {
                            warn!("Recognition event channel disconnected");
                            continue;
                        };
                        for transcript_event in accumulator.handle_event(event) {
                            match transcript_event {
                                TranscriptEvent::FinalSegment(text) => {
                                    let pending = {
                                        let mut s = session.write();
                                        s.append_voice_segment(&text);
                                        s.pending_input.clone()
                                    };
                                    emit(SessionEvent::InputChanged(pending));
                                }
                                TranscriptEvent::InterimChanged(text) => {
                                    emit(SessionEvent::InterimChanged(text));
                                }
                                TranscriptEvent::SessionEnded => {
                                    emit(SessionEvent::ListeningChanged(false));
                                }
                                TranscriptEvent::Error(message) => {
                                    emit(SessionEvent::Notice {
                                        severity: NoticeSeverity::Error,
                                        message: format!("Speech recognition error: {}", message),
                                    });
                                }
                            }
                        }
                    }

                    // Synthesis lifecycle events
                    recv(synthesis_rx) -> event => {
                        let Ok(event) = event else {
                            warn!("Synthesis event channel disconnected");
                            continue;
                        };
                        match player.handle_event(event) {
                            Some(PlayerEvent::Started) => {
                                emit(SessionEvent::SpeakingChanged(true));
                            }
                            Some(PlayerEvent::Ended) => {
                                emit(SessionEvent::SpeakingChanged(false));
                                if let Some(c) = &mut cycle {
                                    if c.response_received {
                                        c.playback_done = true;
                                    }
                                }
                                try_settle(&mut cycle, &emit);
                            }
                            Some(PlayerEvent::Error(message)) => {
                                emit(SessionEvent::SpeakingChanged(false));
                                emit(SessionEvent::Notice {
                                    severity: NoticeSeverity::Error,
                                    message: ParleyError::SynthesisError(message).user_message(),
                                });
                                if let Some(c) = &mut cycle {
                                    if c.response_received {
                                        c.playback_done = true;
                                    }
                                }
                                try_settle(&mut cycle, &emit);
                            }
                            Some(PlayerEvent::VoicesChanged) => {
                                debug!("Voice list updated");
                            }
                            None => {}
                        }
                    }

                    // Generator results
                    recv(generator_rx) -> event => {
                        let Ok(event) = event else {
                            warn!("Generator event channel disconnected");
                            continue;
                        };
                        match event {
                            GeneratorEvent::Started { request_id } => {
                                debug!("Generation started for request {}", request_id);
                            }
                            GeneratorEvent::Complete { request_id, response } => {
                                let matches = cycle
                                    .as_ref()
                                    .is_some_and(|c| {
                                        c.request_id == request_id && !c.response_received
                                    });
                                if !matches {
                                    debug!("Dropping stale generation result {}", request_id);
                                    continue;
                                }

                                if let Err(e) = session.write().complete_response(response.as_str()) {
                                    error!("Failed to record response: {}", e);
                                    session.write().fail_cycle();
                                    cycle = None;
                                    emit(SessionEvent::StateChanged);
                                    continue;
                                }

                                // Response replacement is fully applied here,
                                // before the next reveal tick can fire.
                                reveal.set_source(response.as_str());
                                emit(SessionEvent::RevealReset);
                                emit(SessionEvent::StateChanged);

                                let utterance = if response.is_empty() {
                                    None
                                } else {
                                    player.speak(&response)
                                };
                                if let Some(c) = &mut cycle {
                                    c.response_received = true;
                                    c.reveal_done = response.is_empty();
                                    c.playback_done = utterance.is_none();
                                }
                                try_settle(&mut cycle, &emit);
                            }
                            GeneratorEvent::Error { request_id, message } => {
                                let matches = cycle
                                    .as_ref()
                                    .is_some_and(|c| {
                                        c.request_id == request_id && !c.response_received
                                    });
                                if !matches {
                                    debug!("Dropping stale generation error {}", request_id);
                                    continue;
                                }

                                error!("Generation failed: {}", message);
                                session.write().fail_cycle();
                                cycle = None;
                                emit(SessionEvent::StateChanged);
                                emit(SessionEvent::Notice {
                                    severity: NoticeSeverity::Error,
                                    message: ParleyError::GenerationError(message).user_message(),
                                });
                            }
                            GeneratorEvent::Shutdown => {
                                debug!("Generator shutdown event received");
                            }
                        }
                    }

                    // Reveal cadence and phase dwell
                    recv(reveal_tick) -> _tick => {
                        if let Some(chunk) = reveal.tick() {
                            let chunk = chunk.to_string();
                            emit(SessionEvent::RevealChar(chunk));
                            if reveal.is_complete() {
                                emit(SessionEvent::RevealCompleted);
                                if let Some(c) = &mut cycle {
                                    if c.response_received {
                                        c.reveal_done = true;
                                    }
                                }
                                try_settle(&mut cycle, &emit);
                            }
                        }

                        if let Some(c) = &mut cycle {
                            if !c.response_received && Instant::now() >= c.next_phase_at {
                                if let Some(phase) = c.phases.pop_front() {
                                    match session.write().enter_phase(phase) {
                                        Ok(()) => emit(SessionEvent::StateChanged),
                                        Err(e) => warn!("Phase advance skipped: {}", e),
                                    }
                                    c.next_phase_at = Instant::now() + phase_interval;
                                }
                            }
                        }
                    }
                }
            }

            info!("Orchestrator main loop exiting");
        })
    }
}
