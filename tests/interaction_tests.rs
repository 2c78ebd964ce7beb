//! Integration tests for the Parley assistant core
//!
//! These drive a running orchestrator through its handle with scripted
//! platform providers, verifying the end-to-end interaction cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parley::orchestrator::AssistantHandle;
use parley::platform::{
    ScriptedRecognition, ScriptedRecognitionHandle, ScriptedSynthesis, ScriptedSynthesisHandle,
};
use parley::reveal::RevealConfig;
use parley::state::{AssistantStatus, NoticeSeverity, SessionEvent};
use parley::{
    Orchestrator, OrchestratorConfig, ParleyError, ResponseGenerator, Result,
};

const WEATHER_RESPONSE: &str =
    "Based on current data, the weather appears to be clear with temperatures around 72°F.";

struct StaticGenerator(&'static str);

#[async_trait]
impl ResponseGenerator for StaticGenerator {
    async fn generate(&mut self, _query: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(&mut self, _query: &str) -> Result<String> {
        Err(ParleyError::GenerationError("model unavailable".into()))
    }
}

struct SlowGenerator {
    delay_ms: u64,
    response: &'static str,
}

#[async_trait]
impl ResponseGenerator for SlowGenerator {
    async fn generate(&mut self, _query: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(self.response.to_string())
    }
}

fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_reveal(RevealConfig::default().with_tick_interval_ms(1))
        .with_phase_interval_ms(10)
        .with_shutdown_timeout_ms(2000)
}

struct Harness {
    handle: AssistantHandle,
    recognition: ScriptedRecognitionHandle,
    synthesis: ScriptedSynthesisHandle,
    loop_handle: std::thread::JoinHandle<()>,
}

fn start_assistant(generator: Box<dyn ResponseGenerator>) -> Harness {
    let recognition = ScriptedRecognition::new();
    let synthesis = ScriptedSynthesis::new();
    start_with(recognition, synthesis, generator)
}

fn start_with(
    recognition: ScriptedRecognition,
    synthesis: ScriptedSynthesis,
    generator: Box<dyn ResponseGenerator>,
) -> Harness {
    let recognition_controller = recognition.controller();
    let synthesis_controller = synthesis.controller();
    let (orchestrator, handle) = Orchestrator::new(
        fast_config(),
        Box::new(recognition),
        Box::new(synthesis),
        generator,
    )
    .expect("orchestrator creation failed");
    let loop_handle = orchestrator.start().expect("orchestrator failed to start");

    Harness {
        handle,
        recognition: recognition_controller,
        synthesis: synthesis_controller,
        loop_handle,
    }
}

impl Harness {
    fn finish(self) {
        let _ = self.handle.shutdown();
        let _ = self.loop_handle.join();
    }
}

fn wait_for(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_weather_query_full_cycle() {
    let harness = start_assistant(Box::new(StaticGenerator(WEATHER_RESPONSE)));
    let handle = &harness.handle;

    handle.submit("what's the weather").unwrap();

    assert!(
        wait_for(5000, || handle.is_idle() && handle.history_len() == 1),
        "cycle did not settle; status {}",
        handle.session().status()
    );

    let snapshot = handle.session().snapshot();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].query, "what's the weather");
    assert_eq!(snapshot.history[0].response, WEATHER_RESPONSE);
    assert_eq!(snapshot.current_response, WEATHER_RESPONSE);

    // The response was spoken through the synthesis platform
    let spoken = harness.synthesis.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, WEATHER_RESPONSE);

    harness.finish();
}

#[test]
fn test_reveal_events_reconstruct_response() {
    let harness = start_assistant(Box::new(StaticGenerator("Hello, world.")));
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.submit("greet me").unwrap();
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));

    let mut revealed = String::new();
    let mut resets = 0;
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::RevealReset => {
                resets += 1;
                revealed.clear();
            }
            SessionEvent::RevealChar(chunk) => revealed.push_str(&chunk),
            SessionEvent::RevealCompleted => completed = true,
            _ => {}
        }
    }

    assert!(completed, "reveal never completed");
    assert!(resets >= 1);
    assert_eq!(revealed, "Hello, world.");

    harness.finish();
}

#[test]
fn test_generator_failure_resets_to_idle() {
    let harness = start_assistant(Box::new(FailingGenerator));
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.submit("anything at all").unwrap();

    assert!(wait_for(2000, || {
        handle.is_idle() && handle.session().snapshot().current_query == "anything at all"
    }));
    // Give the failure notice time to be emitted before draining
    assert!(wait_for(2000, || {
        let mut found = false;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                SessionEvent::Notice {
                    severity: NoticeSeverity::Error,
                    ..
                }
            ) {
                found = true;
            }
        }
        found
    }));

    let snapshot = handle.session().snapshot();
    assert!(snapshot.status.is_idle());
    assert!(snapshot.current_response.is_empty());
    assert_eq!(snapshot.history.len(), 0);

    // No playback was attempted for the failed cycle
    assert!(harness.synthesis.spoken().is_empty());

    harness.finish();
}

#[test]
fn test_failure_notice_emitted_exactly_once() {
    let harness = start_assistant(Box::new(FailingGenerator));
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.submit("boom").unwrap();
    assert!(wait_for(2000, || handle.is_idle()));
    std::thread::sleep(Duration::from_millis(100));

    let mut error_notices = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            SessionEvent::Notice {
                severity: NoticeSeverity::Error,
                ..
            }
        ) {
            error_notices += 1;
        }
    }
    assert_eq!(error_notices, 1);

    harness.finish();
}

#[test]
fn test_status_progression_is_forward_only() {
    let harness = start_assistant(Box::new(SlowGenerator {
        delay_ms: 120,
        response: "done",
    }));
    let handle = &harness.handle;

    // Sample the status while the cycle runs
    let session = handle.session().clone();
    let stop = Arc::new(AtomicBool::new(false));
    let sampler_stop = stop.clone();
    let sampler = std::thread::spawn(move || {
        let mut observed = Vec::new();
        while !sampler_stop.load(Ordering::SeqCst) {
            let status = session.status();
            if observed.last() != Some(&status) {
                observed.push(status);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        observed
    });

    // "find and open" plans both optional phases under the keyword policy
    handle.submit("find and open the settings").unwrap();
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));
    std::thread::sleep(Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    let observed = sampler.join().unwrap();

    let canonical = [
        AssistantStatus::Idle,
        AssistantStatus::Thinking,
        AssistantStatus::Searching,
        AssistantStatus::Doing,
        AssistantStatus::Generating,
        AssistantStatus::Idle,
    ];
    assert!(
        is_ordered_subsequence(&observed, &canonical),
        "observed sequence out of order: {:?}",
        observed
    );
    // The cycle at least passed through thinking and back to idle
    assert!(observed.contains(&AssistantStatus::Thinking));
    assert_eq!(observed.last(), Some(&AssistantStatus::Idle));

    harness.finish();
}

fn is_ordered_subsequence(observed: &[AssistantStatus], canonical: &[AssistantStatus]) -> bool {
    let mut pos = 0;
    'outer: for status in observed {
        while pos < canonical.len() {
            if canonical[pos] == *status {
                continue 'outer;
            }
            pos += 1;
        }
        return false;
    }
    true
}

#[test]
fn test_second_submit_is_rejected_while_busy() {
    let harness = start_assistant(Box::new(SlowGenerator {
        delay_ms: 200,
        response: "first answer",
    }));
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.submit("first").unwrap();
    assert!(wait_for(1000, || !handle.is_idle()));

    handle.submit("second").unwrap();

    assert!(wait_for(2000, || {
        let mut rejected = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Notice {
                severity: NoticeSeverity::Info,
                message,
            } = event
            {
                if message.contains("Still working") {
                    rejected = true;
                }
            }
        }
        rejected
    }));

    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));
    let snapshot = handle.session().snapshot();
    assert_eq!(snapshot.history.len(), 1);
    assert_eq!(snapshot.history[0].query, "first");

    harness.finish();
}

#[test]
fn test_empty_submit_is_ignored() {
    let harness = start_assistant(Box::new(StaticGenerator("unused")));
    let handle = &harness.handle;

    handle.submit("   ").unwrap();
    std::thread::sleep(Duration::from_millis(100));

    assert!(handle.is_idle());
    assert_eq!(handle.history_len(), 0);
    assert!(harness.synthesis.spoken().is_empty());

    harness.finish();
}

#[test]
fn test_voice_segments_accumulate_into_pending_input() {
    let harness = start_assistant(Box::new(StaticGenerator("lights are on")));
    let handle = &harness.handle;

    handle.start_listening().unwrap();
    assert!(wait_for(1000, || harness.recognition.is_active()));

    harness.recognition.interim("turn");
    harness.recognition.finalized("turn on");
    harness.recognition.finalized("the lights");

    assert!(wait_for(2000, || handle.pending_input() == "turn on the lights"));

    handle.stop_listening().unwrap();
    assert!(wait_for(1000, || !harness.recognition.is_active()));

    // The UI submits whatever accumulated in the input field
    let query = handle.pending_input();
    handle.submit(&query).unwrap();
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));

    let snapshot = handle.session().snapshot();
    assert_eq!(snapshot.history[0].query, "turn on the lights");
    // Submitting cleared the input field
    assert!(snapshot.pending_input.is_empty());

    harness.finish();
}

#[test]
fn test_toggle_listening_flips_session_state() {
    let harness = start_assistant(Box::new(StaticGenerator("unused")));
    let handle = &harness.handle;

    handle.toggle_listening().unwrap();
    assert!(wait_for(1000, || harness.recognition.is_active()));

    harness.recognition.finalized("hello there");
    assert!(wait_for(2000, || handle.pending_input() == "hello there"));

    handle.toggle_listening().unwrap();
    assert!(wait_for(1000, || !harness.recognition.is_active()));

    harness.finish();
}

#[test]
fn test_listening_start_failure_surfaces_notice() {
    let harness = start_with(
        ScriptedRecognition::with_start_failure(),
        ScriptedSynthesis::new(),
        Box::new(StaticGenerator("unused")),
    );
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.start_listening().unwrap();

    assert!(wait_for(2000, || {
        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Notice {
                severity: NoticeSeverity::Error,
                message,
            } = event
            {
                if message.contains("microphone") {
                    failed = true;
                }
            }
        }
        failed
    }));
    assert!(!harness.recognition.is_active());

    harness.finish();
}

#[test]
fn test_unsupported_recognition_notice() {
    let harness = start_with(
        ScriptedRecognition::unsupported(),
        ScriptedSynthesis::new(),
        Box::new(StaticGenerator("unused")),
    );
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.start_listening().unwrap();

    assert!(wait_for(2000, || {
        let mut seen = false;
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Notice { message, .. } = event {
                if message.contains("not supported") {
                    seen = true;
                }
            }
        }
        seen
    }));

    harness.finish();
}

#[test]
fn test_cycle_settles_without_synthesis_support() {
    let harness = start_with(
        ScriptedRecognition::new(),
        ScriptedSynthesis::unsupported(),
        Box::new(StaticGenerator("silent answer")),
    );
    let handle = &harness.handle;

    handle.submit("say something").unwrap();
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));

    assert!(harness.synthesis.spoken().is_empty());
    assert_eq!(handle.current_response(), "silent answer");

    harness.finish();
}

#[test]
fn test_select_history_fills_pending_input() {
    let harness = start_assistant(Box::new(StaticGenerator("an answer")));
    let handle = &harness.handle;

    handle.submit("remember me").unwrap();
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));

    handle.select_history(0).unwrap();
    assert!(wait_for(1000, || handle.pending_input() == "remember me"));

    // Selecting does not resubmit or mutate history
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.history_len(), 1);
    assert!(handle.is_idle());

    // Out-of-range selection leaves the field untouched
    handle.select_history(7).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(handle.pending_input(), "remember me");

    harness.finish();
}

#[test]
fn test_playback_error_does_not_block_settling() {
    let harness = start_with(
        ScriptedRecognition::new(),
        ScriptedSynthesis::manual(),
        Box::new(StaticGenerator("short")),
    );
    let handle = &harness.handle;

    handle.submit("speak up").unwrap();
    assert!(wait_for(2000, || harness.synthesis.spoken().len() == 1));
    let utterance = harness.synthesis.last_spoken().unwrap().id;

    harness.synthesis.begin(utterance);
    harness.synthesis.fail(utterance, "audio device lost");

    // The error terminates playback but the cycle still settles once the
    // reveal finishes, and history keeps the record
    assert!(wait_for(5000, || handle.is_idle() && handle.history_len() == 1));
    assert_eq!(handle.current_response(), "short");

    harness.finish();
}

#[test]
fn test_shutdown_tears_everything_down() {
    let harness = start_with(
        ScriptedRecognition::new(),
        ScriptedSynthesis::manual(),
        Box::new(StaticGenerator(
            "a long response that will still be revealing when shutdown arrives",
        )),
    );
    let handle = &harness.handle;
    let events = handle.event_receiver();

    handle.start_listening().unwrap();
    assert!(wait_for(1000, || harness.recognition.is_active()));

    handle.submit("talk to me").unwrap();
    // Manual synthesis never finishes, so the cycle is still mid-flight
    assert!(wait_for(2000, || harness.synthesis.spoken().len() == 1));

    handle.shutdown().unwrap();

    assert!(wait_for(3000, || {
        let mut done = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::Shutdown) {
                done = true;
            }
        }
        done
    }));

    // Recognition session stopped and the active utterance cancelled
    assert!(!harness.recognition.is_active());
    assert_eq!(harness.synthesis.cancel_count(), 1);

    harness.loop_handle.join().unwrap();
}
