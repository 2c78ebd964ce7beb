//! Scenario runner
//!
//! Executes a scenario's timed steps against a running orchestrator through
//! its `AssistantHandle`, evaluating assertions against session snapshots.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{ScenarioConfig, StepAction, StepAssertion};
use crate::error::Result;
use crate::orchestrator::AssistantHandle;

/// Result of an assertion check
#[derive(Debug, Clone)]
pub enum AssertionResult {
    /// Assertion passed
    Passed,
    /// Assertion failed with reason
    Failed(String),
}

/// Outcome of a scenario run
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// True when every assertion passed
    pub passed: bool,
    /// One entry per failed assertion: (step time, reason)
    pub failures: Vec<(u64, String)>,
}

/// Runs scenario steps at their configured times
pub struct ScenarioRunner {
    config: ScenarioConfig,
}

impl ScenarioRunner {
    /// Create a runner for a scenario
    pub fn new(config: ScenarioConfig) -> Self {
        info!("[SCENARIO] Loaded scenario: {}", config.scenario.name);
        if !config.scenario.description.is_empty() {
            info!("[SCENARIO] Description: {}", config.scenario.description);
        }
        info!("[SCENARIO] Total steps: {}", config.steps.len());
        Self { config }
    }

    /// Execute all steps against the assistant, sleeping between step times
    ///
    /// Assertions are evaluated right after their step's action is sent,
    /// against a fresh session snapshot, so scenario authors control timing
    /// through `at_ms`.
    pub fn run(&self, handle: &AssistantHandle) -> Result<ScenarioReport> {
        let start = Instant::now();
        let mut failures = Vec::new();

        for step in &self.config.steps {
            let target = Duration::from_millis(step.at_ms);
            let elapsed = start.elapsed();
            if target > elapsed {
                std::thread::sleep(target - elapsed);
            }

            debug!("[SCENARIO] Executing step at {}ms: {:?}", step.at_ms, step.action);
            self.perform(handle, &step.action)?;

            if let Some(assertion) = &step.assert {
                let snapshot = handle.session().snapshot();
                match assertion.check(&snapshot) {
                    AssertionResult::Passed => {
                        debug!("[SCENARIO] Assertion passed at {}ms", step.at_ms);
                    }
                    AssertionResult::Failed(reason) => {
                        warn!("[SCENARIO] Assertion FAILED at {}ms: {}", step.at_ms, reason);
                        failures.push((step.at_ms, reason));
                    }
                }
            }
        }

        let passed = failures.is_empty();
        if passed {
            info!("[SCENARIO] {} passed", self.config.scenario.name);
        } else {
            warn!(
                "[SCENARIO] {} failed with {} assertion failure(s)",
                self.config.scenario.name,
                failures.len()
            );
        }

        Ok(ScenarioReport {
            name: self.config.scenario.name.clone(),
            passed,
            failures,
        })
    }

    fn perform(&self, handle: &AssistantHandle, action: &StepAction) -> Result<()> {
        match action {
            StepAction::Submit { text } => handle.submit(text),
            StepAction::StartListening => handle.start_listening(),
            StepAction::StopListening => handle.stop_listening(),
            StepAction::ToggleListening => handle.toggle_listening(),
            StepAction::SelectHistory { index } => handle.select_history(*index),
            StepAction::CancelPlayback => handle.cancel_playback(),
            StepAction::Check => Ok(()),
        }
    }
}
