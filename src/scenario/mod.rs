//! Scenario configuration module for automated interaction testing
//!
//! Loads TOML files describing timed assistant commands with optional
//! assertions against the shared session, so interaction flows can be
//! replayed and validated without a UI.

mod runner;

pub use runner::{AssertionResult, ScenarioReport, ScenarioRunner};

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ParleyError, Result};
use crate::state::{AssistantStatus, SessionSnapshot};

/// A scenario loaded from a TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario metadata
    pub scenario: ScenarioMetadata,
    /// List of timed steps to execute
    pub steps: Vec<ScenarioStep>,
}

/// Metadata about the scenario
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioMetadata {
    /// Name of the scenario
    pub name: String,
    /// Description of what the scenario validates
    #[serde(default)]
    pub description: String,
}

/// A single timed step
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Time in milliseconds after scenario start to execute this step
    pub at_ms: u64,
    /// The action to perform
    pub action: StepAction,
    /// Optional assertion validated after the action
    #[serde(default)]
    pub assert: Option<StepAssertion>,
}

/// Actions a scenario can perform
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Submit a query
    Submit {
        /// Query text
        text: String,
    },
    /// Begin a listening session
    StartListening,
    /// End the current listening session
    StopListening,
    /// Start or stop listening depending on the current session state
    ToggleListening,
    /// Copy a history record's query into the pending input field
    SelectHistory {
        /// History index (0-based)
        index: usize,
    },
    /// Silence any active utterance
    CancelPlayback,
    /// Do nothing; useful to anchor a timed assertion
    Check,
}

/// Assertions against the session snapshot
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAssertion {
    /// Assert the assistant status
    StatusIs {
        /// Expected status: "idle", "thinking", "searching", "doing", "generating"
        status: String,
    },
    /// Assert the assistant is idle
    IsIdle,
    /// Assert the history length
    HistoryLen {
        /// Expected number of records
        len: usize,
    },
    /// Assert the most recent record's query
    LastQueryIs {
        /// Expected query text
        text: String,
    },
    /// Assert the current response contains a substring
    ResponseContains {
        /// Substring to search for
        text: String,
    },
    /// Assert the pending input field contents
    PendingInputIs {
        /// Expected field value
        text: String,
    },
}

impl StepAssertion {
    /// Evaluate the assertion against a session snapshot
    pub fn check(&self, snapshot: &SessionSnapshot) -> AssertionResult {
        match self {
            StepAssertion::StatusIs { status } => {
                let expected: AssistantStatus = match status.parse() {
                    Ok(status) => status,
                    Err(e) => return AssertionResult::Failed(e.to_string()),
                };
                if snapshot.status == expected {
                    AssertionResult::Passed
                } else {
                    AssertionResult::Failed(format!(
                        "expected status {}, found {}",
                        expected, snapshot.status
                    ))
                }
            }
            StepAssertion::IsIdle => {
                if snapshot.status.is_idle() {
                    AssertionResult::Passed
                } else {
                    AssertionResult::Failed(format!(
                        "expected idle, found {}",
                        snapshot.status
                    ))
                }
            }
            StepAssertion::HistoryLen { len } => {
                if snapshot.history.len() == *len {
                    AssertionResult::Passed
                } else {
                    AssertionResult::Failed(format!(
                        "expected {} history records, found {}",
                        len,
                        snapshot.history.len()
                    ))
                }
            }
            StepAssertion::LastQueryIs { text } => match snapshot.history.last() {
                Some(record) if record.query == *text => AssertionResult::Passed,
                Some(record) => AssertionResult::Failed(format!(
                    "expected last query '{}', found '{}'",
                    text, record.query
                )),
                None => AssertionResult::Failed("history is empty".to_string()),
            },
            StepAssertion::ResponseContains { text } => {
                if snapshot.current_response.contains(text) {
                    AssertionResult::Passed
                } else {
                    AssertionResult::Failed(format!(
                        "response '{}' does not contain '{}'",
                        snapshot.current_response, text
                    ))
                }
            }
            StepAssertion::PendingInputIs { text } => {
                if snapshot.pending_input == *text {
                    AssertionResult::Passed
                } else {
                    AssertionResult::Failed(format!(
                        "expected pending input '{}', found '{}'",
                        text, snapshot.pending_input
                    ))
                }
            }
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ParleyError::IOError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a scenario from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: ScenarioConfig = toml::from_str(content)
            .map_err(|e| ParleyError::ConfigError(format!("Invalid scenario: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the scenario
    fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ParleyError::ConfigError(
                "Scenario must have at least one step".to_string(),
            ));
        }

        let mut last_time = 0;
        for step in &self.steps {
            if step.at_ms < last_time {
                return Err(ParleyError::ConfigError(format!(
                    "Steps must be ordered by time. Found step at {}ms after step at {}ms",
                    step.at_ms, last_time
                )));
            }
            last_time = step.at_ms;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AssistantSession;

    const SAMPLE: &str = r#"
[scenario]
name = "weather-roundtrip"
description = "Submit a weather query and expect a settled idle cycle"

[[steps]]
at_ms = 0
action = { type = "submit", text = "what's the weather" }

[[steps]]
at_ms = 500
action = { type = "check" }
assert = { type = "history_len", len = 1 }

[[steps]]
at_ms = 600
action = { type = "check" }
assert = { type = "is_idle" }
"#;

    #[test]
    fn test_parse_sample_scenario() {
        let config = ScenarioConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.scenario.name, "weather-roundtrip");
        assert_eq!(config.steps.len(), 3);
        assert!(matches!(
            config.steps[0].action,
            StepAction::Submit { ref text } if text == "what's the weather"
        ));
        assert!(config.steps[0].assert.is_none());
        assert!(config.steps[1].assert.is_some());
    }

    #[test]
    fn test_steps_must_be_ordered() {
        let out_of_order = r#"
[scenario]
name = "bad"

[[steps]]
at_ms = 100
action = { type = "check" }

[[steps]]
at_ms = 50
action = { type = "check" }
"#;
        assert!(ScenarioConfig::parse(out_of_order).is_err());
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let empty = r#"
[scenario]
name = "empty"
steps = []
"#;
        assert!(ScenarioConfig::parse(empty).is_err());
    }

    #[test]
    fn test_assertions_against_snapshot() {
        let mut session = AssistantSession::new();
        session.begin_thinking("what's the weather").unwrap();
        session.complete_response("Clear skies today.").unwrap();
        let snapshot = session.snapshot();

        assert!(matches!(
            StepAssertion::StatusIs { status: "generating".into() }.check(&snapshot),
            AssertionResult::Passed
        ));
        assert!(matches!(
            StepAssertion::HistoryLen { len: 1 }.check(&snapshot),
            AssertionResult::Passed
        ));
        assert!(matches!(
            StepAssertion::LastQueryIs { text: "what's the weather".into() }.check(&snapshot),
            AssertionResult::Passed
        ));
        assert!(matches!(
            StepAssertion::ResponseContains { text: "Clear".into() }.check(&snapshot),
            AssertionResult::Passed
        ));
        assert!(matches!(
            StepAssertion::IsIdle.check(&snapshot),
            AssertionResult::Failed(_)
        ));
    }

    #[test]
    fn test_unknown_status_string_fails() {
        let snapshot = AssistantSession::new().snapshot();
        assert!(matches!(
            StepAssertion::StatusIs { status: "pondering".into() }.check(&snapshot),
            AssertionResult::Failed(_)
        ));
    }
}
