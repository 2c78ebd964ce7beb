//! Error types for the Parley assistant core
//!
//! Platform capability gaps are not errors: recognition/synthesis support is
//! exposed as boolean flags on the providers and callers branch on those
//! before invoking the feature.

use thiserror::Error;

/// Parley assistant errors
#[derive(Error, Debug, Clone)]
pub enum ParleyError {
    /// Speech recognition session error (e.g. the platform refused to start)
    #[error("Recognition error: {0}")]
    RecognitionError(String),

    /// Speech synthesis playback error
    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    /// Response generation error
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// Channel communication error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Invalid assistant state transition
    #[error("State error: {0}")]
    StateError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File system I/O error
    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for ParleyError {
    fn from(e: std::io::Error) -> Self {
        ParleyError::IOError(e.to_string())
    }
}

impl ParleyError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors allow the session to continue; non-recoverable
    /// errors indicate an internal fault that may require a restart.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A rejected recognition start (permission denied) is not fatal
            ParleyError::RecognitionError(_) => true,
            // A failed utterance terminates only that utterance
            ParleyError::SynthesisError(_) => true,
            // Generation failures reset the cycle and leave history untouched
            ParleyError::GenerationError(_) => true,
            // Channel errors indicate internal issues
            ParleyError::ChannelError(_) => false,
            // Invalid transitions are programming errors
            ParleyError::StateError(_) => false,
            // Config errors require user intervention
            ParleyError::ConfigError(_) => false,
            // IO errors may require user intervention
            ParleyError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description of the error
    ///
    /// Returns a message suitable for display by the UI collaborator.
    pub fn user_message(&self) -> String {
        match self {
            ParleyError::RecognitionError(_) => {
                "Could not start listening. Please check microphone permissions.".to_string()
            }
            ParleyError::SynthesisError(_) => {
                "Speech playback failed. The response is still shown on screen.".to_string()
            }
            ParleyError::GenerationError(_) => {
                "There was an error processing your request.".to_string()
            }
            ParleyError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            ParleyError::StateError(_) => {
                "The assistant is busy. Please wait for the current request.".to_string()
            }
            ParleyError::ConfigError(_) => "Configuration error. Please check settings.".to_string(),
            ParleyError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;
