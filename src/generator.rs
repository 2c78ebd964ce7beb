//! Response generation worker
//!
//! The response generator is an external collaborator: given a query it
//! asynchronously produces a response string, and it may fail. The runner
//! executes it on a dedicated worker thread with its own tokio runtime, so
//! the orchestrator's select loop never blocks on generation.

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{ParleyError, Result};

/// External response generation contract
#[async_trait]
pub trait ResponseGenerator: Send {
    /// Produce a response for the query
    async fn generate(&mut self, query: &str) -> Result<String>;
}

/// Commands sent to the generator worker
#[derive(Clone, Debug)]
pub enum GeneratorCommand {
    /// Generate a response for the query
    Generate { request_id: Uuid, query: String },
    /// Shutdown the worker
    Shutdown,
}

/// Events emitted by the generator worker
#[derive(Clone, Debug)]
pub enum GeneratorEvent {
    /// Generation started for a request
    Started { request_id: Uuid },
    /// Generation succeeded
    Complete { request_id: Uuid, response: String },
    /// Generation failed
    Error { request_id: Uuid, message: String },
    /// Worker shut down
    Shutdown,
}

/// Handle for interacting with a running generator worker
pub struct GeneratorHandle {
    /// Send commands to the worker
    pub command_tx: Sender<GeneratorCommand>,
    /// Receive events from the worker
    pub event_rx: Receiver<GeneratorEvent>,
    worker_handle: Option<JoinHandle<()>>,
}

impl GeneratorHandle {
    /// Dispatch a generation request
    pub fn generate(&self, request_id: Uuid, query: &str) -> Result<()> {
        self.command_tx
            .send(GeneratorCommand::Generate {
                request_id,
                query: query.to_string(),
            })
            .map_err(|e| ParleyError::ChannelError(format!("Failed to send generate: {}", e)))
    }

    /// Shutdown the worker and join its thread
    pub fn shutdown(mut self) -> Result<()> {
        let _ = self.command_tx.send(GeneratorCommand::Shutdown);
        if let Some(handle) = self.worker_handle.take() {
            handle
                .join()
                .map_err(|_| ParleyError::GenerationError("Worker thread panicked".into()))?;
        }
        Ok(())
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<GeneratorEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> Result<GeneratorEvent> {
        self.event_rx
            .recv()
            .map_err(|e| ParleyError::ChannelError(format!("Failed to receive event: {}", e)))
    }
}

/// Runner that spawns a worker thread for response generation
pub struct GeneratorRunner {
    generator: Box<dyn ResponseGenerator>,
}

impl GeneratorRunner {
    /// Create a runner around a generator implementation
    pub fn new(generator: Box<dyn ResponseGenerator>) -> Self {
        Self { generator }
    }

    /// Start the worker thread
    ///
    /// The worker owns a tokio runtime so generator implementations are free
    /// to await network or model calls.
    pub fn start_worker(self) -> Result<GeneratorHandle> {
        let (command_tx, command_rx) = bounded::<GeneratorCommand>(16);
        let (event_tx, event_rx) = bounded::<GeneratorEvent>(64);

        let generator = self.generator;

        let worker_handle = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime: {}", e);
                    let _ = event_tx.send(GeneratorEvent::Shutdown);
                    return;
                }
            };

            runtime.block_on(async move {
                worker_loop(generator, command_rx, event_tx).await;
            });
        });

        Ok(GeneratorHandle {
            command_tx,
            event_rx,
            worker_handle: Some(worker_handle),
        })
    }
}

/// Main worker loop handling generation requests
async fn worker_loop(
    mut generator: Box<dyn ResponseGenerator>,
    command_rx: Receiver<GeneratorCommand>,
    event_tx: Sender<GeneratorEvent>,
) {
    info!("Generator worker starting");

    loop {
        let command = match command_rx.recv() {
            Ok(cmd) => cmd,
            Err(_) => {
                info!("Command channel closed, shutting down");
                break;
            }
        };

        match command {
            GeneratorCommand::Generate { request_id, query } => {
                debug!("Generating response for request {}", request_id);
                if event_tx.send(GeneratorEvent::Started { request_id }).is_err() {
                    error!("Event channel closed");
                    break;
                }

                match generator.generate(&query).await {
                    Ok(response) => {
                        debug!(
                            "Generation complete for request {} ({} chars)",
                            request_id,
                            response.len()
                        );
                        if event_tx
                            .send(GeneratorEvent::Complete {
                                request_id,
                                response,
                            })
                            .is_err()
                        {
                            error!("Event channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Generation failed for request {}: {}", request_id, e);
                        if event_tx
                            .send(GeneratorEvent::Error {
                                request_id,
                                message: e.to_string(),
                            })
                            .is_err()
                        {
                            error!("Event channel closed");
                            break;
                        }
                    }
                }
            }

            GeneratorCommand::Shutdown => {
                info!("Generator worker received shutdown command");
                break;
            }
        }
    }

    let _ = event_tx.send(GeneratorEvent::Shutdown);
    info!("Generator worker stopped");
}

/// Canned keyword generator for demos and tests
///
/// Routes on query keywords and prefixes each response with a lead-in phrase
/// picked by rotation, so repeated runs are deterministic.
pub struct CannedGenerator {
    phrase_cursor: usize,
}

const LEAD_IN_PHRASES: &[&str] = &[
    "I'm here to assist you with that request.",
    "I'd be happy to help with that.",
    "Let me process that for you.",
    "I'm analyzing your request now.",
];

impl CannedGenerator {
    /// Create a canned generator
    pub fn new() -> Self {
        Self { phrase_cursor: 0 }
    }

    fn next_phrase(&mut self) -> &'static str {
        let phrase = LEAD_IN_PHRASES[self.phrase_cursor % LEAD_IN_PHRASES.len()];
        self.phrase_cursor += 1;
        phrase
    }
}

impl Default for CannedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseGenerator for CannedGenerator {
    async fn generate(&mut self, query: &str) -> Result<String> {
        let phrase = self.next_phrase();
        let lowered = query.to_lowercase();

        let response = if lowered.contains("weather") {
            format!(
                "{} Based on current data, the weather appears to be clear with \
                 temperatures around 72°F. Would you like me to provide more \
                 detailed forecast information?",
                phrase
            )
        } else if lowered.contains("time") {
            format!(
                "{} The current time is {}.",
                phrase,
                chrono::Utc::now().format("%H:%M:%S UTC")
            )
        } else if lowered.contains("search") || lowered.contains("find") {
            format!(
                "{} I've found several relevant results for your search. Would \
                 you like me to summarize the top findings?",
                phrase
            )
        } else if lowered.contains("code") || lowered.contains("program") {
            format!(
                "{} Here's a sample snippet that might help with your task:\n\n\
                 ```python\ndef process_data(input_data):\n    results = []\n    \
                 for item in input_data:\n        if item.is_valid():\n            \
                 results.append(item.transform())\n    return results\n```\n\n\
                 Would you like me to explain how this works?",
                phrase
            )
        } else {
            format!(
                "{} I'm currently in development mode with limited functionality, \
                 but I can assist with searches, code samples, and simple tasks. \
                 How else can I help you today?",
                phrase
            )
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoGenerator;

    #[async_trait]
    impl ResponseGenerator for EchoGenerator {
        async fn generate(&mut self, query: &str) -> Result<String> {
            Ok(format!("echo: {}", query))
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ResponseGenerator for FailingGenerator {
        async fn generate(&mut self, _query: &str) -> Result<String> {
            Err(ParleyError::GenerationError("model unavailable".into()))
        }
    }

    #[test]
    fn test_worker_round_trip() {
        let handle = GeneratorRunner::new(Box::new(EchoGenerator))
            .start_worker()
            .unwrap();

        let request_id = Uuid::new_v4();
        handle.generate(request_id, "hello").unwrap();

        match handle.recv_event().unwrap() {
            GeneratorEvent::Started { request_id: id } => assert_eq!(id, request_id),
            other => panic!("Expected Started, got {:?}", other),
        }
        match handle.recv_event().unwrap() {
            GeneratorEvent::Complete {
                request_id: id,
                response,
            } => {
                assert_eq!(id, request_id);
                assert_eq!(response, "echo: hello");
            }
            other => panic!("Expected Complete, got {:?}", other),
        }

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_worker_reports_failure() {
        let handle = GeneratorRunner::new(Box::new(FailingGenerator))
            .start_worker()
            .unwrap();

        let request_id = Uuid::new_v4();
        handle.generate(request_id, "anything").unwrap();

        // Started, then Error, never Complete
        assert!(matches!(
            handle.recv_event().unwrap(),
            GeneratorEvent::Started { .. }
        ));
        match handle.recv_event().unwrap() {
            GeneratorEvent::Error { request_id: id, message } => {
                assert_eq!(id, request_id);
                assert!(message.contains("model unavailable"));
            }
            other => panic!("Expected Error, got {:?}", other),
        }

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_worker_shutdown_emits_event() {
        let handle = GeneratorRunner::new(Box::new(EchoGenerator))
            .start_worker()
            .unwrap();
        let events = handle.event_rx.clone();
        handle.shutdown().unwrap();
        assert!(matches!(events.recv().unwrap(), GeneratorEvent::Shutdown));
    }

    #[tokio::test]
    async fn test_canned_generator_keyword_routing() {
        let mut generator = CannedGenerator::new();

        let weather = generator.generate("what's the weather").await.unwrap();
        assert!(weather.contains("the weather appears to be clear"));

        let code = generator.generate("show me some code").await.unwrap();
        assert!(code.contains("```python"));

        let fallback = generator.generate("hello").await.unwrap();
        assert!(fallback.contains("development mode"));
    }

    #[tokio::test]
    async fn test_canned_generator_rotates_phrases_deterministically() {
        let mut a = CannedGenerator::new();
        let mut b = CannedGenerator::new();

        for _ in 0..5 {
            let left = a.generate("hello").await.unwrap();
            let right = b.generate("hello").await.unwrap();
            assert_eq!(left, right);
        }

        // Successive calls rotate the lead-in
        let mut c = CannedGenerator::new();
        let first = c.generate("hello").await.unwrap();
        let second = c.generate("hello").await.unwrap();
        assert_ne!(first, second);
    }
}
