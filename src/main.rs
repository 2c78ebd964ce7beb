//! Parley - voice-enabled assistant interaction core
//!
//! Console demo: wires the orchestrator to scripted platform providers and
//! the canned generator, streams the revealed response to stdout, and takes
//! typed queries from stdin.

use std::io::{BufRead, Write};

use parley::platform::{ScriptedRecognition, ScriptedSynthesis};
use parley::state::{NoticeSeverity, SessionEvent};
use parley::{CannedGenerator, Orchestrator, OrchestratorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Parley assistant demo");

    // No microphone in a console demo; synthesis auto-completes so cycles settle
    let recognition = Box::new(ScriptedRecognition::unsupported());
    let synthesis = Box::new(ScriptedSynthesis::new());
    let generator = Box::new(CannedGenerator::new());

    let (orchestrator, handle) =
        Orchestrator::new(OrchestratorConfig::default(), recognition, synthesis, generator)?;
    let loop_handle = orchestrator.start()?;

    // Event printer: streams revealed characters and notices
    let events = handle.event_receiver();
    let printer = std::thread::spawn(move || {
        let mut stdout = std::io::stdout();
        while let Ok(event) = events.recv() {
            match event {
                SessionEvent::RevealChar(chunk) => {
                    let _ = write!(stdout, "{}", chunk);
                    let _ = stdout.flush();
                }
                SessionEvent::RevealCompleted => {
                    let _ = writeln!(stdout);
                }
                SessionEvent::Notice { severity, message } => {
                    let tag = match severity {
                        NoticeSeverity::Info => "note",
                        NoticeSeverity::Error => "error",
                    };
                    let _ = writeln!(stdout, "[{}] {}", tag, message);
                }
                SessionEvent::Shutdown => break,
                _ => {}
            }
        }
    });

    println!("Type a query, :history for past interactions, :quit to exit.");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":history" => {
                let history = handle.session().snapshot().history;
                println!("{}", serde_json::to_string_pretty(&history)?);
            }
            ":listen" => {
                handle.toggle_listening()?;
            }
            query => {
                handle.submit(query)?;
            }
        }
    }

    handle.shutdown()?;
    let _ = loop_handle.join();
    let _ = printer.join();

    tracing::info!("Parley demo exiting");
    Ok(())
}
