//! Example: Run the dictation pipeline against a scripted engine.
//!
//! Run with: cargo run -p sotto-session --example scripted_dictation

use std::sync::Mutex;
use std::time::Duration;

use sotto_input::InjectionSurface;
use sotto_session::{DictationSession, SessionConfig, SessionEvent, SessionState};
use sotto_stt::{Hypothesis, TranscriptionPort};

/// Engine stand-in that replays a fixed refinement script, then keeps
/// repeating its last line.
struct ScriptedPort {
    script: Mutex<std::vec::IntoIter<&'static str>>,
    last: Mutex<&'static str>,
}

impl ScriptedPort {
    fn new(script: Vec<&'static str>) -> Self {
        Self {
            script: Mutex::new(script.into_iter()),
            last: Mutex::new(""),
        }
    }
}

impl TranscriptionPort for ScriptedPort {
    fn transcribe(&self, _window: &[f32]) -> sotto_stt::Result<Hypothesis> {
        let next = self.script.lock().unwrap().next();
        let mut last = self.last.lock().unwrap();
        if let Some(text) = next {
            *last = text;
        }
        Ok(Hypothesis::new(*last))
    }
}

/// Surface that renders edits to stdout instead of typing them.
struct StdoutSurface {
    text: String,
}

impl InjectionSurface for StdoutSurface {
    fn delete(&mut self, count: usize) -> sotto_input::Result<()> {
        for _ in 0..count {
            self.text.pop();
        }
        println!("  [del x{count}]  -> {:?}", self.text);
        Ok(())
    }

    fn insert(&mut self, text: &str) -> sotto_input::Result<()> {
        self.text.push_str(text);
        println!("  [type {text:?}] -> {:?}", self.text);
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sotto_session=debug")
        .init();

    println!("=== Scripted Dictation ===");
    println!("A fake engine refines its hypothesis pass by pass.\n");

    let script = vec![
        "send the",
        "send the report",
        "send the report by",
        "send the report by Friday",
        "send the report by Friday",
    ];

    let config = SessionConfig {
        cadence_ms: 200,
        debounce_ms: 0,
        ..SessionConfig::default()
    };
    let mut session = DictationSession::spawn(
        config,
        Box::new(ScriptedPort::new(script)),
        Box::new(StdoutSurface {
            text: String::new(),
        }),
    )?;
    let events = session
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event receiver already taken"))?;

    session.start();

    // One second of "speech" in capture-sized chunks.
    for _ in 0..10 {
        session.push_audio(&vec![0.05; 1600]);
        std::thread::sleep(Duration::from_millis(100));
    }

    session.stop();

    // Drain events until the session settles back to idle.
    loop {
        let event = match events.recv_timeout(Duration::from_secs(2)) {
            Ok(event) => event,
            Err(_) => break,
        };
        match &event {
            SessionEvent::TextUpdated {
                committed_delta,
                full_text,
                terminal,
            } => {
                if let Some(delta) = committed_delta {
                    println!("committed: {delta:?}");
                }
                if *terminal {
                    println!("final text: {full_text:?}");
                }
            }
            SessionEvent::StateChanged(state) => println!("state: {state}"),
            SessionEvent::UtteranceFinalized { reason } => println!("finalized: {reason:?}"),
            SessionEvent::InjectionFailed { message } => println!("injection failed: {message}"),
        }
        if event == SessionEvent::StateChanged(SessionState::Idle) {
            break;
        }
    }

    println!("\nDone.");
    Ok(())
}
