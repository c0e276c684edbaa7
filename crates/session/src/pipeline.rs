//! Pipeline core: owns the engine port, stability tracker and injector,
//! and executes every state transition.
//!
//! All of it runs on one worker thread, which is what serializes inference
//! calls; there is no in-flight flag to get wrong. The capture side only
//! ever touches the shared ring buffer and VAD under a short lock.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use sotto_audio::RingBuffer;
use sotto_input::DiffInjector;
use sotto_stt::{HallucinationFilter, TranscriptionPort};
use sotto_vad::EnergyVad;

use crate::config::SessionConfig;
use crate::scheduler::{evaluate_gate, Cadence};
use crate::stability::{PassOutcome, StabilityTracker};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Finalizing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Finalizing => "finalizing",
        })
    }
}

/// Why an utterance was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// Sustained silence closed the utterance; the session keeps running.
    Hangover,
    /// An explicit stop signal ended the session.
    Stop,
}

/// Control signals consumed by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Start,
    Stop,
    Toggle,
    Shutdown,
}

/// Observable pipeline output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// A pass ran; `full_text` is what now belongs on screen.
    TextUpdated {
        committed_delta: Option<String>,
        full_text: String,
        terminal: bool,
    },
    UtteranceFinalized {
        reason: FinalizeReason,
    },
    /// The injection surface failed; the on-screen record was dropped and
    /// the next successful pass retypes in full.
    InjectionFailed {
        message: String,
    },
}

/// Audio-side state shared with the capture thread.
pub(crate) struct SharedInput {
    pub ring: RingBuffer,
    pub vad: EnergyVad,
}

pub(crate) struct Pipeline {
    config: SessionConfig,
    shared: Arc<Mutex<SharedInput>>,
    state_cell: Arc<Mutex<SessionState>>,
    port: Box<dyn TranscriptionPort>,
    injector: DiffInjector,
    tracker: StabilityTracker,
    filter: HallucinationFilter,
    cadence: Cadence,
    events: Sender<SessionEvent>,
    state: SessionState,
    /// Last accepted start/stop signal, for switch-bounce suppression.
    last_transition: Option<Instant>,
}

impl Pipeline {
    pub(crate) fn new(
        config: SessionConfig,
        shared: Arc<Mutex<SharedInput>>,
        state_cell: Arc<Mutex<SessionState>>,
        port: Box<dyn TranscriptionPort>,
        injector: DiffInjector,
        events: Sender<SessionEvent>,
    ) -> Self {
        let filter = if config.filter_phrases.is_empty() {
            HallucinationFilter::default()
        } else {
            HallucinationFilter::new(config.filter_phrases.clone())
        };
        let tracker = StabilityTracker::new(config.stability_threshold);
        let cadence = Cadence::new(Duration::from_millis(config.cadence_ms));
        Self {
            config,
            shared,
            state_cell,
            port,
            injector,
            tracker,
            filter,
            cadence,
            events,
            state: SessionState::Idle,
            last_transition: None,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn time_until_tick(&self, now: Instant) -> Duration {
        self.cadence.time_until_due(now)
    }

    pub(crate) fn poll_tick(&mut self, now: Instant) -> bool {
        self.cadence.poll(now)
    }

    /// Handle one control command. Returns false on shutdown.
    pub(crate) fn handle_command(&mut self, command: Command, now: Instant) -> bool {
        match command {
            Command::Shutdown => return false,
            Command::Start => self.handle_start(now),
            Command::Stop => self.handle_stop(now),
            Command::Toggle => match self.state {
                SessionState::Idle => self.handle_start(now),
                _ => self.handle_stop(now),
            },
        }
        true
    }

    /// One due schedule point while recording. Returns false on shutdown.
    pub(crate) fn tick(&mut self, now: Instant, control: &Receiver<Command>) -> bool {
        if self.state != SessionState::Recording {
            return true;
        }

        // A closed utterance boundary outranks a regular pass.
        if self.take_speech_end() {
            self.finalize(FinalizeReason::Hangover, now);
            return true;
        }

        let (window, speech_pending) = match self.shared.lock() {
            Ok(shared) => (
                shared.ring.snapshot_ms(self.config.window_ms()),
                shared.vad.has_pending_speech(),
            ),
            Err(_) => {
                tracing::warn!("shared input lock poisoned, tick skipped");
                return true;
            }
        };

        if let Some(reason) =
            evaluate_gate(speech_pending, window.len(), self.config.min_window_samples)
        {
            tracing::trace!(?reason, samples = window.len(), "pass gated off");
            return true;
        }

        let pass = self.cadence.next_pass_id();
        let context = self.context_prompt();
        let started = Instant::now();
        let result = self.port.transcribe_with_context(&window, context.as_deref());
        let elapsed = started.elapsed();

        // Signals that arrived while the engine was busy. A stop recorded
        // here turns this very pass into the terminal one; its result is
        // consumed, not thrown away.
        let (mut stop_requested, shutdown) = drain_control(control);
        if shutdown {
            return false;
        }
        if stop_requested && self.debounced(now) {
            stop_requested = false;
        }

        if elapsed > Duration::from_millis(self.config.cadence_ms) {
            tracing::debug!(
                pass,
                elapsed_ms = elapsed.as_millis() as u64,
                "inference ran past the cadence period"
            );
        }

        match result {
            Ok(hypothesis) => {
                let cleaned = self.filter.clean(&hypothesis.text);
                let outcome = self.tracker.observe(pass, &cleaned, stop_requested);
                self.apply_outcome(outcome, stop_requested);
            }
            Err(e) => {
                tracing::warn!(pass, error = %e, "inference failed, pass skipped");
                if stop_requested {
                    let outcome = self.tracker.finalize_pending();
                    self.apply_outcome(outcome, true);
                }
            }
        }

        if stop_requested {
            self.finish_utterance(FinalizeReason::Stop, now);
        }
        true
    }

    fn handle_start(&mut self, now: Instant) {
        if self.state != SessionState::Idle {
            tracing::debug!(state = %self.state, "start ignored, session active");
            return;
        }
        if self.debounced(now) {
            return;
        }
        self.last_transition = Some(now);

        if let Ok(mut shared) = self.shared.lock() {
            shared.ring.clear();
            shared.vad.reset();
        }
        self.tracker.reset();
        self.injector.reset();
        self.cadence.restart(now);
        self.set_state(SessionState::Recording);
    }

    fn handle_stop(&mut self, now: Instant) {
        if self.state != SessionState::Recording {
            tracing::debug!(state = %self.state, "stop ignored, not recording");
            return;
        }
        if self.debounced(now) {
            return;
        }
        self.finalize(FinalizeReason::Stop, now);
    }

    /// Terminal pass over the complete buffered window, then the boundary
    /// bookkeeping.
    fn finalize(&mut self, reason: FinalizeReason, now: Instant) {
        self.set_state(SessionState::Finalizing);

        let window = match self.shared.lock() {
            Ok(shared) => shared.ring.snapshot(),
            Err(_) => Vec::new(),
        };

        let outcome = if window.len() >= self.config.min_window_samples {
            let pass = self.cadence.next_pass_id();
            let context = self.context_prompt();
            match self.port.transcribe_with_context(&window, context.as_deref()) {
                Ok(hypothesis) => {
                    let cleaned = self.filter.clean(&hypothesis.text);
                    self.tracker.observe(pass, &cleaned, true)
                }
                Err(e) => {
                    tracing::warn!(pass, error = %e, "terminal inference failed, promoting tracked text");
                    self.tracker.finalize_pending()
                }
            }
        } else {
            self.tracker.finalize_pending()
        };
        self.apply_outcome(outcome, true);
        self.finish_utterance(reason, now);
    }

    /// Clear the consumed audio and settle into the post-boundary state.
    fn finish_utterance(&mut self, reason: FinalizeReason, now: Instant) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.ring.clear();
            shared.vad.mark_consumed();
        }
        self.tracker.begin_utterance();
        tracing::info!(?reason, "utterance finalized");
        let _ = self.events.send(SessionEvent::UtteranceFinalized { reason });

        match reason {
            FinalizeReason::Hangover => self.set_state(SessionState::Recording),
            FinalizeReason::Stop => {
                self.last_transition = Some(now);
                self.set_state(SessionState::Idle);
            }
        }
    }

    /// Route one pass outcome to the screen and the event stream.
    fn apply_outcome(&mut self, outcome: PassOutcome, terminal: bool) {
        if let Some(delta) = &outcome.committed_delta {
            tracing::info!(delta = %delta, "text committed");
        }
        match self.injector.update(&outcome.full_text, terminal) {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "injection failed, screen record dropped");
                let _ = self.events.send(SessionEvent::InjectionFailed {
                    message: e.to_string(),
                });
            }
        }
        let _ = self.events.send(SessionEvent::TextUpdated {
            committed_delta: outcome.committed_delta,
            full_text: outcome.full_text,
            terminal,
        });
    }

    fn take_speech_end(&mut self) -> bool {
        match self.shared.lock() {
            Ok(mut shared) => shared.vad.take_speech_end(),
            Err(_) => false,
        }
    }

    /// Last committed words offered to the engine as decoding context.
    fn context_prompt(&self) -> Option<String> {
        if self.config.context_words == 0 {
            return None;
        }
        let committed = self.tracker.committed_text();
        if committed.is_empty() {
            return None;
        }
        let words: Vec<&str> = committed.split_whitespace().collect();
        let start = words.len().saturating_sub(self.config.context_words);
        Some(words[start..].join(" "))
    }

    fn debounced(&self, now: Instant) -> bool {
        if let Some(last) = self.last_transition {
            let gap = now.saturating_duration_since(last);
            if gap < Duration::from_millis(self.config.debounce_ms) {
                tracing::debug!(gap_ms = gap.as_millis() as u64, "signal bounced");
                return true;
            }
        }
        false
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "session state");
        self.state = next;
        if let Ok(mut cell) = self.state_cell.lock() {
            *cell = next;
        }
        let _ = self.events.send(SessionEvent::StateChanged(next));
    }
}

fn drain_control(control: &Receiver<Command>) -> (bool, bool) {
    let mut stop = false;
    loop {
        match control.try_recv() {
            Ok(Command::Stop) | Ok(Command::Toggle) => stop = true,
            Ok(Command::Start) => tracing::debug!("start ignored, session active"),
            Ok(Command::Shutdown) => return (stop, true),
            Err(_) => return (stop, false),
        }
    }
}

/// Worker loop: commands preempt, ticks fire on the cadence grid.
pub(crate) fn run(mut pipeline: Pipeline, control: Receiver<Command>) {
    tracing::info!("pipeline worker started");
    loop {
        if pipeline.state() == SessionState::Recording {
            let timeout = pipeline.time_until_tick(Instant::now());
            match control.recv_timeout(timeout) {
                Ok(command) => {
                    if !pipeline.handle_command(command, Instant::now()) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    if pipeline.poll_tick(now) && !pipeline.tick(now, &control) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match control.recv() {
                Ok(command) => {
                    if !pipeline.handle_command(command, Instant::now()) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    }
    tracing::info!("pipeline worker stopped");
}
