use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use sotto_audio::RingBuffer;
use sotto_input::{DiffInjector, InjectionSurface};
use sotto_stt::TranscriptionPort;
use sotto_vad::EnergyVad;

use crate::config::SessionConfig;
use crate::pipeline::{self, Command, Pipeline, SessionEvent, SessionState, SharedInput};
use crate::{Result, SessionError};

/// Handle to a running dictation pipeline.
///
/// Owns the worker thread that runs inference, tracking and injection.
/// The handle itself stays cheap: signals go over a channel, audio goes
/// into the shared ring under a short lock. Dropping the handle shuts the
/// worker down and joins it.
pub struct DictationSession {
    control: Sender<Command>,
    events: Option<Receiver<SessionEvent>>,
    shared: Arc<Mutex<SharedInput>>,
    state_cell: Arc<Mutex<SessionState>>,
    worker: Option<JoinHandle<()>>,
}

impl DictationSession {
    /// Validate the config and spawn the pipeline worker. The session
    /// starts in `Idle`; nothing happens until a start signal.
    pub fn spawn(
        config: SessionConfig,
        port: Box<dyn TranscriptionPort>,
        surface: Box<dyn InjectionSurface>,
    ) -> Result<Self> {
        config.validate()?;
        let vad = EnergyVad::new(config.vad.clone())?;
        let ring = RingBuffer::with_seconds(config.buffer_secs, config.sample_rate);

        let shared = Arc::new(Mutex::new(SharedInput { ring, vad }));
        let state_cell = Arc::new(Mutex::new(SessionState::Idle));
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let injector = DiffInjector::new(surface, config.injector.clone());
        let pipeline = Pipeline::new(
            config,
            shared.clone(),
            state_cell.clone(),
            port,
            injector,
            events_tx,
        );

        let worker = std::thread::Builder::new()
            .name("sotto-pipeline".to_string())
            .spawn(move || pipeline::run(pipeline, control_rx))
            .map_err(|e| SessionError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            control: control_tx,
            events: Some(events_rx),
            shared,
            state_cell,
            worker: Some(worker),
        })
    }

    /// Feed capture samples (mono f32 at the configured rate).
    ///
    /// Never blocks on inference or injection; the cost is one memory copy
    /// under a short lock, so it is safe to call from a capture callback's
    /// consumer at any session state.
    pub fn push_audio(&self, samples: &[f32]) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.ring.write(samples);
            shared.vad.push_samples(samples);
        }
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn toggle(&self) {
        self.send(Command::Toggle);
    }

    pub fn state(&self) -> SessionState {
        self.state_cell
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Idle)
    }

    /// Take the event receiver. Single consumer; returns None if already
    /// taken.
    pub fn take_events(&mut self) -> Option<Receiver<SessionEvent>> {
        self.events.take()
    }

    fn send(&self, command: Command) {
        if self.control.send(command).is_err() {
            tracing::warn!(?command, "pipeline worker gone, signal dropped");
        }
    }
}

impl Drop for DictationSession {
    fn drop(&mut self) {
        let _ = self.control.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("pipeline worker panicked");
            }
        }
    }
}
