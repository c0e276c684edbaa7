//! Live dictation pipeline: capture audio, transcribe it on a fixed
//! cadence, commit tokens once they stop changing, and keep the focused
//! application's text in sync through minimal keystroke edits.

pub mod config;
mod pipeline;
pub mod scheduler;
mod session;
pub mod stability;

pub use config::SessionConfig;
pub use pipeline::{FinalizeReason, SessionEvent, SessionState};
pub use session::DictationSession;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Vad(#[from] sotto_vad::VadError),
    #[error("failed to spawn pipeline worker: {0}")]
    WorkerSpawn(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
