mod filter;
mod wav;

pub use filter::{strip_annotations, HallucinationFilter};
pub use wav::read_wav_mono_f32_16k;

use std::path::Path;

/// Standard sample rate for speech inference.
pub const STT_SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("invalid audio format: {0}")]
    InvalidAudioFormat(String),
}

pub type Result<T> = std::result::Result<T, SttError>;

/// One engine output for a single audio window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hypothesis {
    pub text: String,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech inference over one audio window (16kHz mono f32).
///
/// The same utterance is transcribed repeatedly on overlapping windows, so
/// implementations must be stateless across calls and must not retain the
/// input buffer. Calls are serialized by the caller; at most one runs at a
/// time.
pub trait TranscriptionPort: Send {
    fn transcribe(&self, window: &[f32]) -> Result<Hypothesis>;

    /// Transcribe with recently committed words as decoding context.
    /// Engines without prompt support ignore the context.
    fn transcribe_with_context(&self, window: &[f32], _context: Option<&str>) -> Result<Hypothesis> {
        self.transcribe(window)
    }

    /// Transcribe a WAV file.
    ///
    /// Default implementation reads and converts the file, then calls
    /// `transcribe()`.
    fn transcribe_file(&self, path: &Path) -> Result<Hypothesis> {
        let samples = read_wav_mono_f32_16k(path)?;
        self.transcribe(&samples)
    }

    fn model_name(&self) -> &str {
        "unknown"
    }
}
