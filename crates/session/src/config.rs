use serde::{Deserialize, Serialize};
use sotto_input::InjectorOptions;
use sotto_vad::VadConfig;

use crate::SessionError;

/// Pipeline configuration, read once at session spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capture sample rate in Hz. Must match `vad.sample_rate`.
    pub sample_rate: u32,
    /// Ring buffer capacity in seconds. Audio older than this is gone;
    /// an unbroken utterance longer than the buffer loses its start.
    pub buffer_secs: f32,
    /// Trailing window handed to the engine on each pass, in seconds.
    pub window_secs: f32,
    /// Inference cadence in milliseconds.
    pub cadence_ms: u64,
    /// Consecutive matching passes before a token commits.
    pub stability_threshold: u8,
    /// Minimum samples in the window before the engine gets called;
    /// below this the pass is skipped.
    pub min_window_samples: usize,
    /// Committed words offered to the engine as decoding context.
    pub context_words: usize,
    /// Start/stop/toggle signals arriving closer together than this are
    /// treated as switch bounce and ignored, in milliseconds.
    pub debounce_ms: u64,
    pub vad: VadConfig,
    pub injector: InjectorOptions,
    /// Sole-content phrases dropped as hallucinations. Empty keeps the
    /// built-in list.
    pub filter_phrases: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: sotto_audio::SAMPLE_RATE,
            buffer_secs: 12.0,
            window_secs: 10.0,
            cadence_ms: 500,
            stability_threshold: 2,
            min_window_samples: 1600,
            context_words: 50,
            debounce_ms: 200,
            vad: VadConfig::default(),
            injector: InjectorOptions::default(),
            filter_phrases: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.sample_rate == 0 {
            return Err(SessionError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if self.buffer_secs <= 0.0 {
            return Err(SessionError::InvalidConfig("buffer_secs must be > 0".into()));
        }
        if self.window_secs <= 0.0 || self.window_secs > self.buffer_secs {
            return Err(SessionError::InvalidConfig(format!(
                "window_secs {} must be > 0 and fit the {}s buffer",
                self.window_secs, self.buffer_secs
            )));
        }
        if self.cadence_ms == 0 {
            return Err(SessionError::InvalidConfig("cadence_ms must be > 0".into()));
        }
        if self.stability_threshold == 0 {
            return Err(SessionError::InvalidConfig(
                "stability_threshold must be > 0".into(),
            ));
        }
        if self.vad.sample_rate != self.sample_rate {
            return Err(SessionError::InvalidConfig(format!(
                "vad.sample_rate {} does not match sample_rate {}",
                self.vad.sample_rate, self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn window_ms(&self) -> u64 {
        (self.window_secs * 1000.0) as u64
    }
}
