//! Energy-based voice activity detection with hysteresis.
//!
//! Frames are classified by RMS level against two thresholds: entering
//! speech requires several consecutive loud frames, leaving it requires a
//! longer run of quiet ones (the hangover). The gap between the thresholds
//! keeps the state from flapping on breath noise, and the hangover keeps
//! short pauses inside one utterance.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("invalid vad config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speech,
}

/// Root-mean-square level of a frame.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// RMS a frame must exceed to count toward entering speech.
    pub enter_rms: f32,
    /// RMS a frame must stay below to count toward leaving speech.
    /// Levels between the two thresholds hold the current state.
    pub exit_rms: f32,
    /// Consecutive loud frames required to enter speech.
    pub enter_frames: u32,
    /// Sustained quiet required to leave speech, in milliseconds.
    pub hangover_ms: u64,
    /// Samples per analysis frame.
    pub frame_samples: usize,
    /// Input sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enter_rms: 0.01,
            exit_rms: 0.007,
            enter_frames: 3,
            hangover_ms: 600,
            frame_samples: 512,
            sample_rate: 16000,
        }
    }
}

impl VadConfig {
    /// Duration of one analysis frame in milliseconds.
    pub fn frame_ms(&self) -> f64 {
        self.frame_samples as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Quiet frames that make up the hangover, rounded up.
    pub fn exit_frames(&self) -> u32 {
        (self.hangover_ms as f64 / self.frame_ms()).ceil() as u32
    }
}

/// Frame-by-frame speech detector.
///
/// Feed it capture samples in any chunking; partial frames are held until
/// complete. Speech boundaries are exposed as one-shot flags so a consumer
/// polling at its own cadence cannot miss a transition.
#[derive(Debug)]
pub struct EnergyVad {
    config: VadConfig,
    exit_frames: u32,
    state: VadState,
    above_streak: u32,
    below_streak: u32,
    quiet_frames: u64,
    pending: Vec<f32>,
    speech_pending: bool,
    speech_end_pending: bool,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Result<Self> {
        if config.frame_samples == 0 {
            return Err(VadError::InvalidConfig("frame_samples must be > 0".into()));
        }
        if config.sample_rate == 0 {
            return Err(VadError::InvalidConfig("sample_rate must be > 0".into()));
        }
        if config.enter_rms <= 0.0 || config.exit_rms <= 0.0 {
            return Err(VadError::InvalidConfig("thresholds must be > 0".into()));
        }
        if config.exit_rms > config.enter_rms {
            return Err(VadError::InvalidConfig(format!(
                "exit_rms {} must not exceed enter_rms {}",
                config.exit_rms, config.enter_rms
            )));
        }
        if config.enter_frames == 0 {
            return Err(VadError::InvalidConfig("enter_frames must be > 0".into()));
        }
        let exit_frames = config.exit_frames();
        if exit_frames <= config.enter_frames {
            return Err(VadError::InvalidConfig(format!(
                "hangover of {} frames must outlast enter_frames {}",
                exit_frames, config.enter_frames
            )));
        }

        Ok(Self {
            config,
            exit_frames,
            state: VadState::Silence,
            above_streak: 0,
            below_streak: 0,
            quiet_frames: 0,
            pending: Vec::new(),
            speech_pending: false,
            speech_end_pending: false,
        })
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.state == VadState::Speech
    }

    /// True if speech was observed since the last consumed boundary.
    pub fn has_pending_speech(&self) -> bool {
        self.speech_pending
    }

    /// Mark the current speech as consumed by a finalized utterance.
    pub fn mark_consumed(&mut self) {
        self.speech_pending = false;
    }

    /// One-shot: true once per speech-to-silence transition.
    pub fn take_speech_end(&mut self) -> bool {
        std::mem::take(&mut self.speech_end_pending)
    }

    /// Duration of the current quiet run in milliseconds.
    pub fn silence_ms(&self) -> u64 {
        (self.quiet_frames as f64 * self.config.frame_ms()) as u64
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.above_streak = 0;
        self.below_streak = 0;
        self.quiet_frames = 0;
        self.pending.clear();
        self.speech_pending = false;
        self.speech_end_pending = false;
    }

    /// Consume capture samples, processing every complete frame.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let frame_len = self.config.frame_samples;
        if self.pending.is_empty() && samples.len() % frame_len == 0 {
            for frame in samples.chunks_exact(frame_len) {
                self.process_frame(rms(frame));
            }
            return;
        }

        self.pending.extend_from_slice(samples);
        let mut offset = 0;
        while self.pending.len() - offset >= frame_len {
            let level = rms(&self.pending[offset..offset + frame_len]);
            self.process_frame(level);
            offset += frame_len;
        }
        self.pending.drain(..offset);
    }

    fn process_frame(&mut self, level: f32) {
        if level < self.config.exit_rms {
            self.quiet_frames = self.quiet_frames.saturating_add(1);
        } else {
            self.quiet_frames = 0;
        }

        match self.state {
            VadState::Silence => {
                if level > self.config.enter_rms {
                    self.above_streak += 1;
                    if self.above_streak >= self.config.enter_frames {
                        self.state = VadState::Speech;
                        self.speech_pending = true;
                        self.above_streak = 0;
                        self.below_streak = 0;
                        tracing::debug!(level, "speech started");
                    }
                } else {
                    self.above_streak = 0;
                }
            }
            VadState::Speech => {
                self.speech_pending = true;
                if level < self.config.exit_rms {
                    self.below_streak += 1;
                    if self.below_streak >= self.exit_frames {
                        self.state = VadState::Silence;
                        self.speech_end_pending = true;
                        self.below_streak = 0;
                        tracing::debug!(
                            hangover_ms = self.config.hangover_ms,
                            "speech ended"
                        );
                    }
                } else {
                    self.below_streak = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vad() -> EnergyVad {
        EnergyVad::new(VadConfig::default()).unwrap()
    }

    fn frame(level: f32) -> Vec<f32> {
        vec![level; 512]
    }

    fn push_frames(vad: &mut EnergyVad, level: f32, count: u32) {
        for _ in 0..count {
            vad.push_samples(&frame(level));
        }
    }

    const LOUD: f32 = 0.05;
    const QUIET: f32 = 0.0;
    // Between exit_rms (0.007) and enter_rms (0.01).
    const MID: f32 = 0.008;

    #[test]
    fn test_default_config_is_valid() {
        let config = VadConfig::default();
        assert_eq!(config.exit_frames(), 19);
        assert!(EnergyVad::new(config).is_ok());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = VadConfig {
            enter_rms: 0.005,
            exit_rms: 0.01,
            ..VadConfig::default()
        };
        assert!(matches!(
            EnergyVad::new(config),
            Err(VadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_hangover_shorter_than_entry() {
        let config = VadConfig {
            hangover_ms: 64,
            ..VadConfig::default()
        };
        // Two quiet frames do not outlast the three-frame entry requirement.
        assert!(EnergyVad::new(config).is_err());
    }

    #[test]
    fn test_entry_needs_consecutive_loud_frames() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 2);
        assert_eq!(vad.state(), VadState::Silence);

        // A quiet frame breaks the streak.
        push_frames(&mut vad, QUIET, 1);
        push_frames(&mut vad, LOUD, 2);
        assert_eq!(vad.state(), VadState::Silence);

        push_frames(&mut vad, LOUD, 1);
        assert_eq!(vad.state(), VadState::Speech);
        assert!(vad.has_pending_speech());
    }

    #[test]
    fn test_mid_band_frame_breaks_entry_streak() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 2);
        push_frames(&mut vad, MID, 1);
        push_frames(&mut vad, LOUD, 2);
        assert_eq!(vad.state(), VadState::Silence);
    }

    #[test]
    fn test_exit_needs_full_hangover() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 3);
        assert_eq!(vad.state(), VadState::Speech);

        let exit_frames = vad.config().exit_frames();
        push_frames(&mut vad, QUIET, exit_frames - 1);
        assert_eq!(vad.state(), VadState::Speech);
        assert!(!vad.take_speech_end());

        // A loud frame resets the quiet streak entirely.
        push_frames(&mut vad, LOUD, 1);
        push_frames(&mut vad, QUIET, exit_frames - 1);
        assert_eq!(vad.state(), VadState::Speech);

        push_frames(&mut vad, QUIET, 1);
        assert_eq!(vad.state(), VadState::Silence);
        assert!(vad.take_speech_end());
        // One-shot.
        assert!(!vad.take_speech_end());
    }

    #[test]
    fn test_mid_band_holds_speech() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 3);
        let exit_frames = vad.config().exit_frames();
        push_frames(&mut vad, QUIET, exit_frames - 1);
        push_frames(&mut vad, MID, 1);
        push_frames(&mut vad, QUIET, exit_frames - 1);
        assert_eq!(vad.state(), VadState::Speech);
    }

    #[test]
    fn test_partial_frames_accumulate() {
        let mut vad = vad();
        // Two loud frames, then the third split across pushes.
        push_frames(&mut vad, LOUD, 2);
        vad.push_samples(&vec![LOUD; 300]);
        assert_eq!(vad.state(), VadState::Silence);
        vad.push_samples(&vec![LOUD; 212]);
        assert_eq!(vad.state(), VadState::Speech);
    }

    #[test]
    fn test_pending_speech_survives_consume_while_speaking() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 3);
        vad.mark_consumed();
        assert!(!vad.has_pending_speech());
        // Still in speech: the next frame re-arms the flag.
        push_frames(&mut vad, LOUD, 1);
        assert!(vad.has_pending_speech());
    }

    #[test]
    fn test_silence_ms_tracks_quiet_run() {
        let mut vad = vad();
        assert_eq!(vad.silence_ms(), 0);
        push_frames(&mut vad, QUIET, 10);
        assert_eq!(vad.silence_ms(), 320);
        push_frames(&mut vad, LOUD, 1);
        assert_eq!(vad.silence_ms(), 0);
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut vad = vad();
        push_frames(&mut vad, LOUD, 3);
        let exit_frames = vad.config().exit_frames();
        push_frames(&mut vad, QUIET, exit_frames);
        vad.reset();
        assert_eq!(vad.state(), VadState::Silence);
        assert!(!vad.has_pending_speech());
        assert!(!vad.take_speech_end());
        assert_eq!(vad.silence_ms(), 0);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: VadConfig = serde_json::from_str(r#"{"enter_rms": 0.02}"#).unwrap();
        assert_eq!(config.enter_rms, 0.02);
        assert_eq!(config.exit_rms, 0.007);
        assert_eq!(config.frame_samples, 512);
    }
}
