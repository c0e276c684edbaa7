use std::borrow::Cow;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::SAMPLE_RATE;

/// Microphone capture delivering mono 16kHz frames over a channel.
///
/// Format conversion and resampling happen inside the cpal callback, so
/// consumers only ever see pipeline-ready frames and never run on the
/// audio thread.
pub struct CaptureStream {
    _stream: Stream,
    receiver: Option<Receiver<Vec<f32>>>,
}

impl CaptureStream {
    /// Open the default input device and start capturing.
    pub fn open() -> crate::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| crate::AudioError::DeviceNotFound("default".to_string()))?;
        if let Ok(name) = device.name() {
            tracing::info!(device = %name, "opening capture stream");
        }

        let (tx, rx) = unbounded();
        let stream = build_stream(device, tx)?;

        Ok(Self {
            _stream: stream,
            receiver: Some(rx),
        })
    }

    /// Take the frame receiver. Returns None if already taken.
    pub fn take_receiver(&mut self) -> Option<Receiver<Vec<f32>>> {
        self.receiver.take()
    }
}

fn build_stream(device: Device, tx: Sender<Vec<f32>>) -> crate::Result<Stream> {
    let config = device
        .default_input_config()
        .map_err(|e| crate::AudioError::StreamError(format!("no default input config: {e}")))?;

    let rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    tracing::debug!(
        rate,
        channels,
        format = ?config.sample_format(),
        "input stream config"
    );

    let stream = match config.sample_format() {
        SampleFormat::F32 => {
            let mut converter = FrameConverter::new(channels, rate);
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    let frame = converter.convert(data);
                    if !frame.is_empty() {
                        let _ = tx.send(frame);
                    }
                },
                log_stream_error,
                None,
            )?
        }
        SampleFormat::I16 => {
            let mut converter = FrameConverter::new(channels, rate);
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| {
                    let scaled: Vec<f32> =
                        data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                    let frame = converter.convert(&scaled);
                    if !frame.is_empty() {
                        let _ = tx.send(frame);
                    }
                },
                log_stream_error,
                None,
            )?
        }
        format => {
            return Err(crate::AudioError::StreamError(format!(
                "input sample format {format:?} not supported"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| crate::AudioError::StreamError(format!("failed to start: {e}")))?;

    Ok(stream)
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!(error = %err, "input stream error");
}

/// Turns raw callback buffers into mono 16kHz frames.
///
/// Each stream owns its converter, so no locking happens on the audio
/// thread. Rate conversion goes through the FFT resampler; if one cannot
/// be built for the device's rate pair, linear interpolation fills in.
struct FrameConverter {
    channels: usize,
    rate: u32,
    fft: Option<FftResampler>,
}

impl FrameConverter {
    fn new(channels: usize, rate: u32) -> Self {
        let fft = if rate != SAMPLE_RATE {
            let fft = FftResampler::new(rate, SAMPLE_RATE);
            if fft.is_none() {
                tracing::warn!(rate, "fft resampler unavailable, using linear fallback");
            }
            fft
        } else {
            None
        };
        Self {
            channels,
            rate,
            fft,
        }
    }

    fn convert(&mut self, data: &[f32]) -> Vec<f32> {
        let mono = downmix(data, self.channels);
        match &mut self.fft {
            Some(fft) => fft.feed(&mono),
            None if self.rate != SAMPLE_RATE => resample_linear(&mono, self.rate, SAMPLE_RATE),
            None => mono.into_owned(),
        }
    }
}

fn downmix(samples: &[f32], channels: usize) -> Cow<'_, [f32]> {
    if channels <= 1 {
        return Cow::Borrowed(samples);
    }
    let inv = 1.0 / channels as f32;
    let mut out = Vec::with_capacity(samples.len() / channels);
    for frame in samples.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() * inv);
    }
    Cow::Owned(out)
}

/// Stateless linear resampler, the fallback path.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step) as usize;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let base = pos as usize;
            let t = (pos - base as f64) as f32;
            match samples.get(base + 1) {
                Some(&next) => samples[base] * (1.0 - t) + next * t,
                None => samples.get(base).copied().unwrap_or(0.0),
            }
        })
        .collect()
}

/// FFT resampler fed in fixed-size blocks.
///
/// cpal callbacks deliver whatever size the device likes, so input is
/// carried across calls until a full block is available; a short tail
/// stays buffered until the next callback.
struct FftResampler {
    inner: FftFixedIn<f32>,
    carry: Vec<f32>,
    block: usize,
}

impl FftResampler {
    const BLOCK: usize = 256;

    fn new(from_rate: u32, to_rate: u32) -> Option<Self> {
        let inner =
            FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, Self::BLOCK, 2, 1).ok()?;
        Some(Self {
            inner,
            carry: Vec::with_capacity(Self::BLOCK * 2),
            block: Self::BLOCK,
        })
    }

    fn feed(&mut self, samples: &[f32]) -> Vec<f32> {
        self.carry.extend_from_slice(samples);

        let mut out = Vec::new();
        while self.carry.len() >= self.block {
            match self.inner.process(&[&self.carry[..self.block]], None) {
                Ok(mut blocks) => {
                    if let Some(first) = blocks.first_mut() {
                        out.append(first);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "resampler block dropped"),
            }
            self.carry.drain(..self.block);
        }
        out
    }
}
