use std::borrow::Cow;
use std::path::Path;

use crate::{Result, SttError, STT_SAMPLE_RATE};

/// Read a WAV file as mono 16kHz f32 samples, whatever its on-disk
/// format and rate.
pub fn read_wav_mono_f32_16k(path: &Path) -> Result<Vec<f32>> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| SttError::InvalidAudioFormat(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| SttError::InvalidAudioFormat(e.to_string())))
            .collect::<Result<_>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(SttError::InvalidAudioFormat(format!(
                    "unsupported bit depth: {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map(|v| v as f32 * scale)
                        .map_err(|e| SttError::InvalidAudioFormat(e.to_string()))
                })
                .collect::<Result<_>>()?
        }
    };

    let mono: Vec<f32> = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    Ok(resample_linear(&mono, spec.sample_rate, STT_SAMPLE_RATE).into_owned())
}

/// Resample with linear interpolation, borrowing when the rate already
/// matches.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(samples);
    }
    let step = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / step) as usize;
    let resampled = (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let base = pos as usize;
            let t = (pos - base as f64) as f32;
            match samples.get(base + 1) {
                Some(&next) => samples[base] * (1.0 - t) + next * t,
                None => samples.get(base).copied().unwrap_or(0.0),
            }
        })
        .collect();
    Cow::Owned(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sotto_stt_{}_{}.wav", name, std::process::id()))
    }

    fn write_i16(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_reads_i16_mono_16k() {
        let path = temp_wav("i16_mono");
        write_i16(&path, 1, 16000, &[0, 16384, -16384, 32767]);

        let samples = read_wav_mono_f32_16k(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 0.5).abs() < 0.001);
        assert!((samples[2] + 0.5).abs() < 0.001);
    }

    #[test]
    fn test_downmixes_stereo() {
        let path = temp_wav("stereo");
        write_i16(&path, 2, 16000, &[16384, 0, 0, 16384]);

        let samples = read_wav_mono_f32_16k(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 0.001);
        assert!((samples[1] - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_resamples_8k_to_16k() {
        let path = temp_wav("8k");
        let input: Vec<i16> = (0..800).map(|i| (i % 100) as i16 * 100).collect();
        write_i16(&path, 1, 8000, &input);

        let samples = read_wav_mono_f32_16k(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples.len(), 1600);
    }

    #[test]
    fn test_reads_f32_format() {
        let path = temp_wav("f32");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0.0f32, 0.5, -0.5] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let samples = read_wav_mono_f32_16k(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(samples, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = read_wav_mono_f32_16k(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, SttError::InvalidAudioFormat(_)));
    }
}
