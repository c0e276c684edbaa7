//! Example: Print microphone levels and voice activity.
//!
//! Run with: cargo run -p sotto-audio --example mic_levels

use std::time::{Duration, Instant};

use sotto_audio::CaptureStream;
use sotto_vad::{rms, EnergyVad, VadConfig, VadState};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sotto_audio=debug,sotto_vad=debug")
        .init();

    println!("=== Microphone Levels ===");
    println!("Speak into the default input device. Running for 15 seconds.\n");

    let mut capture = CaptureStream::open()?;
    let frames = capture
        .take_receiver()
        .ok_or_else(|| anyhow::anyhow!("frame receiver already taken"))?;

    let mut vad = EnergyVad::new(VadConfig::default())?;
    let started = Instant::now();
    let mut last_print = Instant::now();
    let mut peak = 0.0f32;

    while started.elapsed() < Duration::from_secs(15) {
        let frame = match frames.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(_) => continue,
        };

        let level = rms(&frame);
        peak = peak.max(level);
        vad.push_samples(&frame);

        if last_print.elapsed() >= Duration::from_millis(100) {
            let bar = "#".repeat((level * 400.0).min(40.0) as usize);
            let state = match vad.state() {
                VadState::Speech => "speech",
                VadState::Silence => "silence",
            };
            println!("{state:7} | {level:.4} | {bar}");
            last_print = Instant::now();
        }
    }

    println!("\nPeak RMS: {peak:.4}");
    Ok(())
}
