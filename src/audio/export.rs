// Audio Export - Offline rendering of a bar-limited click track to WAV
//
// Drives the scheduler directly, as fast as possible. There is no device, so the
// playback queue and its latency are skipped; the sample stream is identical to
// what a device would play.

use crate::audio::format_conversion::f32_to_i16;
use crate::error::{MetronomeError, MetronomeResult};
use crate::sampler::SampleBank;
use crate::sequencer::{BeatPattern, ClickScheduler, NextBlock};
use hound::{WavSpec, WavWriter};
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Render `bars` bars of clicks into a mono buffer
pub fn render_bars(
    bank: Arc<SampleBank>,
    block_size: usize,
    bpm: u32,
    pattern: BeatPattern,
    bars: u32,
) -> MetronomeResult<Vec<f32>> {
    let mut scheduler = ClickScheduler::new(bank, block_size, bpm, pattern)?;
    scheduler.limit_bars(bars)?;

    let mut samples = Vec::new();
    let mut block = vec![0.0; block_size];
    while let NextBlock::Audio { .. } = scheduler.next_block(&mut block) {
        samples.extend_from_slice(&block);
    }
    Ok(samples)
}

/// Render `bars` bars and write them as 16-bit mono WAV. Returns the number of samples written.
pub fn export_bars_to_wav<P: AsRef<Path>>(
    path: P,
    bank: Arc<SampleBank>,
    block_size: usize,
    bpm: u32,
    pattern: BeatPattern,
    bars: u32,
) -> MetronomeResult<usize> {
    let path = path.as_ref();
    let sample_rate = bank.sample_rate();
    let samples = render_bars(bank, block_size, bpm, pattern, bars)?;

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let to_err = |e: hound::Error| MetronomeError::Stream(format!("{}: {}", path.display(), e));
    let mut writer = WavWriter::create(path, spec).map_err(to_err)?;
    for &sample in &samples {
        writer.write_sample(f32_to_i16(sample)).map_err(to_err)?;
    }
    writer.finalize().map_err(to_err)?;

    info!(
        "Exported {} bars at {} BPM to {} ({} samples)",
        bars,
        bpm,
        path.display(),
        samples.len()
    );
    Ok(samples.len())
}
