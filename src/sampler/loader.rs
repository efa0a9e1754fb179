// Click sample loading - WAV files to mono f32 at the engine sample rate

use crate::error::{MetronomeError, MetronomeResult};
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// Load a WAV file as a mono click at `target_rate`.
/// Multi-channel files are averaged down to mono; other rates are resampled linearly.
pub fn load_click(path: &Path, target_rate: u32) -> MetronomeResult<Vec<f32>> {
    let reader = WavReader::open(path)
        .map_err(|e| MetronomeError::SampleLoad(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>(),
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| MetronomeError::SampleLoad(format!("{}: {}", path.display(), e)))?;

    let mono = mix_to_mono(&samples, spec.channels as usize);
    Ok(resample_linear(&mono, spec.sample_rate, target_rate))
}

/// Average interleaved channels into one
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler, good enough for short click transients
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() || source_rate == 0 {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples[samples.len() - 1];

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            if idx + 1 >= samples.len() {
                return last;
            }
            let frac = (src_pos - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        })
        .collect()
}
