// Sample conversion from the internal mono f32 stream to device and file formats

use cpal::{FromSample, Sample};

/// f32 in [-1.0, 1.0] to 16-bit PCM, clamping out-of-range input.
/// Negative values scale by 32768 so -1.0 reaches i16::MIN.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    let scale = if clamped < 0.0 { 32768.0 } else { 32767.0 };
    (clamped * scale).round() as i16
}

/// Copy one mono sample to every channel of an interleaved frame
#[inline]
pub fn write_mono_to_interleaved_frame<T>(sample: f32, frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    let converted = T::from_sample(sample);
    frame.fill(converted);
}
