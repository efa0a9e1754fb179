// Audio output backends
//
// The transport hands a fully prefilled BlockRenderer to an AudioOutput and the
// output drives it from whatever thread the backend uses. CpalOutput plays on the
// default device; OfflineOutput (see offline.rs) is pulled by hand.

use super::callback::BlockRenderer;
use super::status::SharedPlaybackState;
use crate::error::{MetronomeError, MetronomeResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedBufferSize, SupportedStreamConfig,
};
use log::{debug, error, info, warn};
use std::sync::Arc;

pub trait AudioOutput {
    /// Start pulling audio from `renderer`
    fn open(&mut self, renderer: BlockRenderer) -> MetronomeResult<()>;

    /// Stop pulling and release the stream. Safe to call when nothing is open.
    fn abort(&mut self);
}

/// Default output device through CPAL
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
}

impl CpalOutput {
    /// Open the default output device at `preferred_rate`, asking for
    /// `block_size` frames per callback. Falls back to the device defaults
    /// when either is unsupported; check `sample_rate()` afterwards.
    pub fn new(preferred_rate: u32, block_size: usize) -> MetronomeResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MetronomeError::Device("No audio output device found".into()))?;

        info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = Self::pick_config(&device, preferred_rate)?;
        let sample_format = supported.sample_format();

        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&(block_size as u32)) =>
            {
                BufferSize::Fixed(block_size as u32)
            }
            SupportedBufferSize::Range { min, max } => {
                warn!(
                    "Buffer size {} not supported (device range {}..={}), using device default",
                    block_size, min, max
                );
                BufferSize::Default
            }
            SupportedBufferSize::Unknown => {
                debug!("Device does not report buffer sizes, using device default");
                BufferSize::Default
            }
        };

        let mut config: StreamConfig = supported.into();
        config.buffer_size = buffer_size;

        info!(
            "Audio config: {} Hz, {} channel(s), {:?}, {:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
        })
    }

    fn pick_config(device: &Device, preferred_rate: u32) -> MetronomeResult<SupportedStreamConfig> {
        let rate = SampleRate(preferred_rate);

        let mut matching: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| MetronomeError::Device(format!("Cannot query device configs: {}", e)))?
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
                ) && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .collect();

        // F32 first, then the fewest channels
        matching.sort_by_key(|range| (range.sample_format() != SampleFormat::F32, range.channels()));

        if let Some(range) = matching.into_iter().next() {
            return Ok(range.with_sample_rate(rate));
        }

        let fallback = device
            .default_output_config()
            .map_err(|e| MetronomeError::Device(format!("Configuration error: {}", e)))?;
        warn!(
            "{} Hz not supported by the device, falling back to {} Hz",
            preferred_rate,
            fallback.sample_rate().0
        );
        Ok(fallback)
    }

    /// Rate the stream will actually run at
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut renderer: BlockRenderer,
    ) -> MetronomeResult<Stream>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = config.channels as usize;
        let shared: Arc<SharedPlaybackState> = Arc::clone(renderer.shared());

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // ========== SACRED ZONE ==========
                    // No allocations, No I/O, No blocking locks
                    renderer.render_interleaved(data, channels);
                    // ========== SACRED ZONE END ==========
                },
                move |err| {
                    // Runs outside the audio callback, so logging is fine here
                    error!("Audio stream error: {}", err);
                    shared.report_fault(&MetronomeError::Stream(err.to_string()));
                    // The renderer goes silent on its next callback once the state leaves Running
                    shared.reset();
                },
                None,
            )
            .map_err(|e| MetronomeError::Stream(format!("Error in stream creation: {}", e)))
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, renderer: BlockRenderer) -> MetronomeResult<()> {
        self.abort();

        let stream = match self.sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&self.device, &self.config, renderer),
            SampleFormat::I16 => Self::build_stream::<i16>(&self.device, &self.config, renderer),
            SampleFormat::U16 => Self::build_stream::<u16>(&self.device, &self.config, renderer),
            other => {
                return Err(MetronomeError::Device(format!(
                    "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                    other
                )));
            }
        }?;

        stream
            .play()
            .map_err(|e| MetronomeError::Stream(format!("Error in stream beginning: {}", e)))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Pausing stream before drop failed: {}", e);
            }
            debug!("Audio stream closed");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.abort();
    }
}
