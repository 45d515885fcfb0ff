use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

use crate::config::Config;

/// Cross-platform audio recorder using CPAL. Hands off raw mono `f32`
/// buffers at the device's native sample rate; downsampling to the
/// pipeline's `target_rate` is the resampler's job, not this adapter's.
pub struct AudioRecorder {
    config: Config,
}

/// Audio recording error.
#[derive(Debug)]
pub enum AudioError {
    DeviceError(String),
    StreamError(String),
    ConfigError(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::DeviceError(msg) => write!(f, "Audio device error: {}", msg),
            AudioError::StreamError(msg) => write!(f, "Audio stream error: {}", msg),
            AudioError::ConfigError(msg) => write!(f, "Audio config error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

impl AudioRecorder {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Start recording audio and return a receiver of `(mono f32 buffer,
    /// sample rate)` pairs.
    pub fn start_recording(
        &mut self,
        device_name: Option<String>,
        _control_rx: mpsc::Receiver<()>,
    ) -> Result<mpsc::Receiver<(Vec<f32>, u32)>, AudioError> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name {
            self.find_device_by_name(&host, &name)?
        } else {
            host.default_input_device().ok_or_else(|| AudioError::DeviceError("No default input device found".to_string()))?
        };

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::ConfigError(format!("Failed to get default input config: {}", e)))?;

        let (sample_tx, sample_rx) = mpsc::channel();

        let stream = self.create_input_stream(&device, config, sample_tx)?;

        stream.play().map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

        // Can't move a non-Send Stream to another thread on some platforms;
        // leak it to keep it alive for the process lifetime.
        std::mem::forget(stream);

        Ok(sample_rx)
    }

    fn find_device_by_name(&self, host: &cpal::Host, name: &str) -> Result<Device, AudioError> {
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::DeviceError(format!("Failed to enumerate input devices: {}", e)))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name == name {
                    return Ok(device);
                }
            }
        }

        Err(AudioError::DeviceError(format!("Device '{}' not found", name)))
    }

    fn create_input_stream(
        &self,
        device: &Device,
        config: cpal::SupportedStreamConfig,
        sample_tx: mpsc::Sender<(Vec<f32>, u32)>,
    ) -> Result<Stream, AudioError> {
        let buffer_size = self.config.buffer_size;
        let mut sample_buffer: Vec<f32> = Vec::with_capacity(buffer_size);

        let stream_config = StreamConfig {
            channels: config.channels(),
            sample_rate: config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = config.channels() as usize;
        let sample_rate = config.sample_rate().0;
        let quiet_mode = self.config.quiet_mode;

        let stream: Result<Stream, cpal::BuildStreamError> = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for sample in to_mono_f32(data, channels) {
                        sample_buffer.push(sample);
                        if sample_buffer.len() >= buffer_size {
                            if sample_tx.send((sample_buffer.clone(), sample_rate)).is_err() {
                                return;
                            }
                            sample_buffer.clear();
                        }
                    }
                },
                move |err| {
                    if !quiet_mode {
                        eprintln!("An error occurred on the input audio stream: {}", err);
                    }
                },
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let as_f32: Vec<f32> = data.iter().map(|&s| s as f32 / i16::MAX as f32).collect();
                    for sample in to_mono_f32(&as_f32, channels) {
                        sample_buffer.push(sample);
                        if sample_buffer.len() >= buffer_size {
                            if sample_tx.send((sample_buffer.clone(), sample_rate)).is_err() {
                                return;
                            }
                            sample_buffer.clear();
                        }
                    }
                },
                move |err| {
                    if !quiet_mode {
                        eprintln!("An error occurred on the input audio stream: {}", err);
                    }
                },
                None,
            ),
            cpal::SampleFormat::U16 => device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let as_f32: Vec<f32> = data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0).collect();
                    for sample in to_mono_f32(&as_f32, channels) {
                        sample_buffer.push(sample);
                        if sample_buffer.len() >= buffer_size {
                            if sample_tx.send((sample_buffer.clone(), sample_rate)).is_err() {
                                return;
                            }
                            sample_buffer.clear();
                        }
                    }
                },
                move |err| {
                    if !quiet_mode {
                        eprintln!("An error occurred on the input audio stream: {}", err);
                    }
                },
                None,
            ),
            other => {
                return Err(AudioError::ConfigError(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream.map_err(|e| AudioError::StreamError(format!("Failed to create input stream: {}", e)))
    }

    /// List available input device names.
    pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::DeviceError(format!("Failed to enumerate input devices: {}", e)))?;

        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

fn to_mono_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
