//! CPAL input device source.

use crate::capture::{CaptureSource, StreamId};
use crate::frame::FrameWriter;
use crate::lockfree::AtomicFlag;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The stream is only
/// touched through `&mut DeviceSource`, which the pipeline keeps behind its
/// session mutex, and it is dropped on `detach`.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is never accessed concurrently; see `StreamHandle`.
unsafe impl Send for StreamHandle {}

/// Input device information
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Live microphone / line input through CPAL.
pub struct DeviceSource {
    id: StreamId,
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream: Option<StreamHandle>,
    failed: Arc<AtomicFlag>,
}

impl DeviceSource {
    /// Open the host's default input device.
    pub fn default_input() -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(Error::NoInputDevice)?;
        Self::from_device(device)
    }

    /// Open an input device by index (see [`DeviceSource::list_devices`]).
    pub fn with_device_index(index: usize) -> Result<Self> {
        let host = cpal::default_host();
        let devices: Vec<_> = host.input_devices()?.collect();
        let device_count = devices.len();
        let device = devices.into_iter().nth(index).ok_or_else(|| {
            Error::InvalidDevice(format!(
                "Input device index {} out of range (available: {})",
                index, device_count
            ))
        })?;
        Self::from_device(device)
    }

    fn from_device(device: cpal::Device) -> Result<Self> {
        let config = device.default_input_config()?;
        let name = device.name()?;

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);

        tracing::debug!(
            "Opened input device {} ({} Hz, {} ch)",
            name,
            config.sample_rate().0,
            config.channels()
        );

        Ok(Self {
            id: StreamId(hasher.finish()),
            device,
            config,
            stream: None,
            failed: Arc::new(AtomicFlag::new(false)),
        })
    }

    pub fn list_devices() -> Vec<InputDeviceInfo> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        if let Ok(input_devices) = host.input_devices() {
            for (index, device) in input_devices.enumerate() {
                let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                let (channels, sample_rate) = match device.default_input_config() {
                    Ok(config) => (config.channels(), config.sample_rate().0),
                    Err(_) => (1, 44100),
                };
                devices.push(InputDeviceInfo {
                    index,
                    name,
                    channels,
                    sample_rate,
                });
            }
        }

        devices
    }

    /// Whether the platform reported a fatal stream error since attaching.
    pub fn has_failed(&self) -> bool {
        self.failed.get()
    }

    fn build_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        mut writer: FrameWriter,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        use cpal::Sample;

        let channels = config.channels as usize;
        let failed = self.failed.clone();

        let stream = self.device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let scale = 1.0 / channels as f32;
                for frame in data.chunks_exact(channels) {
                    let mut sum = 0.0f32;
                    for sample in frame {
                        sum += sample.to_sample::<f32>();
                    }
                    writer.push(sum * scale);
                }
            },
            move |err| {
                // Error callback runs off the audio thread
                tracing::warn!("Input stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    failed.set(true);
                }
            },
            None,
        )?;

        Ok(stream)
    }
}

impl CaptureSource for DeviceSource {
    fn stream_id(&self) -> StreamId {
        self.id
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate().0 as f64
    }

    fn attach(&mut self, writer: FrameWriter) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::AlreadyAttached);
        }
        if self.failed.get() {
            return Err(Error::StreamEnded);
        }

        let stream_config: cpal::StreamConfig = self.config.clone().into();
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&stream_config, writer)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&stream_config, writer)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&stream_config, writer)?,
            format => {
                return Err(Error::UnsupportedSampleFormat(format!("{:?}", format)));
            }
        };

        stream.play()?;
        self.stream = Some(StreamHandle(stream));
        Ok(())
    }

    fn detach(&mut self) {
        self.stream = None;
    }

    fn input_latency_ms(&self) -> f32 {
        match self.config.buffer_size() {
            cpal::SupportedBufferSize::Range { min, .. } => {
                *min as f32 / self.config.sample_rate().0 as f32 * 1000.0
            }
            cpal::SupportedBufferSize::Unknown => 0.0,
        }
    }
}
