//! cpal microphone capture device.
//!
//! Negotiates the closest supported input config and delivers buffers in
//! the device's native representation (int16 or float32) from a stream
//! owned by a dedicated thread.

use cpal::traits::DeviceTrait;

use audio_stream_core::{
    AudioFormat, CaptureDevice, CaptureRequest, DeviceErrorCallback, InputBuffer, InputBufferCallback, OpenedInput,
    SampleRepresentation, SampleSlice, StreamError,
};

use crate::devices::{choose_config, find_device, ChosenConfig, Direction};
use crate::error::BackendError;
use crate::stream_thread::StreamWorker;

/// Microphone capture on the default cpal host.
pub struct CpalCaptureDevice {
    device_name: Option<String>,
    opened: Option<ChosenConfig>,
    worker: Option<StreamWorker>,
}

impl CpalCaptureDevice {
    /// Capture from the system default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            opened: None,
            worker: None,
        }
    }

    /// Capture from a specific input device by name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            opened: None,
            worker: None,
        }
    }
}

fn native_format(chosen: &ChosenConfig) -> Result<AudioFormat, StreamError> {
    AudioFormat::new(
        chosen.config.sample_rate.0 as f64,
        chosen.config.channels,
        chosen.representation,
    )
}

impl CaptureDevice for CpalCaptureDevice {
    fn open(&mut self, request: &CaptureRequest) -> Result<OpenedInput, StreamError> {
        let device = find_device(Direction::Input, self.device_name.as_deref())?;
        let ranges = device.supported_input_configs().map_err(BackendError::from)?;

        // Prefer int16 so matching formats take the identity path.
        let chosen = choose_config(
            ranges,
            request.sample_rate.round() as u32,
            request.channels,
            request.buffer_size,
            SampleRepresentation::Int16le,
            false,
        )
        .ok_or_else(|| BackendError::NoUsableConfig("input device offers no int16/float32 config".into()))?;

        let format = native_format(&chosen)?;
        log::info!(
            "Input device {}: {}Hz, {} channels, {:?}",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            format.sample_rate,
            format.channel_count,
            format.sample_representation
        );

        let buffer_frames = chosen.buffer_frames;
        self.opened = Some(chosen);
        Ok(OpenedInput {
            native_format: format,
            buffer_frames,
        })
    }

    fn start(&mut self, on_buffer: InputBufferCallback, on_error: DeviceErrorCallback) -> Result<(), StreamError> {
        if self.worker.is_some() {
            return Err(StreamError::AlreadyActive("capture device"));
        }
        let chosen = self.opened.clone().ok_or(BackendError::NotOpened)?;
        let format = native_format(&chosen)?;
        let device_name = self.device_name.clone();

        let worker = StreamWorker::spawn("cpal-capture", move || {
            let device = find_device(Direction::Input, device_name.as_deref())?;
            let error_callback = move |err: cpal::StreamError| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    on_error(StreamError::DeviceLost("input device disconnected".into()))
                }
                cpal::StreamError::BackendSpecific { err } => {
                    log::warn!("Input stream error: {}", err);
                }
            };

            let stream = match chosen.representation {
                SampleRepresentation::Int16le => device.build_input_stream(
                    &chosen.config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        on_buffer(InputBuffer {
                            samples: SampleSlice::Int16(data),
                            format,
                        })
                    },
                    error_callback,
                    None,
                )?,
                SampleRepresentation::Float32 => device.build_input_stream(
                    &chosen.config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        on_buffer(InputBuffer {
                            samples: SampleSlice::Float32(data),
                            format,
                        })
                    },
                    error_callback,
                    None,
                )?,
            };
            Ok(stream)
        })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        self.opened = None;
        Ok(())
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
