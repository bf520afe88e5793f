//! cpal speaker playback device.
//!
//! Scheduled buffers are queued in a [`ScheduledBufferQueue`] that the
//! output stream callback drains; silence plays while the queue is empty.

use std::sync::Arc;

use cpal::traits::DeviceTrait;

use audio_stream_core::processing::pcm;
use audio_stream_core::{
    AudioFormat, BufferCompletion, DeviceErrorCallback, PlaybackBuffer, PlaybackDevice, SampleRepresentation,
    StreamError,
};

use crate::buffer_queue::ScheduledBufferQueue;
use crate::devices::{choose_config, find_device, Direction};
use crate::error::BackendError;
use crate::stream_thread::StreamWorker;

/// Speaker playback on the default cpal host.
pub struct CpalPlaybackDevice {
    device_name: Option<String>,
    queue: Arc<ScheduledBufferQueue>,
    worker: Option<StreamWorker>,
}

impl CpalPlaybackDevice {
    /// Play through the system default output device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            queue: Arc::new(ScheduledBufferQueue::new()),
            worker: None,
        }
    }

    /// Play through a specific output device by name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            queue: Arc::new(ScheduledBufferQueue::new()),
            worker: None,
        }
    }
}

impl PlaybackDevice for CpalPlaybackDevice {
    fn start(&mut self, format: &AudioFormat, on_error: DeviceErrorCallback) -> Result<(), StreamError> {
        if self.worker.is_some() {
            return Err(StreamError::AlreadyActive("playback device"));
        }
        let device = find_device(Direction::Output, self.device_name.as_deref())?;
        let ranges = device.supported_output_configs().map_err(BackendError::from)?;

        // Output is never resampled: rate and layout must be supported as-is.
        let chosen = choose_config(
            ranges,
            format.sample_rate.round() as u32,
            format.channel_count,
            None,
            SampleRepresentation::Float32,
            true,
        )
        .ok_or_else(|| {
            BackendError::NoUsableConfig(format!(
                "output device cannot play {}Hz with {} channels",
                format.sample_rate, format.channel_count
            ))
        })?;
        drop(device);

        log::info!(
            "Output stream: {}Hz, {} channels, {:?}",
            chosen.config.sample_rate.0,
            chosen.config.channels,
            chosen.representation
        );

        self.queue.clear();
        let queue = Arc::clone(&self.queue);
        let device_name = self.device_name.clone();

        let worker = StreamWorker::spawn("cpal-playback", move || {
            let device = find_device(Direction::Output, device_name.as_deref())?;
            let error_callback = move |err: cpal::StreamError| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    on_error(StreamError::DeviceLost("output device disconnected".into()))
                }
                cpal::StreamError::BackendSpecific { err } => {
                    on_error(StreamError::PlaybackWrite(err.to_string()))
                }
            };

            let stream = match chosen.representation {
                SampleRepresentation::Float32 => device.build_output_stream(
                    &chosen.config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        queue.fill(out, 0.0, |s| s);
                    },
                    error_callback,
                    None,
                )?,
                SampleRepresentation::Int16le => device.build_output_stream(
                    &chosen.config,
                    move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        queue.fill(out, 0, pcm::f32_to_i16);
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

    fn schedule(&mut self, buffer: PlaybackBuffer, on_complete: BufferCompletion) -> Result<(), StreamError> {
        if self.worker.is_none() {
            return Err(StreamError::PlaybackWrite("output stream is not running".into()));
        }
        self.queue.push(buffer, on_complete);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
        let dropped = self.queue.clear();
        if dropped > 0 {
            log::debug!("Dropped {} queued playback buffers", dropped);
        }
        Ok(())
    }
}

impl Drop for CpalPlaybackDevice {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
