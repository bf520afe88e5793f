use crate::models::audio_format::AudioFormat;
use crate::models::error::StreamError;
use crate::traits::capture_device::DeviceErrorCallback;

/// A decoded buffer ready for the output device.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    /// Position of this buffer in the session's schedule, starting at 0.
    pub index: u64,
    /// Interleaved normalized float samples.
    pub samples: Vec<f32>,
}

/// Invoked exactly once when the device has finished playing a buffer.
pub type BufferCompletion = Box<dyn FnOnce() + Send + 'static>;

/// Hardware output device capability.
///
/// The device owns conversion from normalized floats to whatever its
/// native representation is.
pub trait PlaybackDevice: Send {
    /// Acquire the device for `format`. Fails with `DeviceInit` if the
    /// device cannot play that rate/layout.
    fn start(&mut self, format: &AudioFormat, on_error: DeviceErrorCallback) -> Result<(), StreamError>;

    /// Queue a buffer behind everything scheduled before it.
    ///
    /// Must not wait for playback. `on_complete` runs once the last sample
    /// of the buffer has been handed to the hardware, possibly on another
    /// thread, possibly before this call returns. On error the buffer was
    /// not queued and `on_complete` is dropped without running.
    fn schedule(&mut self, buffer: PlaybackBuffer, on_complete: BufferCompletion) -> Result<(), StreamError>;

    /// Stop playback immediately, dropping any queued buffers.
    fn stop(&mut self) -> Result<(), StreamError>;
}
