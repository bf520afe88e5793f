use std::sync::Arc;

use crate::models::audio_format::AudioFormat;
use crate::models::error::StreamError;
use crate::processing::sample_converter::SampleSlice;

/// One hardware buffer handed to the capture callback.
#[derive(Debug, Clone, Copy)]
pub struct InputBuffer<'a> {
    /// Interleaved samples in the device's native representation.
    pub samples: SampleSlice<'a>,
    /// Native format the device reports for this buffer.
    pub format: AudioFormat,
}

/// Callback invoked for every captured buffer.
///
/// Fires on the device's real-time thread. Implementations must not block.
pub type InputBufferCallback = Arc<dyn Fn(InputBuffer<'_>) + Send + Sync + 'static>;

/// Callback invoked when a device reports a runtime error.
///
/// `DeviceInit`/`DeviceLost` mean the device is no longer usable; anything
/// else is a transient per-buffer failure.
pub type DeviceErrorCallback = Arc<dyn Fn(StreamError) + Send + Sync + 'static>;

/// Parameters a capture session asks the device for.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub sample_rate: f64,
    pub channels: u16,
    /// Preferred buffer size in frames. Devices may round or ignore it.
    pub buffer_size: Option<u32>,
}

/// What a device agreed to when opened.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedInput {
    /// Format the device will deliver buffers in.
    pub native_format: AudioFormat,
    /// Actual buffer size in frames, when the device exposes it.
    pub buffer_frames: Option<u32>,
}

/// Hardware input device capability.
///
/// Implemented by:
/// - `CpalCaptureDevice` (audio-stream-cpal)
/// - simulated devices in tests
pub trait CaptureDevice: Send {
    /// Acquire the device and negotiate its native format.
    fn open(&mut self, request: &CaptureRequest) -> Result<OpenedInput, StreamError>;

    /// Begin delivering buffers to `on_buffer`.
    fn start(
        &mut self,
        on_buffer: InputBufferCallback,
        on_error: DeviceErrorCallback,
    ) -> Result<(), StreamError>;

    /// Stop delivery and release the device.
    ///
    /// After this returns no new callback may start; one already running may
    /// still be finishing.
    fn stop(&mut self) -> Result<(), StreamError>;
}
