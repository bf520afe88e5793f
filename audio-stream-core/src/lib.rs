//! # audio-stream-core
//!
//! Platform-agnostic core for bidirectional real-time audio streaming.
//!
//! Captures microphone audio as time-sliced base64 PCM16 chunks and plays
//! back streamed PCM16 chunks with exactly-once drain detection. Platform
//! backends implement the `CaptureDevice`/`PlaybackDevice` traits and plug
//! into the generic sessions.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/       ← CaptureDevice, PlaybackDevice, StreamDelegate, PermissionProvider
//! ├── models/       ← StreamError, AudioFormat, configurations, states, event payloads
//! ├── processing/   ← SampleConverter, ChunkAccumulator, PCM16/base64 helpers
//! ├── session/      ← CaptureSession, PlaybackSession, PlaybackQueue, event dispatch
//! └── bridge/       ← AudioStreamBridge (host-facing operations and events)
//! ```

pub mod bridge;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use bridge::messages::{BridgeEvent, PermissionResponse, StartPlaybackRequest, StartRecordingRequest};
pub use bridge::stream_bridge::{AudioStreamBridge, EventSink};
pub use models::audio_format::{AudioFormat, NegotiatedFormat, SampleRepresentation};
pub use models::audio_models::{AudioChunk, AudioLevels, CaptureDiagnostics, PlaybackDiagnostics};
pub use models::config::{PlaybackConfiguration, RecordingConfiguration};
pub use models::error::StreamError;
pub use models::events::{ChunkEvent, ErrorEvent};
pub use models::state::{PlaybackState, RecordingState};
pub use processing::chunk_accumulator::ChunkAccumulator;
pub use processing::sample_converter::{SampleBuffer, SampleConverter, SampleSlice};
pub use session::capture::CaptureSession;
pub use session::clock::{Clock, ManualClock, SystemClock};
pub use session::playback::PlaybackSession;
pub use session::playback_queue::PlaybackQueue;
pub use traits::capture_device::{
    CaptureDevice, CaptureRequest, DeviceErrorCallback, InputBuffer, InputBufferCallback, OpenedInput,
};
pub use traits::permission::{PermissionProvider, PermissionStatus, SessionConfigurator};
pub use traits::playback_device::{BufferCompletion, PlaybackBuffer, PlaybackDevice};
pub use traits::stream_delegate::StreamDelegate;
