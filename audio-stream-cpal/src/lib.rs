//! # audio-stream-cpal
//!
//! Cross-platform hardware backend for audio-stream-core, built on cpal.
//!
//! Provides:
//! - `CpalCaptureDevice`: microphone capture in the device's native format
//! - `CpalPlaybackDevice`: speaker playback with per-buffer completions
//! - `CpalPermissionProvider`: input device availability as permission
//! - `ScheduledBufferQueue`: device-agnostic buffer scheduling (always built)
//!
//! The cpal parts sit behind the `cpal` feature so headless builds need no
//! system audio libraries.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_stream_core::AudioStreamBridge;
//! use audio_stream_cpal::{CpalCaptureDevice, CpalPermissionProvider, CpalPlaybackDevice};
//!
//! let bridge = AudioStreamBridge::new(
//!     CpalCaptureDevice::default_device(),
//!     CpalPlaybackDevice::default_device(),
//!     Arc::new(CpalPermissionProvider),
//!     sink,
//! )?;
//! ```

pub mod buffer_queue;

#[cfg(feature = "cpal")]
pub mod cpal_input;
#[cfg(feature = "cpal")]
pub mod cpal_output;
#[cfg(feature = "cpal")]
pub mod devices;
#[cfg(feature = "cpal")]
pub mod error;
#[cfg(feature = "cpal")]
pub mod permissions;
#[cfg(feature = "cpal")]
mod stream_thread;

pub use buffer_queue::ScheduledBufferQueue;

#[cfg(feature = "cpal")]
pub use cpal_input::CpalCaptureDevice;
#[cfg(feature = "cpal")]
pub use cpal_output::CpalPlaybackDevice;
#[cfg(feature = "cpal")]
pub use devices::{list_devices, Direction};
#[cfg(feature = "cpal")]
pub use error::BackendError;
#[cfg(feature = "cpal")]
pub use permissions::CpalPermissionProvider;
