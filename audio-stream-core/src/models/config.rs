use serde::{Deserialize, Serialize};

use super::audio_format::AudioFormat;
use super::error::StreamError;

/// Configuration for a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfiguration {
    /// Target sample rate in Hz of emitted chunks (default: 16000).
    pub sample_rate: f64,

    /// Number of output channels (default: 1). Valid values: 1, 2.
    pub channels: u16,

    /// Wall-clock interval between chunk emissions (default: 100ms).
    pub interval_ms: u64,

    /// Requested device buffer size in frames, or None for the device default.
    pub buffer_size: Option<u32>,

    /// Opaque options forwarded to the host's audio-session configurator.
    pub session_options: serde_json::Value,
}

impl RecordingConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.interval_ms == 0 {
            return Err("chunk interval must be positive".into());
        }
        if self.buffer_size == Some(0) {
            return Err("buffer size must be positive".into());
        }
        Ok(())
    }

    /// The int16 format chunks are emitted in.
    pub fn target_format(&self) -> Result<AudioFormat, StreamError> {
        AudioFormat::pcm16(self.sample_rate, self.channels)
    }
}

impl Default for RecordingConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 16000.0,
            channels: 1,
            interval_ms: 100,
            buffer_size: None,
            session_options: serde_json::Value::Null,
        }
    }
}

/// Configuration for a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfiguration {
    /// Sample rate in Hz of incoming chunks (default: 24000).
    pub sample_rate: f64,

    /// Channel count of incoming chunks (default: 1).
    pub channels: u16,
}

impl PlaybackConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }

    /// The device-native format decoded chunks are converted into.
    pub fn output_format(&self) -> Result<AudioFormat, StreamError> {
        AudioFormat::float32(self.sample_rate, self.channels)
    }
}

impl Default for PlaybackConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 24000.0,
            channels: 1,
        }
    }
}
