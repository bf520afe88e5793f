use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// MIME token reported for negotiated capture formats.
pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// Bit depth of every payload that crosses the wire.
pub const WIRE_BIT_DEPTH: u16 = 16;

/// In-memory representation of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRepresentation {
    /// Signed 16-bit, little-endian when serialized.
    Int16le,
    /// Normalized float in `[-1.0, 1.0]`.
    Float32,
}

impl SampleRepresentation {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int16le => 2,
            Self::Float32 => 4,
        }
    }
}

/// Lowest sample rate a resampler can be built for.
const MIN_SAMPLE_RATE: f64 = 1.0;

/// Sample rate, channel layout and sample representation of a stream.
///
/// Immutable once a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub channel_count: u16,
    pub sample_representation: SampleRepresentation,
}

impl AudioFormat {
    /// Build a format, rejecting values no converter or device can honor.
    pub fn new(
        sample_rate: f64,
        channel_count: u16,
        sample_representation: SampleRepresentation,
    ) -> Result<Self, StreamError> {
        if !sample_rate.is_finite() || sample_rate < MIN_SAMPLE_RATE {
            return Err(StreamError::Format(format!("invalid sample rate: {}", sample_rate)));
        }
        if ![1, 2].contains(&channel_count) {
            return Err(StreamError::Format(format!(
                "unsupported channel count: {}",
                channel_count
            )));
        }
        Ok(Self {
            sample_rate,
            channel_count,
            sample_representation,
        })
    }

    pub fn pcm16(sample_rate: f64, channel_count: u16) -> Result<Self, StreamError> {
        Self::new(sample_rate, channel_count, SampleRepresentation::Int16le)
    }

    pub fn float32(sample_rate: f64, channel_count: u16) -> Result<Self, StreamError> {
        Self::new(sample_rate, channel_count, SampleRepresentation::Float32)
    }

    /// Two formats can be copied frame-for-frame iff rate and layout agree.
    pub fn is_compatible_with(&self, other: &AudioFormat) -> bool {
        (self.sample_rate - other.sample_rate).abs() < 0.01
            && self.channel_count == other.channel_count
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.sample_representation.bytes_per_sample() * self.channel_count as usize
    }

    /// Duration in milliseconds of `frames` frames at this rate.
    pub fn frames_to_ms(&self, frames: usize) -> f64 {
        frames as f64 / self.sample_rate * 1000.0
    }
}

/// The format a started capture session actually emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiatedFormat {
    pub sample_rate: f64,
    pub channels: u16,
    pub bit_depth: u16,
    pub mime_type: String,
    /// Latency of one device buffer, when the device reports its size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_latency_ms: Option<f64>,
}

impl NegotiatedFormat {
    pub fn from_format(format: &AudioFormat, device_buffer_frames: Option<u32>) -> Self {
        Self {
            sample_rate: format.sample_rate,
            channels: format.channel_count,
            bit_depth: WIRE_BIT_DEPTH,
            mime_type: PCM_MIME_TYPE.to_string(),
            buffer_latency_ms: device_buffer_frames.map(|frames| format.frames_to_ms(frames as usize)),
        }
    }
}
