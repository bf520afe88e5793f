use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::processing::pcm;

/// A time-sliced unit of captured audio.
///
/// `payload` is interleaved int16le PCM. Ownership moves to the event
/// consumer on emission.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub payload: Vec<u8>,
    /// Milliseconds since capture start.
    pub position_ms: u64,
    pub size_bytes: usize,
    /// Running total across the session, including this chunk.
    pub total_bytes_emitted: u64,
    pub levels: AudioLevels,
}

/// Audio level metering (RMS and peak, 0.0–1.0) over one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub rms: f32,
    pub peak: f32,
}

impl AudioLevels {
    /// Measure interleaved int16le PCM bytes.
    pub fn from_pcm16(bytes: &[u8]) -> Self {
        let count = bytes.len() / 2;
        if count == 0 {
            return Self::default();
        }
        let mut sum_sq = 0.0f64;
        let mut peak = 0.0f32;
        for pair in bytes.chunks_exact(2) {
            let v = pcm::i16_to_f32(i16::from_le_bytes([pair[0], pair[1]]));
            sum_sq += (v * v) as f64;
            peak = peak.max(v.abs());
        }
        Self {
            rms: (sum_sq / count as f64).sqrt() as f32,
            peak,
        }
    }
}

/// Diagnostics for debugging capture sessions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureDiagnostics {
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub callback_count: u64,
    pub identity_conversions: u64,
    pub requantized_conversions: u64,
    pub resampled_conversions: u64,
    pub converter_rebuilds: u64,
    pub dropped_buffers: u64,
    pub chunks_emitted: u64,
    pub bytes_emitted: u64,
    pub input_format: String,
}

/// Diagnostics for debugging playback sessions.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDiagnostics {
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub scheduled: u64,
    pub completed: u64,
    pub write_failures: u64,
    pub end_signaled: bool,
}
