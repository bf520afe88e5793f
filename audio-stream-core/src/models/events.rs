use serde::Serialize;

use super::audio_models::AudioChunk;
use super::error::StreamError;
use crate::processing::pcm;

/// Payload of the chunk event delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEvent {
    /// Base64-encoded interleaved int16le PCM.
    pub data: String,
    /// Milliseconds since capture start.
    pub position: u64,
    pub chunk_size: usize,
    pub total_size: u64,
}

impl From<&AudioChunk> for ChunkEvent {
    fn from(chunk: &AudioChunk) -> Self {
        Self {
            data: pcm::encode_base64(&chunk.payload),
            position: chunk.position_ms,
            chunk_size: chunk.size_bytes,
            total_size: chunk.total_bytes_emitted,
        }
    }
}

/// Payload of the error event delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub code: String,
    pub message: String,
}

impl From<&StreamError> for ErrorEvent {
    fn from(error: &StreamError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}
