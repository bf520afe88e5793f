use crate::models::audio_models::AudioChunk;
use crate::models::error::StreamError;

/// Event delegate for streaming session notifications.
///
/// All methods are called from the session's event thread, never from a
/// hardware callback. Implementations should marshal to the UI thread if
/// needed.
pub trait StreamDelegate: Send + Sync {
    /// Called for every chunk a capture session emits.
    fn on_chunk(&self, chunk: &AudioChunk);

    /// Called for non-fatal per-buffer failures and for device loss.
    fn on_error(&self, error: &StreamError);

    /// Called once when a playback session has fully drained.
    fn on_playback_complete(&self);
}
