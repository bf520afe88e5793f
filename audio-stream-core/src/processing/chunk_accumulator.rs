use std::time::{Duration, Instant};

/// Time-sliced accumulator for converted PCM bytes.
///
/// Signals a flush once `interval` has elapsed since the last flush; the
/// first baseline is the session start. Single writer: only the capture
/// path appends and flushes.
#[derive(Debug)]
pub struct ChunkAccumulator {
    interval: Duration,
    last_flush: Instant,
    pending: Vec<u8>,
}

impl ChunkAccumulator {
    pub fn new(interval: Duration, started_at: Instant) -> Self {
        Self {
            interval,
            last_flush: started_at,
            pending: Vec::new(),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn should_flush(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_flush) >= self.interval
    }

    /// Take everything accumulated since the last flush.
    ///
    /// Returns an empty buffer (and leaves the flush baseline untouched) if
    /// nothing was appended.
    pub fn take_and_reset(&mut self, now: Instant) -> Vec<u8> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.last_flush = now;
        std::mem::take(&mut self.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
