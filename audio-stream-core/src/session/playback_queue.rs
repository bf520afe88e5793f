use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::error::StreamError;
use crate::processing::pcm;

#[derive(Debug, Default)]
struct DrainCounters {
    scheduled: u64,
    completed: u64,
    end_signaled: bool,
    drained: bool,
}

impl DrainCounters {
    /// Report the drain condition once, the first time it holds.
    fn try_drain(&mut self) -> bool {
        if self.drained || !self.end_signaled {
            return false;
        }
        if self.scheduled == 0 || self.completed < self.scheduled {
            return false;
        }
        self.drained = true;
        true
    }
}

/// Decodes inbound chunks and tracks scheduled vs. completed buffers.
///
/// Counters are updated from the command thread (`mark_scheduled`,
/// `signal_end`) and from device completion callbacks (`mark_completed`)
/// concurrently. The drain condition
/// `end_signaled && scheduled > 0 && completed >= scheduled` is evaluated
/// under the same lock that admits new buffers: it is reported by exactly
/// one call, and once reported no further buffer can be scheduled.
#[derive(Debug)]
pub struct PlaybackQueue {
    format: AudioFormat,
    counters: Mutex<DrainCounters>,
}

impl PlaybackQueue {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            counters: Mutex::new(DrainCounters::default()),
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Decode a base64 int16le chunk into normalized interleaved floats.
    ///
    /// Counters are untouched; a rejected payload never counts as scheduled.
    pub fn decode(&self, payload: &str) -> Result<Vec<f32>, StreamError> {
        let samples = pcm::decode_chunk_to_f32(payload)?;
        let channels = self.format.channel_count as usize;
        if samples.len() % channels != 0 {
            return Err(StreamError::Decode(format!(
                "{} samples do not divide into {}-channel frames",
                samples.len(),
                channels
            )));
        }
        Ok(samples)
    }

    /// Count a buffer about to be handed to the device. Returns its index.
    ///
    /// Fails with `NotActive` once the queue has drained.
    pub fn mark_scheduled(&self) -> Result<u64, StreamError> {
        let mut counters = self.counters.lock();
        if counters.drained {
            return Err(StreamError::NotActive("playback"));
        }
        let index = counters.scheduled;
        counters.scheduled += 1;
        Ok(index)
    }

    /// Undo `mark_scheduled` for a buffer the device refused.
    ///
    /// Returns true if this made the queue drain.
    pub fn retract_scheduled(&self) -> bool {
        let mut counters = self.counters.lock();
        counters.scheduled = counters.scheduled.saturating_sub(1);
        counters.try_drain()
    }

    /// Record one device completion. Returns true if this made the queue drain.
    pub fn mark_completed(&self) -> bool {
        let mut counters = self.counters.lock();
        counters.completed += 1;
        counters.try_drain()
    }

    /// Record that no more chunks will follow. Returns true if this made the
    /// queue drain.
    pub fn signal_end(&self) -> bool {
        let mut counters = self.counters.lock();
        counters.end_signaled = true;
        counters.try_drain()
    }

    pub fn scheduled(&self) -> u64 {
        self.counters.lock().scheduled
    }

    pub fn completed(&self) -> u64 {
        self.counters.lock().completed
    }

    pub fn end_signaled(&self) -> bool {
        self.counters.lock().end_signaled
    }

    pub fn is_drained(&self) -> bool {
        self.counters.lock().drained
    }
}
