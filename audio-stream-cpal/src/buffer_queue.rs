//! Turns scheduled playback buffers into a continuous sample stream.
//!
//! The output callback pulls samples with [`ScheduledBufferQueue::fill`];
//! each buffer's completion runs once its last sample has been written.

use std::collections::VecDeque;

use parking_lot::Mutex;

use audio_stream_core::{BufferCompletion, PlaybackBuffer};

struct Scheduled {
    samples: Vec<f32>,
    cursor: usize,
    on_complete: BufferCompletion,
}

#[derive(Default)]
pub struct ScheduledBufferQueue {
    buffers: Mutex<VecDeque<Scheduled>>,
}

impl ScheduledBufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a buffer behind everything already scheduled.
    pub fn push(&self, buffer: PlaybackBuffer, on_complete: BufferCompletion) {
        self.buffers.lock().push_back(Scheduled {
            samples: buffer.samples,
            cursor: 0,
            on_complete,
        });
    }

    /// Fill `out` from the queue, padding with `silence`.
    ///
    /// Returns the number of samples taken from scheduled buffers. Runs on
    /// the output callback thread: if the queue is momentarily locked the
    /// whole slice is silence. Completions run after the lock is released.
    pub fn fill<T: Copy>(&self, out: &mut [T], silence: T, convert: impl Fn(f32) -> T) -> usize {
        let mut finished = Vec::new();
        let written = match self.buffers.try_lock() {
            Some(mut buffers) => {
                let mut written = 0;
                while let Some(front) = buffers.front_mut() {
                    let remaining = &front.samples[front.cursor..];
                    let n = remaining.len().min(out.len() - written);
                    for (dst, &src) in out[written..written + n].iter_mut().zip(remaining) {
                        *dst = convert(src);
                    }
                    written += n;
                    front.cursor += n;

                    if front.cursor < front.samples.len() {
                        break;
                    }
                    if let Some(done) = buffers.pop_front() {
                        finished.push(done.on_complete);
                    }
                }
                written
            }
            None => 0,
        };

        for sample in &mut out[written..] {
            *sample = silence;
        }
        for on_complete in finished {
            on_complete();
        }
        written
    }

    /// Drop every queued buffer without running its completion.
    pub fn clear(&self) -> usize {
        let mut buffers = self.buffers.lock();
        let dropped = buffers.len();
        buffers.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }
}
