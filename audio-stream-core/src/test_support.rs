//! Simulated devices and a recording delegate for session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::models::audio_format::AudioFormat;
use crate::models::audio_models::AudioChunk;
use crate::models::error::StreamError;
use crate::processing::sample_converter::SampleSlice;
use crate::traits::capture_device::{
    CaptureDevice, CaptureRequest, DeviceErrorCallback, InputBuffer, InputBufferCallback, OpenedInput,
};
use crate::traits::permission::{PermissionProvider, PermissionStatus};
use crate::traits::playback_device::{BufferCompletion, PlaybackBuffer, PlaybackDevice};
use crate::traits::stream_delegate::StreamDelegate;

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

struct CaptureSim {
    format: AudioFormat,
    on_buffer: Option<InputBufferCallback>,
    on_error: Option<DeviceErrorCallback>,
    fail_next_open: Option<String>,
    opens: usize,
    stops: usize,
}

/// Input device whose buffers are pushed by the test through a [`CaptureHandle`].
pub struct SimulatedCaptureDevice {
    shared: Arc<Mutex<CaptureSim>>,
}

#[derive(Clone)]
pub struct CaptureHandle {
    shared: Arc<Mutex<CaptureSim>>,
}

impl SimulatedCaptureDevice {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            shared: Arc::new(Mutex::new(CaptureSim {
                format,
                on_buffer: None,
                on_error: None,
                fail_next_open: None,
                opens: 0,
                stops: 0,
            })),
        }
    }

    pub fn pcm16(sample_rate: f64, channels: u16) -> Self {
        Self::new(AudioFormat::pcm16(sample_rate, channels).unwrap())
    }

    pub fn float32(sample_rate: f64, channels: u16) -> Self {
        Self::new(AudioFormat::float32(sample_rate, channels).unwrap())
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl CaptureDevice for SimulatedCaptureDevice {
    fn open(&mut self, request: &CaptureRequest) -> Result<OpenedInput, StreamError> {
        let mut sim = self.shared.lock();
        if let Some(message) = sim.fail_next_open.take() {
            return Err(StreamError::DeviceInit(message));
        }
        sim.opens += 1;
        Ok(OpenedInput {
            native_format: sim.format,
            buffer_frames: request.buffer_size,
        })
    }

    fn start(&mut self, on_buffer: InputBufferCallback, on_error: DeviceErrorCallback) -> Result<(), StreamError> {
        let mut sim = self.shared.lock();
        sim.on_buffer = Some(on_buffer);
        sim.on_error = Some(on_error);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        let mut sim = self.shared.lock();
        sim.stops += 1;
        sim.on_buffer = None;
        sim.on_error = None;
        Ok(())
    }
}

impl CaptureHandle {
    fn deliver(&self, samples: SampleSlice<'_>) {
        let (callback, format) = {
            let sim = self.shared.lock();
            (sim.on_buffer.clone(), sim.format)
        };
        if let Some(callback) = callback {
            callback(InputBuffer { samples, format });
        }
    }

    pub fn push_i16(&self, samples: &[i16]) {
        self.deliver(SampleSlice::Int16(samples));
    }

    pub fn push_f32(&self, samples: &[f32]) {
        self.deliver(SampleSlice::Float32(samples));
    }

    /// Change the format reported with subsequent buffers.
    pub fn set_format(&self, format: AudioFormat) {
        self.shared.lock().format = format;
    }

    pub fn report_error(&self, error: StreamError) {
        let callback = self.shared.lock().on_error.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    pub fn fail_next_open(&self, message: &str) {
        self.shared.lock().fail_next_open = Some(message.to_string());
    }

    pub fn callback(&self) -> Option<InputBufferCallback> {
        self.shared.lock().on_buffer.clone()
    }

    pub fn open_count(&self) -> usize {
        self.shared.lock().opens
    }

    pub fn stop_count(&self) -> usize {
        self.shared.lock().stops
    }
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PlaybackSim {
    format: Option<AudioFormat>,
    on_error: Option<DeviceErrorCallback>,
    pending: VecDeque<(PlaybackBuffer, BufferCompletion)>,
    played: Vec<PlaybackBuffer>,
    fail_next_start: Option<String>,
    schedule_failures: VecDeque<StreamError>,
    complete_immediately: bool,
    keep_pending_on_stop: bool,
    starts: usize,
    stops: usize,
}

/// Output device whose buffer completions are driven by the test.
pub struct SimulatedPlaybackDevice {
    shared: Arc<Mutex<PlaybackSim>>,
}

#[derive(Clone)]
pub struct PlaybackHandle {
    shared: Arc<Mutex<PlaybackSim>>,
}

impl SimulatedPlaybackDevice {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(PlaybackSim::default())),
        }
    }

    pub fn handle(&self) -> PlaybackHandle {
        PlaybackHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl PlaybackDevice for SimulatedPlaybackDevice {
    fn start(&mut self, format: &AudioFormat, on_error: DeviceErrorCallback) -> Result<(), StreamError> {
        let mut sim = self.shared.lock();
        if let Some(message) = sim.fail_next_start.take() {
            return Err(StreamError::DeviceInit(message));
        }
        sim.starts += 1;
        sim.format = Some(*format);
        sim.on_error = Some(on_error);
        Ok(())
    }

    fn schedule(&mut self, buffer: PlaybackBuffer, on_complete: BufferCompletion) -> Result<(), StreamError> {
        {
            let mut sim = self.shared.lock();
            if let Some(error) = sim.schedule_failures.pop_front() {
                return Err(error);
            }
            if !sim.complete_immediately {
                sim.pending.push_back((buffer, on_complete));
                return Ok(());
            }
            sim.played.push(buffer);
        }
        on_complete();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        let mut sim = self.shared.lock();
        sim.stops += 1;
        sim.on_error = None;
        if !sim.keep_pending_on_stop {
            sim.pending.clear();
        }
        Ok(())
    }
}

impl PlaybackHandle {
    /// Finish the oldest queued buffer. Returns false if none is queued.
    pub fn complete_next(&self) -> bool {
        let next = self.shared.lock().pending.pop_front();
        match next {
            Some((buffer, on_complete)) => {
                self.shared.lock().played.push(buffer);
                on_complete();
                true
            }
            None => false,
        }
    }

    pub fn complete_all(&self) -> usize {
        let mut count = 0;
        while self.complete_next() {
            count += 1;
        }
        count
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn played(&self) -> Vec<PlaybackBuffer> {
        self.shared.lock().played.clone()
    }

    pub fn started_format(&self) -> Option<AudioFormat> {
        self.shared.lock().format
    }

    pub fn fail_next_start(&self, message: &str) {
        self.shared.lock().fail_next_start = Some(message.to_string());
    }

    pub fn fail_next_schedule(&self, error: StreamError) {
        self.shared.lock().schedule_failures.push_back(error);
    }

    pub fn complete_immediately(&self, enabled: bool) {
        self.shared.lock().complete_immediately = enabled;
    }

    pub fn keep_pending_on_stop(&self, enabled: bool) {
        self.shared.lock().keep_pending_on_stop = enabled;
    }

    pub fn report_error(&self, error: StreamError) {
        let callback = self.shared.lock().on_error.clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    pub fn start_count(&self) -> usize {
        self.shared.lock().starts
    }

    pub fn stop_count(&self) -> usize {
        self.shared.lock().stops
    }
}

// ---------------------------------------------------------------------------
// Permission
// ---------------------------------------------------------------------------

/// Permission provider with a fixed answer to `request`.
pub struct FixedPermission {
    status: Mutex<PermissionStatus>,
    grant_on_request: bool,
    requests: AtomicUsize,
}

impl FixedPermission {
    pub fn new(status: PermissionStatus, grant_on_request: bool) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            grant_on_request,
            requests: AtomicUsize::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for FixedPermission {
    fn status(&self) -> PermissionStatus {
        *self.status.lock()
    }

    fn request(&self) -> PermissionStatus {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.lock();
        if *status == PermissionStatus::Undetermined {
            *status = if self.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        *status
    }
}

// ---------------------------------------------------------------------------
// Delegate
// ---------------------------------------------------------------------------

/// Records every delegate call.
pub struct RecordingDelegate {
    chunks: Mutex<Vec<AudioChunk>>,
    errors: Mutex<Vec<StreamError>>,
    completions: AtomicUsize,
    completion_tx: Sender<()>,
    completion_rx: Receiver<()>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        let (completion_tx, completion_rx) = unbounded();
        Arc::new(Self {
            chunks: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            completions: AtomicUsize::new(0),
            completion_tx,
            completion_rx,
        })
    }

    pub fn chunks(&self) -> Vec<AudioChunk> {
        self.chunks.lock().clone()
    }

    pub fn errors(&self) -> Vec<StreamError> {
        self.errors.lock().clone()
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        self.completion_rx.recv_timeout(timeout).is_ok()
    }
}

impl StreamDelegate for RecordingDelegate {
    fn on_chunk(&self, chunk: &AudioChunk) {
        self.chunks.lock().push(chunk.clone());
    }

    fn on_error(&self, error: &StreamError) {
        self.errors.lock().push(error.clone());
    }

    fn on_playback_complete(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        let _ = self.completion_tx.send(());
    }
}
