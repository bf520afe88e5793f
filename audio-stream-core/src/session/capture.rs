use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_format::{AudioFormat, NegotiatedFormat};
use crate::models::audio_models::{AudioChunk, AudioLevels, CaptureDiagnostics};
use crate::models::config::RecordingConfiguration;
use crate::models::error::StreamError;
use crate::models::state::RecordingState;
use crate::processing::chunk_accumulator::ChunkAccumulator;
use crate::processing::pcm;
use crate::processing::sample_converter::{ConversionPath, SampleConverter};
use crate::session::clock::{Clock, SystemClock};
use crate::session::dispatcher::{EventDispatcher, EventSender};
use crate::traits::capture_device::{
    CaptureDevice, CaptureRequest, DeviceErrorCallback, InputBuffer, InputBufferCallback,
};
use crate::traits::stream_delegate::StreamDelegate;

/// How long `stop` waits for an in-flight callback before abandoning the tail.
const STOP_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// How long `stop` waits for queued events to reach the delegate.
const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

enum CaptureEvent {
    Chunk(AudioChunk),
    Error(StreamError),
    DeviceFailed { epoch: u64, error: StreamError },
}

#[derive(Default)]
struct CaptureCounters {
    callbacks: AtomicU64,
    identity: AtomicU64,
    requantized: AtomicU64,
    resampled: AtomicU64,
    rebuilds: AtomicU64,
    dropped: AtomicU64,
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl CaptureCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_chunk(&self, chunk: &AudioChunk) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(chunk.size_bytes as u64, Ordering::Relaxed);
    }
}

/// Conversion and batching state of one recording.
///
/// Touched by the capture callback only, and by `stop` once callbacks have
/// been shut off.
struct CapturePipeline {
    target: AudioFormat,
    converter: Option<SampleConverter>,
    rejected_format: Option<AudioFormat>,
    accumulator: ChunkAccumulator,
    started_at: Instant,
    total_bytes_emitted: u64,
}

impl CapturePipeline {
    fn new(target: AudioFormat, interval: Duration, started_at: Instant) -> Self {
        Self {
            target,
            converter: None,
            rejected_format: None,
            accumulator: ChunkAccumulator::new(interval, started_at),
            started_at,
            total_bytes_emitted: 0,
        }
    }

    /// Convert, append, and flush if the interval has elapsed.
    fn process(
        &mut self,
        buffer: InputBuffer<'_>,
        now: Instant,
        counters: &CaptureCounters,
    ) -> Result<Option<AudioChunk>, StreamError> {
        let needs_rebuild = !self
            .converter
            .as_ref()
            .is_some_and(|c| c.accepts(&buffer.format));

        if needs_rebuild {
            // Report an unusable format once, then drop its buffers quietly.
            if self
                .rejected_format
                .is_some_and(|f| f.is_compatible_with(&buffer.format))
            {
                CaptureCounters::bump(&counters.dropped);
                return Ok(None);
            }
            match SampleConverter::new(buffer.format, self.target) {
                Ok(converter) => {
                    self.converter = Some(converter);
                    self.rejected_format = None;
                    CaptureCounters::bump(&counters.rebuilds);
                }
                Err(e) => {
                    self.converter = None;
                    self.rejected_format = Some(buffer.format);
                    CaptureCounters::bump(&counters.dropped);
                    return Err(e);
                }
            }
        }

        let Some(converter) = self.converter.as_mut() else {
            return Ok(None);
        };

        match converter.path_for(buffer.samples.representation()) {
            ConversionPath::Identity => CaptureCounters::bump(&counters.identity),
            ConversionPath::Requantize => CaptureCounters::bump(&counters.requantized),
            ConversionPath::Resample => CaptureCounters::bump(&counters.resampled),
        }

        let converted = converter.convert(buffer.samples)?;
        if !converted.is_empty() {
            self.accumulator
                .append(&pcm::i16_to_le_bytes(&converted.into_i16()));
        }

        if self.accumulator.should_flush(now) {
            return Ok(self.flush(now));
        }
        Ok(None)
    }

    /// Append what the converter still holds. Only called once callbacks
    /// have been shut off.
    fn drain_converter(&mut self) {
        let Some(converter) = self.converter.as_mut() else {
            return;
        };
        match converter.finish() {
            Ok(tail) if !tail.is_empty() => {
                self.accumulator.append(&pcm::i16_to_le_bytes(&tail.into_i16()));
            }
            Ok(_) => {}
            Err(e) => log::warn!("Dropping resampler tail: {}", e),
        }
    }

    fn flush(&mut self, now: Instant) -> Option<AudioChunk> {
        let payload = self.accumulator.take_and_reset(now);
        if payload.is_empty() {
            return None;
        }
        let size_bytes = payload.len();
        self.total_bytes_emitted += size_bytes as u64;

        Some(AudioChunk {
            levels: AudioLevels::from_pcm16(&payload),
            position_ms: now.saturating_duration_since(self.started_at).as_millis() as u64,
            size_bytes,
            total_bytes_emitted: self.total_bytes_emitted,
            payload,
        })
    }
}

/// State shared with the device callbacks of one recording.
struct CaptureWork {
    epoch: u64,
    running: AtomicBool,
    pipeline: Mutex<CapturePipeline>,
    counters: CaptureCounters,
    clock: Arc<dyn Clock>,
    events: EventSender<CaptureEvent>,
}

impl CaptureWork {
    /// Real-time path: convert and append, never wait.
    fn on_buffer(&self, buffer: InputBuffer<'_>) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        CaptureCounters::bump(&self.counters.callbacks);

        // Only `stop` contends for the pipeline.
        let Some(mut pipeline) = self.pipeline.try_lock() else {
            CaptureCounters::bump(&self.counters.dropped);
            return;
        };
        // `stop` may have taken the tail between the check above and the lock.
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        match pipeline.process(buffer, self.clock.now(), &self.counters) {
            Ok(Some(chunk)) => {
                self.counters.record_chunk(&chunk);
                self.events.send(CaptureEvent::Chunk(chunk));
            }
            Ok(None) => {}
            Err(error) => self.events.send(CaptureEvent::Error(error)),
        }
    }

    fn on_device_error(&self, error: StreamError) {
        if error.is_fatal_to_device() {
            self.running.store(false, Ordering::Release);
            self.events.send(CaptureEvent::DeviceFailed {
                epoch: self.epoch,
                error,
            });
        } else {
            self.events.send(CaptureEvent::Error(error));
        }
    }
}

struct ActiveRecording {
    work: Arc<CaptureWork>,
    negotiated: NegotiatedFormat,
    native_format: AudioFormat,
    session_id: Uuid,
    started_at: DateTime<Utc>,
}

struct CaptureControl {
    active: Option<ActiveRecording>,
    epoch: u64,
}

struct CaptureInner<D> {
    device: Mutex<D>,
    control: Mutex<CaptureControl>,
    delegate: Mutex<Option<Arc<dyn StreamDelegate>>>,
    dispatcher: EventDispatcher<CaptureEvent>,
    clock: Arc<dyn Clock>,
}

/// Microphone capture session.
///
/// Data flow:
/// ```text
/// [CaptureDevice] → [SampleConverter] → [PCM16] → [ChunkAccumulator]
///        (real-time thread)                               ↓ flush
///                                  [EventDispatcher] → [StreamDelegate]
/// ```
///
/// At most one recording is active at a time; a second `start` is rejected.
pub struct CaptureSession<D: CaptureDevice + 'static> {
    inner: Arc<CaptureInner<D>>,
}

impl<D: CaptureDevice + 'static> CaptureSession<D> {
    pub fn new(device: D) -> Result<Self, StreamError> {
        Self::with_clock(device, Arc::new(SystemClock))
    }

    pub fn with_clock(device: D, clock: Arc<dyn Clock>) -> Result<Self, StreamError> {
        let (dispatcher, slot) = EventDispatcher::spawn("audio-capture-events")?;
        let inner = Arc::new(CaptureInner {
            device: Mutex::new(device),
            control: Mutex::new(CaptureControl {
                active: None,
                epoch: 0,
            }),
            delegate: Mutex::new(None),
            dispatcher,
            clock,
        });

        let weak: Weak<CaptureInner<D>> = Arc::downgrade(&inner);
        slot.bind(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        });

        Ok(Self { inner })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn StreamDelegate>) {
        *self.inner.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> RecordingState {
        if self.inner.control.lock().active.is_some() {
            RecordingState::Active
        } else {
            RecordingState::Idle
        }
    }

    /// Format of the running recording, if any.
    pub fn negotiated_format(&self) -> Option<NegotiatedFormat> {
        self.inner
            .control
            .lock()
            .active
            .as_ref()
            .map(|a| a.negotiated.clone())
    }

    /// Counters of the running recording; empty when idle.
    pub fn diagnostics(&self) -> CaptureDiagnostics {
        let control = self.inner.control.lock();
        let Some(active) = control.active.as_ref() else {
            return CaptureDiagnostics::default();
        };
        let c = &active.work.counters;
        CaptureDiagnostics {
            session_id: Some(active.session_id.to_string()),
            started_at: Some(active.started_at),
            callback_count: c.callbacks.load(Ordering::Relaxed),
            identity_conversions: c.identity.load(Ordering::Relaxed),
            requantized_conversions: c.requantized.load(Ordering::Relaxed),
            resampled_conversions: c.resampled.load(Ordering::Relaxed),
            converter_rebuilds: c.rebuilds.load(Ordering::Relaxed),
            dropped_buffers: c.dropped.load(Ordering::Relaxed),
            chunks_emitted: c.chunks.load(Ordering::Relaxed),
            bytes_emitted: c.bytes.load(Ordering::Relaxed),
            input_format: format!(
                "{}Hz {}ch {:?}",
                active.native_format.sample_rate,
                active.native_format.channel_count,
                active.native_format.sample_representation
            ),
        }
    }

    /// Start recording. Transitions: idle → active.
    ///
    /// Returns the format chunks will actually be emitted in.
    pub fn start(&self, config: &RecordingConfiguration) -> Result<NegotiatedFormat, StreamError> {
        let mut control = self.inner.control.lock();
        if control.active.is_some() {
            return Err(StreamError::AlreadyActive("recording"));
        }
        config.validate().map_err(StreamError::Config)?;

        let request = CaptureRequest {
            sample_rate: config.sample_rate,
            channels: config.channels,
            buffer_size: config.buffer_size,
        };

        let mut device = self.inner.device.lock();
        let opened = device.open(&request).map_err(StreamError::into_device_init)?;
        log::debug!(
            "Capture device opened: {}Hz, {} channels, buffer {:?} frames",
            opened.native_format.sample_rate,
            opened.native_format.channel_count,
            opened.buffer_frames
        );

        // Channel layout is not remixed; report what the device delivers.
        let channels = opened.native_format.channel_count;
        if channels != config.channels {
            log::warn!(
                "Requested {} channels, device delivers {}; emitting {}",
                config.channels,
                channels,
                channels
            );
        }
        let target = match AudioFormat::pcm16(config.sample_rate, channels) {
            Ok(target) => target,
            Err(e) => {
                release_quietly(&mut *device);
                return Err(e);
            }
        };

        let work = Arc::new(CaptureWork {
            epoch: control.epoch,
            running: AtomicBool::new(true),
            pipeline: Mutex::new(CapturePipeline::new(
                target,
                Duration::from_millis(config.interval_ms),
                self.inner.clock.now(),
            )),
            counters: CaptureCounters::default(),
            clock: Arc::clone(&self.inner.clock),
            events: self.inner.dispatcher.sender(),
        });

        let on_buffer: InputBufferCallback = {
            let work = Arc::clone(&work);
            Arc::new(move |buffer: InputBuffer<'_>| work.on_buffer(buffer))
        };
        let on_error: DeviceErrorCallback = {
            let work = Arc::clone(&work);
            Arc::new(move |error: StreamError| work.on_device_error(error))
        };

        if let Err(e) = device.start(on_buffer, on_error) {
            work.running.store(false, Ordering::Release);
            release_quietly(&mut *device);
            return Err(e.into_device_init());
        }
        drop(device);

        let negotiated = NegotiatedFormat::from_format(&target, opened.buffer_frames);
        let session_id = Uuid::new_v4();
        log::info!(
            "Recording {} started: {}Hz, {} channels, {}ms chunks",
            session_id,
            negotiated.sample_rate,
            negotiated.channels,
            config.interval_ms
        );

        control.active = Some(ActiveRecording {
            work,
            negotiated: negotiated.clone(),
            native_format: opened.native_format,
            session_id,
            started_at: Utc::now(),
        });
        Ok(negotiated)
    }

    /// Stop recording, emitting any accumulated tail as a final chunk.
    ///
    /// Idempotent and infallible: cleanup errors are logged and the session
    /// always ends idle. Queued events reach the delegate before this returns.
    pub fn stop(&self) {
        let tail = {
            let mut control = self.inner.control.lock();
            if control.active.is_none() {
                return;
            }
            self.inner.teardown(&mut control)
        };

        if let Some(chunk) = tail {
            self.inner.dispatcher.dispatch(CaptureEvent::Chunk(chunk));
        }
        if !self.inner.dispatcher.flush(EVENT_FLUSH_TIMEOUT) {
            log::warn!("Capture events not delivered within {:?}", EVENT_FLUSH_TIMEOUT);
        }
    }
}

impl<D: CaptureDevice + 'static> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<D: CaptureDevice> CaptureInner<D> {
    fn delegate(&self) -> Option<Arc<dyn StreamDelegate>> {
        self.delegate.lock().clone()
    }

    /// Shut off callbacks, release the device and take the final chunk.
    fn teardown(&self, control: &mut CaptureControl) -> Option<AudioChunk> {
        let active = control.active.take()?;
        control.epoch += 1;

        active.work.running.store(false, Ordering::Release);
        if let Err(e) = self.device.lock().stop() {
            log::warn!("Failed to release capture device: {}", e);
        }

        let tail = match active.work.pipeline.try_lock_for(STOP_DRAIN_TIMEOUT) {
            Some(mut pipeline) => {
                pipeline.drain_converter();
                pipeline.flush(self.clock.now())
            }
            None => {
                log::warn!(
                    "Capture callback still running after {:?}; dropping tail",
                    STOP_DRAIN_TIMEOUT
                );
                None
            }
        };
        if let Some(chunk) = &tail {
            active.work.counters.record_chunk(chunk);
        }

        log::info!(
            "Recording {} stopped: {} chunks, {} bytes",
            active.session_id,
            active.work.counters.chunks.load(Ordering::Relaxed),
            active.work.counters.bytes.load(Ordering::Relaxed)
        );
        tail
    }

    fn handle_event(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Chunk(chunk) => {
                if let Some(delegate) = self.delegate() {
                    delegate.on_chunk(&chunk);
                }
            }
            CaptureEvent::Error(error) => {
                log::warn!("Capture error: {}", error);
                if let Some(delegate) = self.delegate() {
                    delegate.on_error(&error);
                }
            }
            CaptureEvent::DeviceFailed { epoch, error } => {
                log::error!("Capture device failed: {}", error);
                let tail = {
                    let mut control = self.control.lock();
                    let current = control.active.as_ref().map(|a| a.work.epoch);
                    if current == Some(epoch) {
                        self.teardown(&mut control)
                    } else {
                        None
                    }
                };
                if let Some(delegate) = self.delegate() {
                    if let Some(chunk) = &tail {
                        delegate.on_chunk(chunk);
                    }
                    delegate.on_error(&error);
                }
            }
        }
    }
}

fn release_quietly<D: CaptureDevice + ?Sized>(device: &mut D) {
    if let Err(e) = device.stop() {
        log::warn!("Failed to release capture device after failed start: {}", e);
    }
}
