use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::PlaybackDiagnostics;
use crate::models::config::PlaybackConfiguration;
use crate::models::error::StreamError;
use crate::models::state::PlaybackState;
use crate::session::dispatcher::{EventDispatcher, EventSender};
use crate::session::playback_queue::PlaybackQueue;
use crate::traits::capture_device::DeviceErrorCallback;
use crate::traits::playback_device::{BufferCompletion, PlaybackBuffer, PlaybackDevice};
use crate::traits::stream_delegate::StreamDelegate;

const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

enum PlaybackEvent {
    Drained { epoch: u64 },
    Error(StreamError),
    DeviceFailed { epoch: u64, error: StreamError },
}

struct ActivePlayback {
    queue: Arc<PlaybackQueue>,
    session_id: Uuid,
    started_at: DateTime<Utc>,
    write_failures: u64,
}

struct PlaybackControl {
    state: PlaybackState,
    /// Bumped whenever a playback lifecycle ends; stale device events carry
    /// an older value and are ignored.
    epoch: u64,
    active: Option<ActivePlayback>,
}

struct PlaybackInner<D> {
    device: Mutex<D>,
    control: Mutex<PlaybackControl>,
    delegate: Mutex<Option<Arc<dyn StreamDelegate>>>,
    dispatcher: EventDispatcher<PlaybackEvent>,
}

/// Streaming playback of base64 PCM chunks.
///
/// ```text
/// feed(base64) → [PlaybackQueue::decode] → [PlaybackDevice::schedule]
///                                                  ↓ per-buffer completion
///                         [EventDispatcher] ← drained? → on_playback_complete
/// ```
///
/// States: idle → active → draining → complete → idle. Completion fires
/// exactly once per lifecycle, and never for one ended by `stop`.
pub struct PlaybackSession<D: PlaybackDevice + 'static> {
    inner: Arc<PlaybackInner<D>>,
}

impl<D: PlaybackDevice + 'static> PlaybackSession<D> {
    pub fn new(device: D) -> Result<Self, StreamError> {
        let (dispatcher, slot) = EventDispatcher::spawn("audio-playback-events")?;
        let inner = Arc::new(PlaybackInner {
            device: Mutex::new(device),
            control: Mutex::new(PlaybackControl {
                state: PlaybackState::Idle,
                epoch: 0,
                active: None,
            }),
            delegate: Mutex::new(None),
            dispatcher,
        });

        let weak: Weak<PlaybackInner<D>> = Arc::downgrade(&inner);
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

    pub fn state(&self) -> PlaybackState {
        self.inner.control.lock().state
    }

    pub fn diagnostics(&self) -> PlaybackDiagnostics {
        let control = self.inner.control.lock();
        match control.active.as_ref() {
            Some(active) => PlaybackDiagnostics {
                session_id: Some(active.session_id.to_string()),
                started_at: Some(active.started_at),
                scheduled: active.queue.scheduled(),
                completed: active.queue.completed(),
                write_failures: active.write_failures,
                end_signaled: active.queue.end_signaled(),
            },
            None => PlaybackDiagnostics::default(),
        }
    }

    /// Start a playback lifecycle, discarding any one still running.
    pub fn start(&self, config: &PlaybackConfiguration) -> Result<(), StreamError> {
        config.validate().map_err(StreamError::Config)?;
        let format = config.output_format()?;

        let mut control = self.inner.control.lock();
        if control.active.is_some() {
            log::info!("Discarding unfinished playback for a new start");
            self.inner.release(&mut control);
        }
        control.epoch += 1;
        let epoch = control.epoch;

        let on_error: DeviceErrorCallback = {
            let events = self.inner.dispatcher.sender();
            Arc::new(move |error: StreamError| {
                if error.is_fatal_to_device() {
                    events.send(PlaybackEvent::DeviceFailed { epoch, error });
                } else {
                    events.send(PlaybackEvent::Error(error));
                }
            })
        };

        self.inner
            .device
            .lock()
            .start(&format, on_error)
            .map_err(StreamError::into_device_init)?;

        let session_id = Uuid::new_v4();
        log::info!(
            "Playback {} started: {}Hz, {} channels",
            session_id,
            format.sample_rate,
            format.channel_count
        );

        control.active = Some(ActivePlayback {
            queue: Arc::new(PlaybackQueue::new(format)),
            session_id,
            started_at: Utc::now(),
            write_failures: 0,
        });
        control.state = PlaybackState::Active;
        Ok(())
    }

    /// Decode and schedule one chunk. Returns once the buffer is queued.
    ///
    /// A device write failure does not fail the call: it is reported as an
    /// error event and the session keeps going, unless the device itself
    /// is gone. Chunks arriving after the drain are `NotActive`.
    pub fn feed(&self, payload: &str) -> Result<(), StreamError> {
        let mut control = self.inner.control.lock();
        if !control.state.accepts_chunks() {
            return Err(StreamError::NotActive("playback"));
        }
        let epoch = control.epoch;
        let Some(active) = control.active.as_mut() else {
            return Err(StreamError::NotActive("playback"));
        };

        let samples = active.queue.decode(payload)?;
        // Refused once the last completion has drained the queue, even if
        // the completion event has not been handled yet.
        let index = active.queue.mark_scheduled()?;

        let on_complete: BufferCompletion = {
            let queue = Arc::clone(&active.queue);
            let events: EventSender<PlaybackEvent> = self.inner.dispatcher.sender();
            Box::new(move || {
                if queue.mark_completed() {
                    events.send(PlaybackEvent::Drained { epoch });
                }
            })
        };

        let result = self
            .inner
            .device
            .lock()
            .schedule(PlaybackBuffer { index, samples }, on_complete);

        match result {
            Ok(()) => Ok(()),
            Err(error) if error.is_fatal_to_device() => {
                log::error!("Playback device failed while scheduling: {}", error);
                self.inner.release(&mut control);
                self.inner.dispatcher.dispatch(PlaybackEvent::Error(error));
                Ok(())
            }
            Err(error) => {
                log::warn!("Playback buffer {} not scheduled: {}", index, error);
                active.write_failures += 1;
                if active.queue.retract_scheduled() {
                    self.inner.dispatcher.dispatch(PlaybackEvent::Drained { epoch });
                }
                let error = match error {
                    StreamError::PlaybackWrite(_) => error,
                    other => StreamError::PlaybackWrite(other.to_string()),
                };
                self.inner.dispatcher.dispatch(PlaybackEvent::Error(error));
                Ok(())
            }
        }
    }

    /// Signal that no more chunks follow. Idempotent; a no-op when idle.
    pub fn end(&self) {
        let mut control = self.inner.control.lock();
        if !control.state.accepts_chunks() {
            return;
        }
        control.state = PlaybackState::Draining;
        let epoch = control.epoch;
        if let Some(active) = control.active.as_ref() {
            if active.queue.signal_end() {
                self.inner.dispatcher.dispatch(PlaybackEvent::Drained { epoch });
            }
        }
    }

    /// Discard the running lifecycle without a completion event. Idempotent.
    pub fn stop(&self) {
        {
            let mut control = self.inner.control.lock();
            if control.active.is_none() {
                return;
            }
            self.inner.release(&mut control);
        }
        if !self.inner.dispatcher.flush(EVENT_FLUSH_TIMEOUT) {
            log::warn!("Playback events not delivered within {:?}", EVENT_FLUSH_TIMEOUT);
        }
    }
}

impl<D: PlaybackDevice + 'static> Drop for PlaybackSession<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<D: PlaybackDevice> PlaybackInner<D> {
    fn delegate(&self) -> Option<Arc<dyn StreamDelegate>> {
        self.delegate.lock().clone()
    }

    /// Tear down the device and return to idle.
    fn release(&self, control: &mut PlaybackControl) {
        if let Some(active) = control.active.take() {
            if let Err(e) = self.device.lock().stop() {
                log::warn!("Failed to release playback device: {}", e);
            }
            log::info!(
                "Playback {} released: {}/{} buffers completed",
                active.session_id,
                active.queue.completed(),
                active.queue.scheduled()
            );
        }
        control.epoch += 1;
        control.state = PlaybackState::Idle;
    }

    fn handle_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Drained { epoch } => self.finish_drain(epoch),
            PlaybackEvent::Error(error) => {
                if let Some(delegate) = self.delegate() {
                    delegate.on_error(&error);
                }
            }
            PlaybackEvent::DeviceFailed { epoch, error } => {
                {
                    let mut control = self.control.lock();
                    if control.epoch != epoch || control.active.is_none() {
                        log::debug!("Ignoring failure of a released playback device: {}", error);
                        return;
                    }
                    log::error!("Playback device failed: {}", error);
                    self.release(&mut control);
                }
                if let Some(delegate) = self.delegate() {
                    delegate.on_error(&error);
                }
            }
        }
    }

    fn finish_drain(&self, epoch: u64) {
        {
            let mut control = self.control.lock();
            if control.epoch != epoch || !control.state.accepts_chunks() {
                return;
            }
            control.state = PlaybackState::Complete;
            self.release(&mut control);
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_playback_complete();
        }
    }
}
