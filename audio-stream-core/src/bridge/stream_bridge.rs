use std::sync::Arc;

use crate::bridge::messages::{BridgeEvent, PermissionResponse, StartPlaybackRequest, StartRecordingRequest};
use crate::models::audio_format::NegotiatedFormat;
use crate::models::audio_models::{AudioChunk, CaptureDiagnostics, PlaybackDiagnostics};
use crate::models::error::StreamError;
use crate::models::events::{ChunkEvent, ErrorEvent};
use crate::models::state::{PlaybackState, RecordingState};
use crate::session::capture::CaptureSession;
use crate::session::playback::PlaybackSession;
use crate::traits::capture_device::CaptureDevice;
use crate::traits::permission::{PermissionProvider, PermissionStatus, SessionConfigurator};
use crate::traits::playback_device::PlaybackDevice;
use crate::traits::stream_delegate::StreamDelegate;

/// Host-side receiver of bridge events.
///
/// Called from session event threads; forward or enqueue, don't block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BridgeEvent);
}

/// StreamDelegate that forwards session events to an [`EventSink`].
struct SinkDelegate {
    sink: Arc<dyn EventSink>,
}

impl StreamDelegate for SinkDelegate {
    fn on_chunk(&self, chunk: &AudioChunk) {
        self.sink.emit(BridgeEvent::AudioChunk(ChunkEvent::from(chunk)));
    }

    fn on_error(&self, error: &StreamError) {
        self.sink.emit(BridgeEvent::Error(ErrorEvent::from(error)));
    }

    fn on_playback_complete(&self) {
        self.sink.emit(BridgeEvent::PlaybackComplete);
    }
}

/// The host-facing surface: one capture session and one playback session,
/// owned for the lifetime of the host.
pub struct AudioStreamBridge<C: CaptureDevice + 'static, P: PlaybackDevice + 'static> {
    capture: CaptureSession<C>,
    playback: PlaybackSession<P>,
    permissions: Arc<dyn PermissionProvider>,
    configurator: Option<Arc<dyn SessionConfigurator>>,
}

impl<C: CaptureDevice + 'static, P: PlaybackDevice + 'static> AudioStreamBridge<C, P> {
    pub fn new(
        capture_device: C,
        playback_device: P,
        permissions: Arc<dyn PermissionProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, StreamError> {
        Ok(Self::from_sessions(
            CaptureSession::new(capture_device)?,
            PlaybackSession::new(playback_device)?,
            permissions,
            sink,
        ))
    }

    /// Wrap sessions built elsewhere (e.g. with a custom clock).
    pub fn from_sessions(
        capture: CaptureSession<C>,
        playback: PlaybackSession<P>,
        permissions: Arc<dyn PermissionProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let delegate = Arc::new(SinkDelegate { sink });
        capture.set_delegate(delegate.clone());
        playback.set_delegate(delegate);
        Self {
            capture,
            playback,
            permissions,
            configurator: None,
        }
    }

    pub fn with_configurator(mut self, configurator: Arc<dyn SessionConfigurator>) -> Self {
        self.configurator = Some(configurator);
        self
    }

    /// Query microphone access, prompting only while it is undetermined.
    pub fn request_permission(&self) -> PermissionResponse {
        let mut status = self.permissions.status();
        if status == PermissionStatus::Undetermined {
            status = self.permissions.request();
        }
        log::info!("Microphone permission: {}", status.as_str());
        PermissionResponse::from(status)
    }

    /// One-time audio session setup. Does nothing without permission.
    pub fn prepare(&self) -> Result<(), StreamError> {
        let status = self.permissions.status();
        if !status.is_granted() {
            log::debug!("Skipping prepare: microphone permission {}", status.as_str());
            return Ok(());
        }
        if let Some(configurator) = &self.configurator {
            configurator.prepare().map_err(StreamError::Prepare)?;
        }
        Ok(())
    }

    pub fn start_recording(&self, request: &StartRecordingRequest) -> Result<NegotiatedFormat, StreamError> {
        let status = self.permissions.status();
        if !status.is_granted() {
            return Err(StreamError::Permission(format!("microphone access is {}", status.as_str())));
        }
        // Checked here as well so a duplicate start leaves session options alone.
        if self.capture.state().is_active() {
            return Err(StreamError::AlreadyActive("recording"));
        }
        if let Some(configurator) = &self.configurator {
            if !request.session_options.is_null() {
                configurator
                    .apply_options(&request.session_options)
                    .map_err(StreamError::Config)?;
            }
        }
        self.capture.start(request)
    }

    pub fn stop_recording(&self) {
        self.capture.stop();
    }

    pub fn start_playback(&self, request: &StartPlaybackRequest) -> Result<(), StreamError> {
        self.playback.start(request)
    }

    pub fn play_chunk(&self, payload: &str) -> Result<(), StreamError> {
        self.playback.feed(payload)
    }

    pub fn end_playback(&self) {
        self.playback.end();
    }

    pub fn stop_playback(&self) {
        self.playback.stop();
    }

    /// Stop both directions. Used by hosts on teardown.
    pub fn shutdown(&self) {
        self.capture.stop();
        self.playback.stop();
        log::info!("Audio stream bridge shut down");
    }

    pub fn recording_state(&self) -> RecordingState {
        self.capture.state()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn capture_diagnostics(&self) -> CaptureDiagnostics {
        self.capture.diagnostics()
    }

    pub fn playback_diagnostics(&self) -> PlaybackDiagnostics {
        self.playback.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crossbeam_channel::{unbounded, Receiver, Sender};
    use parking_lot::Mutex;

    use crate::models::config::PlaybackConfiguration;
    use crate::processing::pcm;
    use crate::session::clock::ManualClock;
    use crate::test_support::{
        CaptureHandle, FixedPermission, PlaybackHandle, SimulatedCaptureDevice, SimulatedPlaybackDevice,
    };

    struct ChannelSink {
        tx: Sender<BridgeEvent>,
    }

    impl EventSink for ChannelSink {
        fn emit(&self, event: BridgeEvent) {
            let _ = self.tx.send(event);
        }
    }

    #[derive(Default)]
    struct Configurator {
        prepared: Mutex<usize>,
        applied: Mutex<Vec<serde_json::Value>>,
        fail: bool,
    }

    impl SessionConfigurator for Configurator {
        fn prepare(&self) -> Result<(), String> {
            if self.fail {
                return Err("audio session unavailable".into());
            }
            *self.prepared.lock() += 1;
            Ok(())
        }

        fn apply_options(&self, options: &serde_json::Value) -> Result<(), String> {
            if self.fail {
                return Err("unsupported category".into());
            }
            self.applied.lock().push(options.clone());
            Ok(())
        }
    }

    struct Harness {
        bridge: AudioStreamBridge<SimulatedCaptureDevice, SimulatedPlaybackDevice>,
        input: CaptureHandle,
        output: PlaybackHandle,
        clock: Arc<ManualClock>,
        events: Receiver<BridgeEvent>,
    }

    impl Harness {
        fn new(status: PermissionStatus) -> Self {
            Self::with_permission(FixedPermission::new(status, true))
        }

        fn with_permission(permissions: Arc<FixedPermission>) -> Self {
            let capture_device = SimulatedCaptureDevice::pcm16(16000.0, 1);
            let playback_device = SimulatedPlaybackDevice::new();
            let input = capture_device.handle();
            let output = playback_device.handle();
            let clock = Arc::new(ManualClock::new());
            let (tx, events) = unbounded();

            let bridge = AudioStreamBridge::from_sessions(
                CaptureSession::with_clock(capture_device, clock.clone()).unwrap(),
                PlaybackSession::new(playback_device).unwrap(),
                permissions,
                Arc::new(ChannelSink { tx }),
            );
            Self {
                bridge,
                input,
                output,
                clock,
                events,
            }
        }

        fn next_event(&self) -> Option<BridgeEvent> {
            self.events.recv_timeout(Duration::from_secs(1)).ok()
        }
    }

    fn recording(interval_ms: u64) -> StartRecordingRequest {
        StartRecordingRequest {
            sample_rate: 16000.0,
            channels: 1,
            interval_ms,
            ..Default::default()
        }
    }

    #[test]
    fn request_permission_prompts_once() {
        let permissions = FixedPermission::new(PermissionStatus::Undetermined, true);
        let harness = Harness::with_permission(permissions.clone());

        let first = harness.bridge.request_permission();
        assert!(first.granted);
        assert_eq!(first.status, PermissionStatus::Granted);

        harness.bridge.request_permission();
        assert_eq!(permissions.request_count(), 1);
    }

    #[test]
    fn denied_permission_resolves_without_error() {
        let harness = Harness::new(PermissionStatus::Denied);
        let response = harness.bridge.request_permission();
        assert!(!response.granted);
        assert_eq!(response.status, PermissionStatus::Denied);
    }

    #[test]
    fn recording_requires_permission() {
        let harness = Harness::new(PermissionStatus::Undetermined);

        let err = harness.bridge.start_recording(&recording(50)).unwrap_err();
        assert_eq!(err.code(), "PERMISSION_ERROR");
        assert_eq!(harness.input.open_count(), 0);
        assert_eq!(harness.bridge.recording_state(), RecordingState::Idle);
    }

    #[test]
    fn prepare_is_a_no_op_without_permission() {
        let configurator = Arc::new(Configurator::default());
        let harness = Harness::new(PermissionStatus::Denied);
        let bridge = harness.bridge.with_configurator(configurator.clone());

        bridge.prepare().unwrap();
        assert_eq!(*configurator.prepared.lock(), 0);
    }

    #[test]
    fn prepare_failure_is_a_prepare_error() {
        let configurator = Arc::new(Configurator {
            fail: true,
            ..Default::default()
        });
        let harness = Harness::new(PermissionStatus::Granted);
        let bridge = harness.bridge.with_configurator(configurator);

        let err = bridge.prepare().unwrap_err();
        assert_eq!(err.code(), "PREPARE_ERROR");
    }

    #[test]
    fn session_options_reach_the_configurator() {
        let configurator = Arc::new(Configurator::default());
        let harness = Harness::new(PermissionStatus::Granted);
        let bridge = harness.bridge.with_configurator(configurator.clone());

        bridge.prepare().unwrap();
        let request = StartRecordingRequest {
            session_options: serde_json::json!({"mode": "voiceChat"}),
            ..recording(50)
        };
        bridge.start_recording(&request).unwrap();

        assert_eq!(*configurator.prepared.lock(), 1);
        assert_eq!(configurator.applied.lock().as_slice(), &[serde_json::json!({"mode": "voiceChat"})]);

        // Duplicate start is rejected before options are touched again.
        let err = bridge.start_recording(&request).unwrap_err();
        assert_eq!(err.code(), "ALREADY_ACTIVE_ERROR");
        assert_eq!(configurator.applied.lock().len(), 1);
    }

    #[test]
    fn rejected_session_options_do_not_start_recording() {
        let configurator = Arc::new(Configurator {
            fail: true,
            ..Default::default()
        });
        let harness = Harness::new(PermissionStatus::Granted);
        let input = harness.input.clone();
        let bridge = harness.bridge.with_configurator(configurator);

        let request = StartRecordingRequest {
            session_options: serde_json::json!({"mode": "karaoke"}),
            ..recording(50)
        };
        let err = bridge.start_recording(&request).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(input.open_count(), 0);
    }

    #[test]
    fn recorded_chunks_reach_the_sink_as_wire_events() {
        let harness = Harness::new(PermissionStatus::Granted);
        let negotiated = harness.bridge.start_recording(&recording(50)).unwrap();
        assert_eq!(negotiated.mime_type, "audio/pcm");

        let samples: Vec<i16> = (0..800).map(|i| i as i16).collect();
        harness.clock.advance(Duration::from_millis(50));
        harness.input.push_i16(&samples);
        harness.bridge.stop_recording();

        match harness.next_event() {
            Some(BridgeEvent::AudioChunk(event)) => {
                assert_eq!(event.chunk_size, 1600);
                assert_eq!(event.total_size, 1600);
                assert_eq!(event.position, 50);
                let decoded = pcm::le_bytes_to_i16(&pcm::decode_base64(&event.data).unwrap()).unwrap();
                assert_eq!(decoded, samples);
            }
            other => panic!("expected chunk event, got {:?}", other),
        }
        assert_eq!(harness.bridge.recording_state(), RecordingState::Idle);
    }

    #[test]
    fn playback_round_trip_completes_once() {
        let harness = Harness::new(PermissionStatus::Granted);
        harness
            .bridge
            .start_playback(&PlaybackConfiguration::default())
            .unwrap();

        for i in 0..3i16 {
            let payload = pcm::encode_base64(&pcm::i16_to_le_bytes(&[i; 480]));
            harness.bridge.play_chunk(&payload).unwrap();
        }
        harness.bridge.end_playback();
        harness.bridge.end_playback();
        assert_eq!(harness.output.complete_all(), 3);

        assert_eq!(harness.next_event(), Some(BridgeEvent::PlaybackComplete));
        assert!(harness.events.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(harness.bridge.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn play_chunk_errors_surface_synchronously() {
        let harness = Harness::new(PermissionStatus::Granted);
        assert_eq!(harness.bridge.play_chunk("AAAA").unwrap_err().code(), "NOT_ACTIVE_ERROR");

        harness
            .bridge
            .start_playback(&PlaybackConfiguration::default())
            .unwrap();
        assert_eq!(harness.bridge.play_chunk("@@@").unwrap_err().code(), "DECODE_ERROR");
        assert_eq!(harness.bridge.playback_diagnostics().scheduled, 0);
    }

    #[test]
    fn write_failures_become_error_events() {
        let harness = Harness::new(PermissionStatus::Granted);
        harness
            .bridge
            .start_playback(&PlaybackConfiguration::default())
            .unwrap();
        harness
            .output
            .fail_next_schedule(StreamError::PlaybackWrite("buffer rejected".into()));

        harness.bridge.play_chunk("AAAAAA==").unwrap();

        match harness.next_event() {
            Some(BridgeEvent::Error(event)) => assert_eq!(event.code, "PLAYBACK_WRITE_ERROR"),
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[test]
    fn shutdown_stops_both_directions() {
        let harness = Harness::new(PermissionStatus::Granted);
        harness.bridge.start_recording(&recording(1000)).unwrap();
        harness
            .bridge
            .start_playback(&PlaybackConfiguration::default())
            .unwrap();
        harness.clock.advance(Duration::from_millis(5));
        harness.input.push_i16(&[9; 80]);

        harness.bridge.shutdown();
        harness.bridge.stop_recording();
        harness.bridge.stop_playback();

        assert_eq!(harness.bridge.recording_state(), RecordingState::Idle);
        assert_eq!(harness.bridge.playback_state(), PlaybackState::Idle);
        assert!(matches!(harness.next_event(), Some(BridgeEvent::AudioChunk(_))));
        assert!(harness.events.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(harness.output.stop_count(), 1);
    }
}
