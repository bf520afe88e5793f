use serde::Serialize;

use crate::models::config::{PlaybackConfiguration, RecordingConfiguration};
use crate::models::events::{ChunkEvent, ErrorEvent};
use crate::traits::permission::PermissionStatus;

/// `startRecording` request: `{sampleRate, channels, intervalMs, bufferSize, sessionOptions}`.
pub type StartRecordingRequest = RecordingConfiguration;

/// `startPlayback` request: `{sampleRate, channels}`.
pub type StartPlaybackRequest = PlaybackConfiguration;

/// Result of `requestPermission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermissionResponse {
    pub granted: bool,
    pub status: PermissionStatus,
}

impl From<PermissionStatus> for PermissionResponse {
    fn from(status: PermissionStatus) -> Self {
        Self {
            granted: status.is_granted(),
            status,
        }
    }
}

/// Events forwarded to the host, serialized as `{"event": name, "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum BridgeEvent {
    #[serde(rename = "audio://chunk")]
    AudioChunk(ChunkEvent),
    #[serde(rename = "audio://error")]
    Error(ErrorEvent),
    #[serde(rename = "audio://playback-complete")]
    PlaybackComplete,
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AudioChunk(_) => "audio://chunk",
            Self::Error(_) => "audio://error",
            Self::PlaybackComplete => "audio://playback-complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::StreamError;

    #[test]
    fn permission_response_shape() {
        let json = serde_json::to_value(PermissionResponse::from(PermissionStatus::Undetermined)).unwrap();
        assert_eq!(json["granted"], false);
        assert_eq!(json["status"], "undetermined");
    }

    #[test]
    fn error_event_is_tagged_with_its_name() {
        let event = BridgeEvent::Error(ErrorEvent::from(&StreamError::NotActive("playback")));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["payload"]["code"], "NOT_ACTIVE_ERROR");
        assert_eq!(json["payload"]["message"], "playback session not active");
    }

    #[test]
    fn playback_complete_has_no_payload() {
        let json = serde_json::to_value(BridgeEvent::PlaybackComplete).unwrap();
        assert_eq!(json["event"], "audio://playback-complete");
        assert!(json["payload"].is_null());
    }

    #[test]
    fn start_requests_deserialize_from_camel_case() {
        let recording: StartRecordingRequest = serde_json::from_str(
            r#"{"sampleRate":16000,"channels":1,"intervalMs":50,"bufferSize":256,"sessionOptions":{"mode":"voiceChat"}}"#,
        )
        .unwrap();
        assert_eq!(recording.interval_ms, 50);
        assert_eq!(recording.buffer_size, Some(256));
        assert_eq!(recording.session_options["mode"], "voiceChat");

        let playback: StartPlaybackRequest = serde_json::from_str(r#"{"sampleRate":24000}"#).unwrap();
        assert_eq!(playback.sample_rate, 24000.0);
        assert_eq!(playback.channels, 1);
    }
}
