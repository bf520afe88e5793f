use thiserror::Error;

use audio_stream_core::StreamError;

/// Failures talking to the host audio API.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no {0} device available")]
    NoDevice(&'static str),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("device enumeration failed: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("querying supported configs failed: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("no usable stream config: {0}")]
    NoUsableConfig(String),

    #[error("building stream failed: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("starting stream failed: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("{0} stream thread: {1}")]
    Thread(&'static str, String),

    #[error("device not opened")]
    NotOpened,
}

impl From<BackendError> for StreamError {
    fn from(err: BackendError) -> Self {
        StreamError::DeviceInit(err.to_string())
    }
}
