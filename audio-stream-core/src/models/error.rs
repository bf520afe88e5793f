use thiserror::Error;

/// Errors that can occur while streaming audio in either direction.
///
/// `code()` is the stable identifier carried by error events; `Display`
/// is the human-readable message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("microphone permission not granted: {0}")]
    Permission(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0} session already active")]
    AlreadyActive(&'static str),

    #[error("{0} session not active")]
    NotActive(&'static str),

    #[error("device initialization failed: {0}")]
    DeviceInit(String),

    #[error("device became unusable: {0}")]
    DeviceLost(String),

    #[error("malformed chunk payload: {0}")]
    Decode(String),

    #[error("unsupported conversion format: {0}")]
    Format(String),

    #[error("playback buffer write failed: {0}")]
    PlaybackWrite(String),

    #[error("prepare failed: {0}")]
    Prepare(String),
}

impl StreamError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Permission(_) => "PERMISSION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::AlreadyActive(_) => "ALREADY_ACTIVE_ERROR",
            Self::NotActive(_) => "NOT_ACTIVE_ERROR",
            // A lost device is reported in the device-init class.
            Self::DeviceInit(_) | Self::DeviceLost(_) => "DEVICE_INIT_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Format(_) => "FORMAT_ERROR",
            Self::PlaybackWrite(_) => "PLAYBACK_WRITE_ERROR",
            Self::Prepare(_) => "PREPARE_ERROR",
        }
    }

    /// Whether the error means the underlying device can no longer be used.
    pub fn is_fatal_to_device(&self) -> bool {
        matches!(self, Self::DeviceInit(_) | Self::DeviceLost(_))
    }

    /// Reclassify a device failure as `DeviceInit`, keeping the message.
    pub fn into_device_init(self) -> Self {
        match self {
            Self::DeviceInit(_) => self,
            Self::DeviceLost(message) => Self::DeviceInit(message),
            other => Self::DeviceInit(other.to_string()),
        }
    }
}
