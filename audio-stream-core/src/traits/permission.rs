use serde::{Deserialize, Serialize};

/// Microphone permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Undetermined => "undetermined",
        }
    }
}

/// Platform capability for querying and requesting microphone access.
pub trait PermissionProvider: Send + Sync {
    /// Current status without prompting.
    fn status(&self) -> PermissionStatus;

    /// Prompt if the platform supports it and return the resulting status.
    fn request(&self) -> PermissionStatus;
}

/// Platform capability for audio-session/routing setup.
pub trait SessionConfigurator: Send + Sync {
    /// One-time session setup ahead of the first recording.
    fn prepare(&self) -> Result<(), String>;

    /// Apply the opaque `sessionOptions` of a recording request.
    fn apply_options(&self, options: &serde_json::Value) -> Result<(), String>;
}
