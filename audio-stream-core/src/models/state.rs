/// Capture session state machine.
///
/// ```text
/// idle → active → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Active,
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Playback session state machine.
///
/// ```text
/// idle → active → draining → complete → idle
///          ↓          ↓
///        (stop: discard) → idle
/// ```
///
/// `Complete` is transient: a drained session passes through it on the way
/// back to `Idle` while the output device is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Active,
    Draining,
    Complete,
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether `feed` is accepted in this state.
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, Self::Active | Self::Draining)
    }
}
