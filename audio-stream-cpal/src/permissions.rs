//! Microphone availability check.
//!
//! cpal has no OS consent API. A reachable default input device is taken
//! as granted; hosts with a real consent prompt (mobile, sandboxed
//! desktop) should supply their own `PermissionProvider`.

use cpal::traits::HostTrait;

use audio_stream_core::{PermissionProvider, PermissionStatus};

#[derive(Debug, Default, Clone, Copy)]
pub struct CpalPermissionProvider;

impl PermissionProvider for CpalPermissionProvider {
    fn status(&self) -> PermissionStatus {
        if cpal::default_host().default_input_device().is_some() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }

    fn request(&self) -> PermissionStatus {
        // Nothing to prompt for.
        self.status()
    }
}
