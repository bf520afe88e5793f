pub mod capture_device;
pub mod permission;
pub mod playback_device;
pub mod stream_delegate;
