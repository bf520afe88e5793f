pub mod capture;
pub mod clock;
pub(crate) mod dispatcher;
pub mod playback;
pub mod playback_queue;
