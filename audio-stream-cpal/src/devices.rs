//! Device lookup and stream-config negotiation on the default cpal host.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange};

use audio_stream_core::SampleRepresentation;

use crate::error::BackendError;

/// Which side of the host a device is looked up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// Resolve a device by name, or the host default when `name` is `None`.
pub fn find_device(direction: Direction, name: Option<&str>) -> Result<cpal::Device, BackendError> {
    let host = cpal::default_host();
    let Some(name) = name else {
        let device = match direction {
            Direction::Input => host.default_input_device(),
            Direction::Output => host.default_output_device(),
        };
        return device.ok_or(BackendError::NoDevice(direction.label()));
    };

    let mut devices = match direction {
        Direction::Input => host.input_devices()?,
        Direction::Output => host.output_devices()?,
    };
    devices
        .find(|d| d.name().ok().as_deref() == Some(name))
        .ok_or_else(|| BackendError::DeviceNotFound(name.to_string()))
}

/// Names of the devices available in `direction`.
pub fn list_devices(direction: Direction) -> Result<Vec<String>, BackendError> {
    let host = cpal::default_host();
    let devices = match direction {
        Direction::Input => host.input_devices()?,
        Direction::Output => host.output_devices()?,
    };
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// A stream config the device agreed to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChosenConfig {
    pub config: StreamConfig,
    pub representation: SampleRepresentation,
    /// Buffer size in frames when pinned to a fixed value.
    pub buffer_frames: Option<u32>,
}

fn representation_of(format: SampleFormat) -> Option<SampleRepresentation> {
    match format {
        SampleFormat::I16 => Some(SampleRepresentation::Int16le),
        SampleFormat::F32 => Some(SampleRepresentation::Float32),
        _ => None,
    }
}

/// Pick the closest supported config to the request.
///
/// Ranking: matching channel count, then a range containing the requested
/// rate, then `preferred` sample representation. The rate is clamped into
/// the chosen range. With `exact` set, only configs matching both rate and
/// channels qualify.
pub fn choose_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
    channels: u16,
    buffer_size: Option<u32>,
    preferred: SampleRepresentation,
    exact: bool,
) -> Option<ChosenConfig> {
    let rank = |range: &SupportedStreamConfigRange, representation: SampleRepresentation| {
        let channels_match = range.channels() == channels;
        let rate_match = (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&sample_rate);
        (channels_match, rate_match, representation == preferred)
    };

    let (range, representation) = ranges
        .into_iter()
        .filter_map(|range| representation_of(range.sample_format()).map(|r| (range, r)))
        .filter(|(range, r)| !exact || matches!(rank(range, *r), (true, true, _)))
        .max_by_key(|(range, r)| rank(range, *r))?;

    let rate = sample_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    let (buffer_size, buffer_frames) = match (buffer_size, range.buffer_size()) {
        (Some(requested), SupportedBufferSize::Range { min, max }) => {
            let frames = requested.clamp(*min, *max);
            (BufferSize::Fixed(frames), Some(frames))
        }
        _ => (BufferSize::Default, None),
    };

    Some(ChosenConfig {
        config: StreamConfig {
            channels: range.channels(),
            sample_rate: SampleRate(rate),
            buffer_size,
        },
        representation,
        buffer_frames,
    })
}
