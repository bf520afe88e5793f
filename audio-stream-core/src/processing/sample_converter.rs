use rubato::{FftFixedIn, Resampler};

use crate::models::audio_format::{AudioFormat, SampleRepresentation};
use crate::models::error::StreamError;
use crate::processing::pcm;

/// Length of one resampler input block.
const RESAMPLER_BLOCK_MS: f64 = 10.0;

/// FFT sub-chunks per block (quality vs. latency).
const RESAMPLER_SUB_CHUNKS: usize = 2;

/// A borrowed buffer of interleaved samples as delivered by a device.
#[derive(Debug, Clone, Copy)]
pub enum SampleSlice<'a> {
    Int16(&'a [i16]),
    Float32(&'a [f32]),
}

impl SampleSlice<'_> {
    pub fn representation(&self) -> SampleRepresentation {
        match self {
            Self::Int16(_) => SampleRepresentation::Int16le,
            Self::Float32(_) => SampleRepresentation::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int16(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_f32(self) -> Vec<f32> {
        match self {
            Self::Int16(s) => s.iter().copied().map(pcm::i16_to_f32).collect(),
            Self::Float32(s) => s.to_vec(),
        }
    }
}

/// An owned buffer of interleaved samples in a converter's output format.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    Int16(Vec<i16>),
    Float32(Vec<f32>),
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        match self {
            Self::Int16(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Int16 view of the samples, quantizing floats if needed.
    pub fn into_i16(self) -> Vec<i16> {
        match self {
            Self::Int16(s) => s,
            Self::Float32(s) => s.into_iter().map(pcm::f32_to_i16).collect(),
        }
    }

    fn from_f32(samples: Vec<f32>, representation: SampleRepresentation) -> Self {
        match representation {
            SampleRepresentation::Float32 => Self::Float32(samples),
            SampleRepresentation::Int16le => {
                Self::Int16(samples.into_iter().map(pcm::f32_to_i16).collect())
            }
        }
    }
}

/// Which work a conversion performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPath {
    /// Formats match exactly; samples are copied.
    Identity,
    /// Same rate and layout, different sample representation.
    Requantize,
    /// Rate conversion through the FFT resampler.
    Resample,
}

/// Converts device buffers from one format into another.
///
/// Channel remixing is not performed: input and output must agree on
/// channel count. Rate conversion keeps streaming state across calls
/// (sub-block remainders and filter history), so one converter must only
/// ever see one continuous stream. Rebuild it when the input format
/// changes.
pub struct SampleConverter {
    input: AudioFormat,
    output: AudioFormat,
    resampler: Option<StreamResampler>,
}

impl std::fmt::Debug for SampleConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleConverter")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("resampling", &self.resampler.is_some())
            .finish()
    }
}

impl SampleConverter {
    pub fn new(input: AudioFormat, output: AudioFormat) -> Result<Self, StreamError> {
        // Formats may have been built field-by-field; re-check them here.
        let input = AudioFormat::new(input.sample_rate, input.channel_count, input.sample_representation)?;
        let output = AudioFormat::new(output.sample_rate, output.channel_count, output.sample_representation)?;

        if input.channel_count != output.channel_count {
            return Err(StreamError::Format(format!(
                "channel count mismatch: device delivers {}, target is {}",
                input.channel_count, output.channel_count
            )));
        }

        let resampler = if input.is_compatible_with(&output) {
            None
        } else {
            Some(StreamResampler::new(
                input.sample_rate,
                output.sample_rate,
                input.channel_count as usize,
            )?)
        };

        Ok(Self {
            input,
            output,
            resampler,
        })
    }

    pub fn input_format(&self) -> &AudioFormat {
        &self.input
    }

    pub fn output_format(&self) -> &AudioFormat {
        &self.output
    }

    /// Whether a buffer described by `format` can go through this converter.
    pub fn accepts(&self, format: &AudioFormat) -> bool {
        self.input.is_compatible_with(format)
    }

    /// The path a buffer of the given representation takes.
    pub fn path_for(&self, representation: SampleRepresentation) -> ConversionPath {
        if self.resampler.is_some() {
            ConversionPath::Resample
        } else if representation == self.output.sample_representation {
            ConversionPath::Identity
        } else {
            ConversionPath::Requantize
        }
    }

    /// Convert one device buffer.
    ///
    /// Consumes the whole input. When resampling, emits every output frame
    /// producible so far; the remainder stays buffered for the next call.
    pub fn convert(&mut self, input: SampleSlice<'_>) -> Result<SampleBuffer, StreamError> {
        let target = self.output.sample_representation;
        match (self.path_for(input.representation()), input) {
            (ConversionPath::Identity, SampleSlice::Int16(s)) => Ok(SampleBuffer::Int16(s.to_vec())),
            (ConversionPath::Identity, SampleSlice::Float32(s)) => Ok(SampleBuffer::Float32(s.to_vec())),
            (ConversionPath::Requantize, input) => Ok(SampleBuffer::from_f32(input.to_f32(), target)),
            (ConversionPath::Resample, input) => {
                let samples = input.to_f32();
                let resampled = match self.resampler.as_mut() {
                    Some(resampler) => resampler.process(&samples)?,
                    None => samples,
                };
                Ok(SampleBuffer::from_f32(resampled, target))
            }
        }
    }

    /// End of stream: emit what the resampler still holds.
    ///
    /// Empty unless resampling. The converter must not be fed afterwards.
    pub fn finish(&mut self) -> Result<SampleBuffer, StreamError> {
        let target = self.output.sample_representation;
        let tail = match self.resampler.as_mut() {
            Some(resampler) => resampler.finish()?,
            None => Vec::new(),
        };
        Ok(SampleBuffer::from_f32(tail, target))
    }
}

/// `FftFixedIn` wrapper accepting arbitrary buffer lengths.
struct StreamResampler {
    inner: FftFixedIn<f32>,
    channels: usize,
    ratio: f64,
    pending: Vec<Vec<f32>>,
    frames_in: u64,
    frames_out: u64,
}

impl StreamResampler {
    fn new(from_rate: f64, to_rate: f64, channels: usize) -> Result<Self, StreamError> {
        let from = from_rate.round() as usize;
        let to = to_rate.round() as usize;
        let block_frames = ((from_rate * RESAMPLER_BLOCK_MS / 1000.0) as usize).max(32);

        let inner = FftFixedIn::<f32>::new(from, to, block_frames, RESAMPLER_SUB_CHUNKS, channels)
            .map_err(|e| {
                StreamError::Format(format!("cannot resample {}Hz -> {}Hz: {}", from, to, e))
            })?;

        Ok(Self {
            inner,
            channels,
            ratio: to as f64 / from as f64,
            pending: vec![Vec::with_capacity(block_frames * 2); channels],
            frames_in: 0,
            frames_out: 0,
        })
    }

    fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>, StreamError> {
        // A trailing partial frame would misalign every later buffer.
        let whole = interleaved.len() - interleaved.len() % self.channels;
        for frame in interleaved[..whole].chunks_exact(self.channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                self.pending[ch].push(sample);
            }
        }
        self.frames_in += (whole / self.channels) as u64;

        let mut output = Vec::new();
        loop {
            let needed = self.inner.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }
            let block: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..needed).collect())
                .collect();

            let resampled = self
                .inner
                .process(&block, None)
                .map_err(|e| StreamError::Format(format!("resampler failed: {}", e)))?;

            let frames = resampled.first().map_or(0, Vec::len);
            self.frames_out += frames as u64;
            interleave_into(&mut output, &resampled, frames);
        }
        Ok(output)
    }

    /// Resample the buffered remainder, zero-padded to a full block, and
    /// trim the result so total output matches total input at the ratio.
    fn finish(&mut self) -> Result<Vec<f32>, StreamError> {
        let expected = (self.frames_in as f64 * self.ratio).round() as u64;
        let remaining = expected.saturating_sub(self.frames_out) as usize;
        if remaining == 0 || self.pending[0].is_empty() {
            self.pending.iter_mut().for_each(Vec::clear);
            return Ok(Vec::new());
        }

        let resampled = self
            .inner
            .process_partial(Some(self.pending.as_slice()), None)
            .map_err(|e| StreamError::Format(format!("resampler failed: {}", e)))?;
        self.pending.iter_mut().for_each(Vec::clear);

        let frames = resampled.first().map_or(0, Vec::len).min(remaining);
        self.frames_out += frames as u64;
        let mut output = Vec::with_capacity(frames * self.channels);
        interleave_into(&mut output, &resampled, frames);
        Ok(output)
    }
}

fn interleave_into(output: &mut Vec<f32>, channels: &[Vec<f32>], frames: usize) {
    output.reserve(frames * channels.len());
    for i in 0..frames {
        for channel in channels {
            output.push(channel[i]);
        }
    }
}
