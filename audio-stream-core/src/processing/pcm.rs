//! PCM16 wire-format utilities.
//!
//! Every payload crossing the host boundary is interleaved signed 16-bit
//! little-endian PCM, transported as standard padded base64. Stereo frames
//! are ordered left then right.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::models::error::StreamError;

/// Scale between int16 samples and normalized floats.
const I16_SCALE: f32 = 32768.0;

/// Serialize int16 samples to little-endian bytes.
///
/// Output length = `samples.len() * 2` bytes.
pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Parse little-endian bytes into int16 samples.
///
/// A trailing odd byte cannot be a sample and is rejected.
pub fn le_bytes_to_i16(bytes: &[u8]) -> Result<Vec<i16>, StreamError> {
    if bytes.len() % 2 != 0 {
        return Err(StreamError::Decode(format!(
            "payload length {} is not a whole number of 16-bit samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Normalize an int16 sample into `[-1.0, 1.0)`.
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Quantize a normalized float to int16, clamping out-of-range values.
///
/// Inverse of [`i16_to_f32`] for every int16 value.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_SCALE).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(payload: &str) -> Result<Vec<u8>, StreamError> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| StreamError::Decode(e.to_string()))
}

/// Decode one inbound chunk (base64 PCM16) into device-native floats.
pub fn decode_chunk_to_f32(payload: &str) -> Result<Vec<f32>, StreamError> {
    let bytes = decode_base64(payload)?;
    let samples = le_bytes_to_i16(&bytes)?;
    Ok(samples.into_iter().map(i16_to_f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int16_little_endian_layout() {
        let bytes = i16_to_le_bytes(&[1, -1, i16::MAX, i16::MIN]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xff, 0xff, 0xff, 0x7f, 0x00, 0x80]);
    }

    #[test]
    fn base64_transport_is_lossless() {
        let samples: Vec<i16> = vec![0, 1, -1, 1234, -4321, i16::MAX, i16::MIN, 256];
        let encoded = encode_base64(&i16_to_le_bytes(&samples));
        let decoded = le_bytes_to_i16(&decode_base64(&encoded).unwrap()).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn float_quantization_inverts_normalization() {
        for sample in [i16::MIN, -16384, -1, 0, 1, 16384, i16::MAX] {
            assert_eq!(f32_to_i16(i16_to_f32(sample)), sample);
        }
    }

    #[test]
    fn quantization_clamps_out_of_range() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-3.0), i16::MIN);
    }

    #[test]
    fn normalization_stays_in_unit_range() {
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert!(i16_to_f32(i16::MAX) < 1.0);
    }

    #[test]
    fn rejects_non_base64_payload() {
        let err = decode_base64("not base64!!").unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn rejects_odd_length_pcm() {
        let err = le_bytes_to_i16(&[0x01, 0x02, 0x03]).unwrap_err();
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn decodes_chunk_to_normalized_floats() {
        let payload = encode_base64(&i16_to_le_bytes(&[16384, -32768]));
        assert_eq!(decode_chunk_to_f32(&payload).unwrap(), vec![0.5, -1.0]);
    }
}
