//! PCM16 wire codec.
//!
//! Float samples in [-1, 1] are scaled to 16-bit signed integers, packed
//! little-endian, and carried as base64 text over the message channel.
//! Stateless; the inverse path reproduces sample values exactly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::CallError;

/// Scale one float sample to PCM16.
///
/// Negative values scale by 32768 and non-negative by 32767 so both ends of
/// the clamped range land exactly on i16::MIN / i16::MAX.
pub fn sample_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Expand one PCM16 sample back to float.
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Encode a float frame to transport-safe text.
pub fn encode_frame(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&sample_to_i16(s).to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Encode an already-quantized PCM16 frame to transport-safe text.
pub fn encode_pcm16(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode transport text back to PCM16 samples.
pub fn decode_frame(encoded: &str) -> Result<Vec<i16>, CallError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CallError::Protocol(format!("bad base64 audio: {}", e)))?;
    if bytes.len() % 2 != 0 {
        return Err(CallError::Protocol(format!(
            "odd PCM16 payload length: {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_hits_full_range() {
        assert_eq!(sample_to_i16(-1.0), i16::MIN);
        assert_eq!(sample_to_i16(1.0), i16::MAX);
        assert_eq!(sample_to_i16(0.0), 0);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        assert_eq!(sample_to_i16(-3.5), i16::MIN);
        assert_eq!(sample_to_i16(2.0), i16::MAX);
    }

    #[test]
    fn pcm16_round_trip_is_exact() {
        let original: Vec<i16> = vec![0, 1, -1, 1000, -1000, i16::MAX, i16::MIN, 12345];
        let wire = encode_pcm16(&original);
        let decoded = decode_frame(&wire).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn float_frame_encodes_little_endian() {
        // One full-scale positive sample: 0x7FFF little-endian.
        let wire = encode_frame(&[1.0]);
        let bytes = STANDARD.decode(wire).unwrap();
        assert_eq!(bytes, vec![0xFF, 0x7F]);
    }

    #[test]
    fn malformed_payloads_are_protocol_errors() {
        assert!(matches!(
            decode_frame("@@not base64@@"),
            Err(CallError::Protocol(_))
        ));
        // Three bytes cannot hold whole PCM16 samples.
        let odd = STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(decode_frame(&odd), Err(CallError::Protocol(_))));
    }
}
