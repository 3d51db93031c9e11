//! Raw PCM conversion helpers

use super::validation::validate_pcm_bytes;
use crate::error::Result;
use bytes::{Buf, BufMut, BytesMut};

/// Decode little-endian 16-bit samples
pub fn samples_from_le_bytes(data: &[u8]) -> Result<Vec<i16>> {
    validate_pcm_bytes(data)?;
    let mut cursor = data;
    let mut samples = Vec::with_capacity(data.len() / 2);
    while cursor.has_remaining() {
        samples.push(cursor.get_i16_le());
    }
    Ok(samples)
}

/// Encode samples as little-endian 16-bit PCM
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        buf.put_i16_le(sample);
    }
    buf.to_vec()
}

/// Split samples into whole frames, zero-padding the last one
pub fn into_frames(samples: &[i16], frame_size: usize) -> Vec<Vec<i16>> {
    if frame_size == 0 {
        return Vec::new();
    }
    samples
        .chunks(frame_size)
        .map(|chunk| {
            let mut frame = chunk.to_vec();
            frame.resize(frame_size, 0);
            frame
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_le_conversion() {
        let bytes = samples_to_le_bytes(&[1, -2, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0x34, 0x12]);
        assert_eq!(samples_from_le_bytes(&bytes).unwrap(), vec![1, -2, 0x1234]);
    }

    #[test]
    fn test_odd_byte_count_rejected() {
        assert!(samples_from_le_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_into_frames_pads() {
        let frames = into_frames(&[1, 2, 3, 4, 5], 2);
        assert_eq!(frames, vec![vec![1, 2], vec![3, 4], vec![5, 0]]);
        assert!(into_frames(&[], 4).is_empty());
    }
}
