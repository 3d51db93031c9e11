//! Input validation utilities for codec operations

use crate::error::{CodecError, Result};
use crate::packet::MIN_PACKET_SIZE;

/// Largest serialized packet accepted by the bulk interfaces
pub const MAX_ENCODED_SIZE: usize = 64 * 1024;

/// Validate one frame of samples against the configured frame size
pub fn validate_frame(samples: &[i16], frame_size: usize) -> Result<()> {
    if samples.len() != frame_size {
        return Err(CodecError::InvalidFrameSize {
            expected: frame_size,
            actual: samples.len(),
        });
    }
    Ok(())
}

/// Validate encoded data before handing it to the packet parser
pub fn validate_encoded_data(data: &[u8]) -> Result<()> {
    if data.len() < MIN_PACKET_SIZE {
        return Err(CodecError::malformed_bitstream(format!(
            "{} bytes cannot hold a packet",
            data.len()
        )));
    }

    if data.len() > MAX_ENCODED_SIZE {
        return Err(CodecError::malformed_bitstream(format!(
            "Encoded data too large: {} bytes",
            data.len()
        )));
    }

    Ok(())
}

/// Validate that a band split divides the frame evenly
///
/// # Arguments
/// * `frame_size` - Samples per frame
/// * `stages` - Number of two-way splits applied in series
pub fn validate_band_split(frame_size: usize, stages: u32) -> Result<()> {
    let divisor = 1usize << stages;
    if frame_size == 0 || frame_size % divisor != 0 {
        return Err(CodecError::InvalidFrameSize {
            expected: frame_size.next_multiple_of(divisor).max(divisor),
            actual: frame_size,
        });
    }
    Ok(())
}

/// Validate a raw s16le buffer before conversion
pub fn validate_pcm_bytes(data: &[u8]) -> Result<()> {
    if data.len() % 2 != 0 {
        return Err(CodecError::IoError {
            reason: format!("{} bytes is not a whole number of 16-bit samples", data.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_frame() {
        assert!(validate_frame(&[0i16; 16], 16).is_ok());
        assert_eq!(
            validate_frame(&[0i16; 15], 16),
            Err(CodecError::InvalidFrameSize { expected: 16, actual: 15 })
        );
    }

    #[test]
    fn test_validate_encoded_data() {
        assert!(validate_encoded_data(&[0u8; MIN_PACKET_SIZE]).is_ok());
        assert!(validate_encoded_data(&[]).is_err());
        assert!(validate_encoded_data(&vec![0u8; MAX_ENCODED_SIZE + 1]).is_err());
    }

    #[test]
    fn test_validate_band_split() {
        assert!(validate_band_split(480, 1).is_ok());
        assert!(validate_band_split(480, 2).is_ok());
        assert_eq!(
            validate_band_split(18, 2),
            Err(CodecError::InvalidFrameSize { expected: 20, actual: 18 })
        );
        assert!(validate_band_split(0, 1).is_err());
    }

    #[test]
    fn test_validate_pcm_bytes() {
        assert!(validate_pcm_bytes(&[0, 1, 2, 3]).is_ok());
        assert!(validate_pcm_bytes(&[0, 1, 2]).is_err());
    }
}
