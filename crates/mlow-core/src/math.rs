//! Fixed-point helpers shared by the DSP kernels
//!
//! Every narrowing conversion in the codec goes through these functions so
//! overflow always saturates and never wraps.

/// Saturate a 64-bit value to 16 bits
#[inline]
pub fn sat16_wide(value: i64) -> i16 {
    value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

/// Saturate a 64-bit value to 32 bits
#[inline]
pub fn sat32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Saturating 16-bit addition
#[inline]
pub fn add16(a: i16, b: i16) -> i16 {
    a.saturating_add(b)
}

/// Saturating 16-bit subtraction
#[inline]
pub fn sub16(a: i16, b: i16) -> i16 {
    a.saturating_sub(b)
}

/// Round a Q`shift` value to the nearest integer, ties upward
#[inline]
pub fn round_shift(value: i64, shift: u32) -> i64 {
    if shift == 0 {
        value
    } else {
        (value + (1i64 << (shift - 1))) >> shift
    }
}

/// Base-2 logarithm in Q8
///
/// The integer part is the bit position of the leading one; the fraction
/// is the next eight mantissa bits taken linearly. Returns 0 for 0.
pub fn log2_q8(value: u64) -> i32 {
    if value == 0 {
        return 0;
    }
    let exp = 63 - value.leading_zeros();
    let frac = if exp >= 8 {
        (value >> (exp - 8)) & 0xFF
    } else {
        (value << (8 - exp)) & 0xFF
    };
    ((exp as i32) << 8) | frac as i32
}

/// Energy ratio in whole decibels from two Q8 base-2 logarithms
///
/// 10*log10(2) = 3.0103 dB per octave; 771/256 approximates it.
#[inline]
pub fn log2_q8_to_db(delta_q8: i32) -> i32 {
    (delta_q8 * 771) >> 16
}

/// Sum of squares of a 16-bit signal
pub fn energy(signal: &[i16]) -> u64 {
    signal
        .iter()
        .map(|&s| {
            let v = i64::from(s);
            (v * v) as u64
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturation() {
        assert_eq!(sat16_wide(40_000), i16::MAX);
        assert_eq!(sat16_wide(-40_000), i16::MIN);
        assert_eq!(sat16_wide(123), 123);
        assert_eq!(sat16_wide(i64::MAX), i16::MAX);
        assert_eq!(sat32(i64::MIN), i32::MIN);
        assert_eq!(add16(i16::MAX, 1), i16::MAX);
        assert_eq!(sub16(i16::MIN, 1), i16::MIN);
    }

    #[test]
    fn test_round_shift() {
        assert_eq!(round_shift(3, 1), 2);
        assert_eq!(round_shift(-3, 1), -1);
        assert_eq!(round_shift(5, 0), 5);
        assert_eq!(round_shift(4095, 12), 1);
        assert_eq!(round_shift(2047, 12), 0);
    }

    #[test]
    fn test_log2_q8() {
        assert_eq!(log2_q8(0), 0);
        assert_eq!(log2_q8(1), 0);
        assert_eq!(log2_q8(2), 256);
        assert_eq!(log2_q8(3), 256 + 128);
        assert_eq!(log2_q8(1 << 40), 40 << 8);
    }

    #[test]
    fn test_db_conversion() {
        // 2^10 energy ratio is 30.1 dB
        assert_eq!(log2_q8_to_db(10 << 8), 30);
        assert_eq!(log2_q8_to_db(0), 0);
        assert_eq!(log2_q8_to_db(-(10 << 8)), -31);
    }

    #[test]
    fn test_energy() {
        let a = [3i16, -4, i16::MIN];
        assert_eq!(energy(&a), 9 + 16 + (1u64 << 30));
        assert_eq!(energy(&[]), 0);
    }
}
