//! Quantizer Tables and Constants
//!
//! Per-band bit allocations and the fixed level tables shared by the
//! encoder and decoder. All values are integers so both sides build
//! identical tables on every platform.
//!
//! A bitrate selector does not own one allocation; it names a tier from
//! [`BAND_TIERS`] for every band the bandwidth mode codes, so the frame
//! total follows the selector's target whether one, two or three bands
//! share it.

use crate::types::LPC_ORDER;

/// Largest pitch gain level (1.2 in Q14)
pub const PITCH_GAIN_MAX: i32 = 19_661;

/// Largest codebook size in bits
pub const MAX_CODEBOOK_BITS: u8 = 9;

/// Reflection coefficient range per coefficient index, in Q15
///
/// Higher-order coefficients rarely approach unity, so their tables are
/// narrower. Values beyond the range clamp to the outermost level.
pub const REFLECTION_RANGE: [i32; LPC_ORDER] = [
    32440, 32440, 31130, 29491, 26214, 22938, 19661, 19661,
    16384, 16384, 13107, 13107, 13107, 13107, 13107, 13107,
];

/// Quantizer resolution for one coded band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandAllocation {
    /// Bits per reflection coefficient; the table has `2^bits - 1` levels
    /// and the band's LPC order is at most the slice length
    pub reflection_bits: &'static [u8],
    /// Band samples per excitation subframe
    pub subframe_len: usize,
    /// Uniform pitch gain levels over `0..=PITCH_GAIN_MAX`; 0 leaves the
    /// band without an adaptive codebook
    pub pitch_gain_levels: u16,
    /// Stochastic codebook size is `2^codebook_bits`
    pub codebook_bits: u8,
    /// Positive codebook gain magnitudes; the signed table mirrors them around zero
    pub codebook_gain_magnitudes: &'static [i32],
}

impl BandAllocation {
    /// Highest LPC order the allocation pays for
    pub fn order(&self) -> usize {
        self.reflection_bits.len()
    }

    /// Number of stochastic codebook entries
    pub fn codebook_size(&self) -> usize {
        1 << self.codebook_bits
    }

    /// Whether the band transmits a pitch lag and gain
    pub fn has_pitch(&self) -> bool {
        self.pitch_gain_levels > 0
    }

    /// Excitation subframes in a band of `band_len` samples
    pub fn subframes(&self, band_len: usize) -> usize {
        (band_len / self.subframe_len.max(1)).max(1)
    }
}

const GAIN_MAGNITUDES_3: [i32; 3] = [8, 400, 20000];

const GAIN_MAGNITUDES_4: [i32; 4] = [8, 109, 1474, 20000];

const GAIN_MAGNITUDES_5: [i32; 5] = [8, 57, 400, 2828, 20000];

const GAIN_MAGNITUDES_6: [i32; 6] = [8, 38, 183, 875, 4183, 20000];

const GAIN_MAGNITUDES_8: [i32; 8] = [8, 24, 75, 229, 699, 2139, 6540, 20000];

const GAIN_MAGNITUDES_12: [i32; 12] = [
    8, 16, 33, 68, 138, 280, 571, 1163, 2368, 4822, 9820, 20000,
];

const GAIN_MAGNITUDES_16: [i32; 16] = [
    8, 13, 23, 38, 64, 109, 183, 308, 519, 875, 1474, 2483, 4183, 7046, 11871, 20000,
];

const GAIN_MAGNITUDES_24: [i32; 24] = [
    8, 11, 16, 22, 31, 44, 62, 87, 122, 171, 240, 337, 474, 666, 936, 1316, 1849, 2598,
    3650, 5130, 7208, 10129, 14233, 20000,
];

const GAIN_MAGNITUDES_32: [i32; 32] = [
    8, 10, 13, 17, 22, 28, 36, 47, 60, 78, 100, 128, 165, 213, 274, 353, 454, 584, 752,
    968, 1245, 1603, 2063, 2655, 3418, 4399, 5662, 7288, 9380, 12073, 15539, 20000,
];

/// Band allocations, cheapest first
///
/// Tiers 0 to 3 carry no adaptive codebook and suit the upper bands at
/// low rates. From tier 7 on the excitation is searched in subframes.
pub static BAND_TIERS: [BandAllocation; 18] = [
    BandAllocation {
        reflection_bits: &[2, 2],
        subframe_len: 240,
        pitch_gain_levels: 0,
        codebook_bits: 3,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_3,
    },
    BandAllocation {
        reflection_bits: &[2, 2],
        subframe_len: 240,
        pitch_gain_levels: 0,
        codebook_bits: 4,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_4,
    },
    BandAllocation {
        reflection_bits: &[3, 3, 2, 2],
        subframe_len: 240,
        pitch_gain_levels: 0,
        codebook_bits: 4,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_5,
    },
    BandAllocation {
        reflection_bits: &[3, 3, 2, 2],
        subframe_len: 240,
        pitch_gain_levels: 0,
        codebook_bits: 5,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_6,
    },
    BandAllocation {
        reflection_bits: &[3, 3, 2, 2],
        subframe_len: 240,
        pitch_gain_levels: 4,
        codebook_bits: 4,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_6,
    },
    BandAllocation {
        reflection_bits: &[3, 3, 2, 2, 2, 2],
        subframe_len: 240,
        pitch_gain_levels: 4,
        codebook_bits: 5,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_6,
    },
    BandAllocation {
        reflection_bits: &[4, 3, 3, 2, 2, 2, 2, 2],
        subframe_len: 240,
        pitch_gain_levels: 8,
        codebook_bits: 6,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_8,
    },
    BandAllocation {
        reflection_bits: &[4, 4, 3, 3, 2, 2, 2, 2],
        subframe_len: 120,
        pitch_gain_levels: 8,
        codebook_bits: 5,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_8,
    },
    BandAllocation {
        reflection_bits: &[4, 4, 3, 3, 3, 2, 2, 2, 2, 2],
        subframe_len: 120,
        pitch_gain_levels: 8,
        codebook_bits: 6,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_8,
    },
    BandAllocation {
        reflection_bits: &[5, 4, 4, 3, 3, 3, 2, 2, 2, 2],
        subframe_len: 120,
        pitch_gain_levels: 12,
        codebook_bits: 7,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_12,
    },
    BandAllocation {
        reflection_bits: &[5, 5, 4, 4, 3, 3, 3, 3, 2, 2, 2, 2],
        subframe_len: 80,
        pitch_gain_levels: 12,
        codebook_bits: 7,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_12,
    },
    BandAllocation {
        reflection_bits: &[5, 5, 4, 4, 4, 3, 3, 3, 3, 3, 2, 2],
        subframe_len: 80,
        pitch_gain_levels: 16,
        codebook_bits: 8,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_12,
    },
    BandAllocation {
        reflection_bits: &[6, 5, 5, 4, 4, 4, 3, 3, 3, 3, 3, 3, 2, 2],
        subframe_len: 60,
        pitch_gain_levels: 16,
        codebook_bits: 8,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_16,
    },
    BandAllocation {
        reflection_bits: &[6, 6, 5, 5, 4, 4, 4, 4, 3, 3, 3, 3, 3, 3, 2, 2],
        subframe_len: 60,
        pitch_gain_levels: 16,
        codebook_bits: 8,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_16,
    },
    BandAllocation {
        reflection_bits: &[6, 6, 5, 5, 5, 4, 4, 4, 4, 4, 3, 3, 3, 3, 3, 3],
        subframe_len: 48,
        pitch_gain_levels: 24,
        codebook_bits: 8,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_16,
    },
    BandAllocation {
        reflection_bits: &[7, 6, 6, 5, 5, 5, 4, 4, 4, 4, 4, 4, 3, 3, 3, 3],
        subframe_len: 40,
        pitch_gain_levels: 24,
        codebook_bits: 9,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_24,
    },
    BandAllocation {
        reflection_bits: &[7, 7, 6, 6, 5, 5, 5, 5, 4, 4, 4, 4, 4, 4, 3, 3],
        subframe_len: 34,
        pitch_gain_levels: 32,
        codebook_bits: 9,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_24,
    },
    BandAllocation {
        reflection_bits: &[7, 7, 6, 6, 6, 6, 5, 5, 5, 5, 4, 4, 4, 4, 4, 4],
        subframe_len: 30,
        pitch_gain_levels: 32,
        codebook_bits: 9,
        codebook_gain_magnitudes: &GAIN_MAGNITUDES_32,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::log2_q8;

    /// Uniform-model cost of a tier for a band, in Q8 bits
    fn tier_cost_q8(alloc: &BandAllocation, band_len: usize) -> i32 {
        let reflection: i32 = alloc
            .reflection_bits
            .iter()
            .map(|&b| log2_q8((1u64 << b) - 1))
            .sum();
        let mut subframe = i32::from(alloc.codebook_bits) << 8;
        subframe += log2_q8(2 * alloc.codebook_gain_magnitudes.len() as u64 + 1);
        if alloc.has_pitch() {
            subframe += log2_q8(141) + log2_q8(u64::from(alloc.pitch_gain_levels));
        }
        reflection + alloc.subframes(band_len) as i32 * subframe
    }

    #[test]
    fn test_gain_magnitudes_strictly_increasing() {
        for alloc in &BAND_TIERS {
            let mags = alloc.codebook_gain_magnitudes;
            assert!(mags.windows(2).all(|w| w[0] < w[1]));
            assert!(mags[0] > 0);
        }
    }

    #[test]
    fn test_tiers_are_well_formed() {
        for alloc in &BAND_TIERS {
            assert!(alloc.order() >= 2 && alloc.order() <= LPC_ORDER);
            // Every reflection table keeps a zero level
            assert!(alloc.reflection_bits.iter().all(|&b| b >= 2));
            assert!(alloc.codebook_bits <= MAX_CODEBOOK_BITS);
            assert!(alloc.subframe_len >= 20 && alloc.subframe_len <= 240);
            assert_ne!(alloc.pitch_gain_levels, 1);
        }
    }

    #[test]
    fn test_tiers_grow_in_cost() {
        for pair in BAND_TIERS.windows(2) {
            assert!(tier_cost_q8(&pair[1], 240) > tier_cost_q8(&pair[0], 240));
        }
    }

    #[test]
    fn test_subframe_count() {
        let richest = &BAND_TIERS[17];
        assert_eq!(richest.subframes(240), 8);
        assert_eq!(richest.subframes(120), 4);
        assert_eq!(richest.subframes(8), 1);
        assert_eq!(BAND_TIERS[16].subframes(240), 7);
        assert_eq!(BAND_TIERS[0].subframes(480), 2);
    }
}
