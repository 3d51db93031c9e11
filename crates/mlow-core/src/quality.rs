//! Frame quality estimate
//!
//! A band-domain SNR mapped onto 0..=100. Bands the mode does not code
//! count entirely as noise, so NarrowBand scores lower on wideband input.

use crate::celp::StabilityReport;
use crate::math::{energy, log2_q8, log2_q8_to_db};

/// Average energy per sample below which a frame counts as silent
pub const SILENCE_ENERGY_PER_SAMPLE: u64 = 4;

/// Added to the SNR in dB before clamping
pub const QUALITY_OFFSET_DB: i32 = 50;

/// Highest reportable quality
pub const QUALITY_MAX: u8 = 100;

/// Estimate the quality of one frame
///
/// # Arguments
/// * `bands` - Analysed bands, lowest first
/// * `reconstructed` - Local reconstruction of the coded bands
/// * `silence_quality` - Value reported for silent frames
/// * `stability` - Clamping absorbed during analysis, 5 points each
pub fn frame_quality(
    bands: &[Vec<i16>],
    reconstructed: &[Vec<i16>],
    silence_quality: u8,
    stability: StabilityReport,
) -> u8 {
    let samples: usize = bands.iter().map(Vec::len).sum();
    let signal: u64 = bands.iter().map(|b| energy(b)).sum();

    let noise: u64 = bands
        .iter()
        .enumerate()
        .map(|(i, band)| match reconstructed.get(i) {
            Some(rec) => band
                .iter()
                .zip(rec)
                .map(|(&x, &y)| {
                    let d = i64::from(x) - i64::from(y);
                    (d * d) as u64
                })
                .sum(),
            None => energy(band),
        })
        .sum();

    let raw = if signal < samples as u64 * SILENCE_ENERGY_PER_SAMPLE {
        silence_quality
    } else if noise == 0 {
        QUALITY_MAX
    } else {
        let snr = log2_q8_to_db(log2_q8(signal) - log2_q8(noise));
        (snr + QUALITY_OFFSET_DB).clamp(0, i32::from(QUALITY_MAX)) as u8
    };
    raw.saturating_sub(stability.penalty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_reports_target() {
        let bands = vec![vec![0i16; 8], vec![1i16; 8]];
        let q = frame_quality(&bands, &[vec![0; 8], vec![0; 8]], 75, StabilityReport::default());
        assert_eq!(q, 75);
    }

    #[test]
    fn test_perfect_reconstruction() {
        let bands = vec![vec![1000i16; 8]];
        let q = frame_quality(&bands, &bands, 75, StabilityReport::default());
        assert_eq!(q, 100);
    }

    #[test]
    fn test_snr_mapping() {
        // Noise at 1/10 of the signal energy: 10 dB
        let bands = vec![vec![1000i16; 100]];
        let rec = vec![(0..100).map(|i| if i % 10 == 0 { 0 } else { 1000 }).collect::<Vec<i16>>()];
        let q = frame_quality(&bands, &rec, 75, StabilityReport::default());
        assert!((58..=60).contains(&q), "quality {}", q);
    }

    #[test]
    fn test_uncoded_band_is_noise() {
        let bands = vec![vec![1000i16; 8], vec![1000i16; 8]];
        let q = frame_quality(&bands, &[vec![1000; 8]], 75, StabilityReport::default());
        // Half the energy lost: 3 dB
        assert!((52..=53).contains(&q), "quality {}", q);
    }

    #[test]
    fn test_clamping_costs_points() {
        let bands = vec![vec![1000i16; 8]];
        let q = frame_quality(&bands, &bands, 75, StabilityReport { clamped: 2 });
        assert_eq!(q, 90);
        let q = frame_quality(&bands, &bands, 75, StabilityReport { clamped: 10 });
        assert_eq!(q, 80);
    }
}
