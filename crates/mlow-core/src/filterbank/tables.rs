//! QMF filter constants

/// Number of taps in the half-band prototype
pub const QMF_TAPS: usize = 24;

/// Half-band QMF coefficients shared by analysis and synthesis
///
/// The 24-tap symmetric prototype of the G.722 filterbank. The sum of the
/// coefficients is 2^14, which fixes the analysis shift at 14 and the
/// synthesis shift at 13 for unity gain through a full split/merge.
pub const QMF_COEFFS: [i32; QMF_TAPS] = [
    6, -22, -22, 106, 24, -312, 64, 724, -420, -1610, 1902, 7752,
    7752, 1902, -1610, -420, 724, 64, -312, 24, 106, -22, -22, 6,
];

/// Right shift applied to analysis accumulators
pub const ANALYSIS_SHIFT: u32 = 14;

/// Right shift applied to synthesis accumulators
pub const SYNTHESIS_SHIFT: u32 = 13;

/// Full-rate delay of one analysis/synthesis pair, in samples
pub const QMF_DELAY: usize = QMF_TAPS - 2;

/// Full-rate delay of the two-stage SuperWideBand path, in samples
///
/// The second stage runs at half rate, so it adds twice its own delay.
pub const CASCADE_DELAY: usize = QMF_DELAY + 2 * QMF_DELAY;

/// Reconstruction error bound for inputs within half of full scale
pub const ROUND_TRIP_TOLERANCE: i32 = 64;
