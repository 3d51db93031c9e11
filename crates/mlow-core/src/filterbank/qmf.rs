//! Two-band QMF analysis and synthesis
//!
//! Each filter keeps its own 24-sample delay line so a stream can be cut
//! into frames of any even length without affecting the output.

use super::tables::{ANALYSIS_SHIFT, QMF_COEFFS, QMF_TAPS, SYNTHESIS_SHIFT};
use crate::math::{sat16_wide, sub16, add16};

/// Multiply the even and odd taps of the delay line by the prototype
fn accumulate(delay: &[i16; QMF_TAPS]) -> (i64, i64) {
    let mut even = 0i64;
    let mut odd = 0i64;
    for i in 0..QMF_TAPS / 2 {
        even += i64::from(delay[2 * i]) * i64::from(QMF_COEFFS[2 * i]);
        odd += i64::from(delay[2 * i + 1]) * i64::from(QMF_COEFFS[2 * i + 1]);
    }
    (even, odd)
}

/// Shift the delay line by two samples, making room at the front
fn shift_in(delay: &mut [i16; QMF_TAPS], newest: i16, second: i16) {
    delay.copy_within(0..QMF_TAPS - 2, 2);
    delay[0] = newest;
    delay[1] = second;
}

/// QMF analysis filter (encoder side)
///
/// Turns every pair of input samples into one low-band and one high-band
/// sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QmfAnalysis {
    delay: [i16; QMF_TAPS],
}

impl Default for QmfAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl QmfAnalysis {
    /// Create a filter with an empty delay line
    pub fn new() -> Self {
        Self {
            delay: [0; QMF_TAPS],
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.delay = [0; QMF_TAPS];
    }

    /// Split one sample pair into `(low, high)`
    pub fn process_pair(&mut self, x0: i16, x1: i16) -> (i16, i16) {
        shift_in(&mut self.delay, x1, x0);
        let (even, odd) = accumulate(&self.delay);
        (
            sat16_wide((even + odd) >> ANALYSIS_SHIFT),
            sat16_wide((even - odd) >> ANALYSIS_SHIFT),
        )
    }

    /// Split a block of even length into half-rate `(low, high)` bands
    ///
    /// A trailing odd sample is ignored; callers validate frame sizes.
    pub fn analyze(&mut self, input: &[i16]) -> (Vec<i16>, Vec<i16>) {
        let half = input.len() / 2;
        let mut low = Vec::with_capacity(half);
        let mut high = Vec::with_capacity(half);
        for pair in input.chunks_exact(2) {
            let (l, h) = self.process_pair(pair[0], pair[1]);
            low.push(l);
            high.push(h);
        }
        (low, high)
    }
}

/// QMF synthesis filter (decoder side)
///
/// Turns one low-band and one high-band sample into two output samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QmfSynthesis {
    delay: [i16; QMF_TAPS],
}

impl Default for QmfSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

impl QmfSynthesis {
    /// Create a filter with an empty delay line
    pub fn new() -> Self {
        Self {
            delay: [0; QMF_TAPS],
        }
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.delay = [0; QMF_TAPS];
    }

    /// Merge one `(low, high)` pair into two output samples
    pub fn process_pair(&mut self, low: i16, high: i16) -> (i16, i16) {
        shift_in(&mut self.delay, sub16(low, high), add16(low, high));
        let (even, odd) = accumulate(&self.delay);
        (
            sat16_wide(even >> SYNTHESIS_SHIFT),
            sat16_wide(odd >> SYNTHESIS_SHIFT),
        )
    }

    /// Merge half-rate bands of equal length into a full-rate block
    pub fn synthesize(&mut self, low: &[i16], high: &[i16]) -> Vec<i16> {
        let mut out = Vec::with_capacity(low.len() * 2);
        for (&l, &h) in low.iter().zip(high) {
            let (a, b) = self.process_pair(l, h);
            out.push(a);
            out.push(b);
        }
        out
    }
}
