//! Stochastic codebook
//!
//! An overlapped ternary codebook in the FS-1016 manner: codeword `k` is
//! the window `base[2k..2k + len]` of one long sequence, so consecutive
//! codewords share all but two samples. The search exploits the overlap to
//! filter each codeword from its successor in linear time.

use super::pitch::{correlate, match_score, round_q12};
use crate::quantizer::tables::MAX_CODEBOOK_BITS;
use crate::types::MAX_FRAME_SIZE;
use once_cell::sync::Lazy;

/// Shift between consecutive codewords
pub const CODEWORD_SHIFT: usize = 2;

/// Length of the base sequence; covers the largest codebook at the longest band
pub const BASE_LEN: usize = CODEWORD_SHIFT * ((1 << MAX_CODEBOOK_BITS) - 1) + MAX_FRAME_SIZE / 2;

const SEED: u32 = 0x4D4C_4F57;

/// Ternary base sequence, about 20% +1, 20% -1, 60% zeros
static BASE_SEQUENCE: Lazy<Vec<i8>> = Lazy::new(|| {
    let mut state = SEED;
    (0..BASE_LEN)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            match ((state >> 16) & 0x7FFF) % 10 {
                0 | 1 => 1,
                2 | 3 => -1,
                _ => 0,
            }
        })
        .collect()
});

/// Codeword `index` of length `len`, or `None` past the end of the table
pub fn codeword(index: usize, len: usize) -> Option<&'static [i8]> {
    let start = index.checked_mul(CODEWORD_SHIFT)?;
    BASE_SEQUENCE.get(start..start.checked_add(len)?)
}

/// Best codeword for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodebookMatch {
    /// Codeword index
    pub index: u32,
    /// Least-squares gain, unquantized
    pub gain: i32,
}

/// Exhaustive search over the first `size` codewords
///
/// Maximises `(t.y)^2 / (y.y)` where `y` is the filtered codeword. Exact
/// ties keep the lowest index.
pub fn search(target: &[i64], h: &[i64], size: usize) -> CodebookMatch {
    let len = target.len();
    let base: &[i8] = &BASE_SEQUENCE;
    let size = size.min((base.len().saturating_sub(len)) / CODEWORD_SHIFT + 1);
    if len == 0 || size == 0 {
        return CodebookMatch { index: 0, gain: 0 };
    }

    let mut filtered: Vec<i64> = Vec::new();
    let mut best = (0i128, 0usize, 0i128, 0i128);
    let mut first = true;

    for k in (0..size).rev() {
        let b0 = i64::from(base[CODEWORD_SHIFT * k]);
        let b1 = base.get(CODEWORD_SHIFT * k + 1).map_or(0, |&b| i64::from(b));
        if first {
            filtered = super::pitch::convolve(h, &base[CODEWORD_SHIFT * k..CODEWORD_SHIFT * k + len]);
        } else {
            // y_k[n] = y_{k+1}[n-2] + h[n] b[2k] + h[n-1] b[2k+1]
            let mut next = vec![0i64; len];
            next[0] = h[0] * b0;
            if len > 1 {
                next[1] = h[1] * b0 + h[0] * b1;
            }
            for n in 2..len {
                next[n] = filtered[n - 2] + h[n] * b0 + h[n - 1] * b1;
            }
            filtered = next;
        }

        let rounded: Vec<i64> = filtered.iter().map(|&y| round_q12(y)).collect();
        let (num, den) = correlate(target, &rounded);
        let score = match_score(num, den);
        if first || score >= best.0 {
            best = (score, k, num, den);
            first = false;
        }
    }

    let (_, index, num, den) = best;
    let gain = if den > 0 { num / den } else { 0 };
    CodebookMatch {
        index: index as u32,
        gain: gain.clamp(i128::from(i32::MIN), i128::from(i32::MAX)) as i32,
    }
}
