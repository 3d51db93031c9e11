//! Adaptive codebook (pitch) search
//!
//! The lag is first estimated open loop from the LPC residual, then
//! refined over a small neighbourhood by analysis-by-synthesis against the
//! perceptual target. Lags shorter than the band repeat the most recent
//! `lag` excitation samples periodically.

use crate::quantizer::tables::PITCH_GAIN_MAX;
use crate::types::{PITCH_MAX, PITCH_MIN};

/// Half-width of the closed-loop refinement window, in lags
pub const REFINE_RADIUS: usize = 2;

/// Build the adaptive codebook vector for `lag` from the excitation history
pub fn adaptive_vector(history: &[i16; PITCH_MAX], lag: usize, len: usize) -> Vec<i16> {
    let lag = lag.clamp(PITCH_MIN, PITCH_MAX);
    let mut v: Vec<i16> = Vec::with_capacity(len);
    for n in 0..len {
        let sample = if n < lag {
            history[PITCH_MAX - lag + n]
        } else {
            v[n - lag]
        };
        v.push(sample);
    }
    v
}

/// Zero-state filtering of `v` by the impulse response `h` (Q12 result)
pub fn convolve<T: Copy + Into<i64>>(h: &[i64], v: &[T]) -> Vec<i64> {
    (0..v.len())
        .map(|n| {
            (0..=n)
                .map(|m| h[n - m] * v[m].into())
                .sum::<i64>()
        })
        .collect()
}

/// Q12 to integer, rounding half up
#[inline]
pub fn round_q12(value: i64) -> i64 {
    (value + 2048) >> 12
}

/// Filtered vector at integer scale
pub fn filter_vector<T: Copy + Into<i64>>(h: &[i64], v: &[T]) -> Vec<i64> {
    convolve(h, v).into_iter().map(round_q12).collect()
}

/// Correlation and energy of a candidate against a target
pub(crate) fn correlate(target: &[i64], candidate: &[i64]) -> (i128, i128) {
    target
        .iter()
        .zip(candidate)
        .fold((0i128, 0i128), |(num, den), (&t, &y)| {
            (
                num + i128::from(t) * i128::from(y),
                den + i128::from(y) * i128::from(y),
            )
        })
}

/// Normalised match `num^2 / den` used to rank candidates
pub(crate) fn match_score(num: i128, den: i128) -> i128 {
    if den > 0 {
        num.saturating_mul(num) / den
    } else {
        0
    }
}

/// Open-loop lag estimate
///
/// Picks the lag whose adaptive vector best predicts the residual with a
/// positive gain. Returns [`PITCH_MIN`] when nothing correlates.
pub fn open_loop_lag(residual: &[i32], history: &[i16; PITCH_MAX]) -> usize {
    let mut best_lag = PITCH_MIN;
    let mut best_score: Option<i128> = None;

    for lag in PITCH_MIN..=PITCH_MAX {
        let v = adaptive_vector(history, lag, residual.len());
        let (num, den) = residual.iter().zip(&v).fold((0i128, 0i128), |(num, den), (&r, &x)| {
            (
                num + i128::from(r) * i128::from(x),
                den + i128::from(x) * i128::from(x),
            )
        });
        if den <= 0 || num <= 0 {
            continue;
        }
        let score = match_score(num, den);
        if best_score.map_or(true, |best| score > best) {
            best_score = Some(score);
            best_lag = lag;
        }
    }
    best_lag
}

/// Outcome of the closed-loop search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitchMatch {
    /// Selected lag
    pub lag: usize,
    /// Unquantized optimal gain in Q14, limited to `0..=PITCH_GAIN_MAX`
    pub gain: i32,
    /// Adaptive vector for the lag
    pub vector: Vec<i16>,
    /// The vector filtered through the synthesis filter
    pub filtered: Vec<i64>,
}

/// Closed-loop refinement around `open_loop` lag
///
/// Ties keep the lowest lag.
pub fn closed_loop_search(
    target: &[i64],
    h: &[i64],
    history: &[i16; PITCH_MAX],
    open_loop: usize,
) -> PitchMatch {
    let lo = open_loop.saturating_sub(REFINE_RADIUS).max(PITCH_MIN);
    let hi = (open_loop + REFINE_RADIUS).min(PITCH_MAX);
    let len = target.len();

    let mut best: Option<(i128, i128, i128, PitchMatch)> = None;
    for lag in lo..=hi {
        let vector = adaptive_vector(history, lag, len);
        let filtered = filter_vector(h, &vector);
        let (num, den) = correlate(target, &filtered);
        let score = if num > 0 { match_score(num, den) } else { 0 };
        if best.as_ref().map_or(true, |(s, ..)| score > *s) {
            best = Some((
                score,
                num,
                den,
                PitchMatch {
                    lag,
                    gain: 0,
                    vector,
                    filtered,
                },
            ));
        }
    }

    match best {
        Some((_, num, den, mut found)) => {
            found.gain = if den > 0 {
                ((num << 14) / den).clamp(0, i128::from(PITCH_GAIN_MAX)) as i32
            } else {
                0
            };
            found
        }
        // Unreachable for a non-empty lag range; keep a silent match
        None => PitchMatch {
            lag: PITCH_MIN,
            gain: 0,
            vector: vec![0; len],
            filtered: vec![0; len],
        },
    }
}

/// Scale a vector by a Q14 gain, rounding half up
pub fn apply_gain_q14(gain: i32, v: &[i64]) -> Vec<i64> {
    v.iter()
        .map(|&x| (i64::from(gain) * x + 8192) >> 14)
        .collect()
}
