//! LPC analysis
//!
//! Welch window, autocorrelation, lag window and a Levinson-Durbin
//! recursion, all in integer arithmetic. Reflection coefficients are the
//! transmitted form; the direct-form filter is always rebuilt from the
//! quantized reflection coefficients so encoder and decoder agree.

use crate::types::LPC_ORDER;
use tracing::warn;

/// Lag window in Q15 for lags 0..=16
///
/// Gaussian with a bandwidth expansion of 0.0075 cycles per sample.
pub const LAG_WINDOW: [i64; LPC_ORDER + 1] = [
    32767, 32731, 32622, 32441, 32190, 31870, 31483, 31032, 30519, 29949, 29323, 28648,
    27925, 27161, 26359, 25523, 24660,
];

/// 1.0 in the Q24 recursion domain
const ONE_Q24: i128 = 1 << 24;

/// Largest reflection coefficient magnitude kept by the recursion (0.999 in Q24)
const STABILITY_LIMIT_Q24: i128 = 16_760_439;

/// Bit position autocorrelations are normalized to
const NORM_BIT: u32 = 30;

/// Result of analysing one band frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LpcCoefficientSet {
    /// Reflection coefficients in Q15, one per order
    pub reflection: Vec<i16>,
    /// Prediction error energy left after the recursion, in the normalized
    /// autocorrelation domain (r0 is about 2^30)
    pub residual_energy: i64,
    /// Coefficients that reached |k| >= 1 and were clamped
    pub clamped: u32,
}

impl LpcCoefficientSet {
    /// All-zero set for silent input
    pub fn silent(order: usize) -> Self {
        Self {
            reflection: vec![0; order],
            residual_energy: 0,
            clamped: 0,
        }
    }

    /// Order of the set
    pub fn order(&self) -> usize {
        self.reflection.len()
    }
}

/// Welch window weight for sample `n` of `len`, in Q15
fn welch(n: usize, len: usize) -> i64 {
    let centre = 2 * n as i64 - (len as i64 - 1);
    let width = len as i64 + 1;
    (32768 - centre * centre * 32768 / (width * width)).min(32767)
}

/// Windowed autocorrelation for lags `0..=order`
pub fn autocorrelation(signal: &[i16], order: usize) -> Vec<i64> {
    let len = signal.len();
    let windowed: Vec<i64> = signal
        .iter()
        .enumerate()
        .map(|(n, &x)| (i64::from(x) * welch(n, len)) >> 15)
        .collect();

    (0..=order)
        .map(|k| {
            if k >= len {
                0
            } else {
                windowed[..len - k]
                    .iter()
                    .zip(&windowed[k..])
                    .map(|(a, b)| a * b)
                    .sum()
            }
        })
        .collect()
}

/// Scale so r0 sits in [2^30, 2^31), then apply lag window and noise floor
fn condition(r: &mut [i64]) {
    let top = 63 - (r[0] as u64).leading_zeros();
    if top > NORM_BIT {
        let shift = top - NORM_BIT;
        r.iter_mut().for_each(|v| *v >>= shift);
    } else {
        let shift = NORM_BIT - top;
        r.iter_mut().for_each(|v| *v <<= shift);
    }
    for (k, v) in r.iter_mut().enumerate().skip(1) {
        *v = (*v * LAG_WINDOW[k]) >> 15;
    }
    // White noise correction of -30 dB
    r[0] += r[0] >> 10;
}

/// Levinson-Durbin recursion on conditioned autocorrelations
pub fn levinson(r: &[i64], order: usize) -> LpcCoefficientSet {
    let mut a = [0i128; LPC_ORDER + 1];
    a[0] = ONE_Q24;
    let mut err = i128::from(r[0]);
    let mut reflection = vec![0i16; order];
    let mut clamped = 0;

    for i in 1..=order {
        let acc: i128 = (0..i).map(|j| a[j] * i128::from(r[i - j])).sum();
        let mut k = -acc / err;
        if k.abs() >= ONE_Q24 {
            clamped += 1;
        }
        k = k.clamp(-STABILITY_LIMIT_Q24, STABILITY_LIMIT_Q24);

        let prev = a;
        for j in 1..i {
            a[j] = prev[j] + ((k * prev[i - j]) >> 24);
        }
        a[i] = k;
        reflection[i - 1] = (k >> 9).clamp(-32767, 32767) as i16;

        err -= (((k * k) >> 24) * err) >> 24;
        if err <= 0 {
            break;
        }
    }

    LpcCoefficientSet {
        reflection,
        residual_energy: err.max(0) as i64,
        clamped,
    }
}

/// Analyse one band frame to `order` reflection coefficients
///
/// Silence yields all-zero coefficients. Unstable intermediate results are
/// clamped to |k| = 0.999 and counted in [`LpcCoefficientSet::clamped`].
pub fn analyze(signal: &[i16], order: usize) -> LpcCoefficientSet {
    let order = order.min(LPC_ORDER);
    let mut r = autocorrelation(signal, order);
    if r[0] <= 0 {
        return LpcCoefficientSet::silent(order);
    }
    condition(&mut r);
    let set = levinson(&r, order);
    if set.clamped > 0 {
        warn!(
            "LPC recursion clamped {} of {} reflection coefficients",
            set.clamped, order
        );
    }
    set
}

/// Step-up recursion: reflection coefficients (Q15) to direct form (Q16)
///
/// `a[j]` multiplies the sample `j + 1` steps back, so the analysis filter
/// is `A(z) = 1 + sum(a[j] z^-(j+1))`.
pub fn reflection_to_direct(reflection: &[i16]) -> Vec<i32> {
    let mut a: Vec<i64> = Vec::with_capacity(reflection.len());
    for (i, &k) in reflection.iter().enumerate() {
        let k = i64::from(k);
        let prev = a.clone();
        for j in 0..i {
            a[j] = prev[j] + ((k * prev[i - 1 - j]) >> 15);
        }
        a.push(k << 1);
    }
    a.into_iter().map(crate::math::sat32).collect()
}

/// Prediction residual `e[n] = x[n] + sum(a[j] x[n-1-j])`
///
/// `memory` holds the last input samples of the previous frame, oldest
/// first, and is updated in place.
pub fn residual(signal: &[i16], direct: &[i32], memory: &mut [i16; LPC_ORDER]) -> Vec<i32> {
    let mut history: Vec<i16> = Vec::with_capacity(LPC_ORDER + signal.len());
    history.extend_from_slice(memory);
    history.extend_from_slice(signal);

    let out = (0..signal.len())
        .map(|n| {
            let mut acc = i64::from(signal[n]) << 16;
            for (j, &c) in direct.iter().enumerate() {
                acc += i64::from(c) * i64::from(history[LPC_ORDER + n - 1 - j]);
            }
            crate::math::sat32(crate::math::round_shift(acc, 16))
        })
        .collect();

    memory.copy_from_slice(&history[history.len() - LPC_ORDER..]);
    out
}
