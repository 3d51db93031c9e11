//! All-pole synthesis filter 1/A(z)
//!
//! Coefficients are the Q16 direct form from
//! [`reflection_to_direct`](super::lpc::reflection_to_direct). The filter
//! memory holds the last [`LPC_ORDER`] outputs, oldest first, and carries
//! over frame boundaries.

use crate::math::{sat16_wide, round_shift};
use crate::types::LPC_ORDER;

/// Unit impulse amplitude of [`impulse_response`] (Q12)
pub const IMPULSE_ONE: i64 = 1 << 12;

/// Bound on impulse response samples, keeps long responses of
/// near-unstable filters inside i64 accumulators
const IMPULSE_LIMIT: i64 = 1 << 24;

/// Run the synthesis filter over `excitation`, updating `memory`
pub fn synthesize(direct: &[i32], excitation: &[i16], memory: &mut [i16; LPC_ORDER]) -> Vec<i16> {
    let mut history: Vec<i16> = Vec::with_capacity(LPC_ORDER + excitation.len());
    history.extend_from_slice(memory);

    for &u in excitation {
        let top = history.len();
        let mut acc = i64::from(u) << 16;
        for (j, &a) in direct.iter().enumerate() {
            acc -= i64::from(a) * i64::from(history[top - 1 - j]);
        }
        history.push(sat16_wide(round_shift(acc, 16)));
    }

    memory.copy_from_slice(&history[history.len() - LPC_ORDER..]);
    history.split_off(LPC_ORDER)
}

/// Output of the filter for zero input, starting from `memory`
///
/// The memory itself is left untouched.
pub fn zero_input_response(direct: &[i32], len: usize, memory: &[i16; LPC_ORDER]) -> Vec<i16> {
    let mut scratch = *memory;
    synthesize(direct, &vec![0; len], &mut scratch)
}

/// First `len` samples of the filter's impulse response, in Q12
pub fn impulse_response(direct: &[i32], len: usize) -> Vec<i64> {
    let mut h: Vec<i64> = Vec::with_capacity(len);
    for n in 0..len {
        let mut acc = if n == 0 { IMPULSE_ONE << 16 } else { 0 };
        for (j, &a) in direct.iter().enumerate().take(n) {
            acc -= i64::from(a) * h[n - 1 - j];
        }
        h.push((acc >> 16).clamp(-IMPULSE_LIMIT, IMPULSE_LIMIT));
    }
    h
}
