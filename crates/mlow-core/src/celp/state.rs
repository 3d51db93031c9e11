//! Per-band state carried from one frame to the next

use crate::types::{LPC_ORDER, PITCH_MAX};

/// Inter-frame memory of one band
///
/// Encoder and decoder each hold one per coded band. The encoder updates
/// it with its local reconstruction so both sides stay in lock step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandState {
    /// Last synthesis filter outputs, oldest first
    pub synthesis_memory: [i16; LPC_ORDER],
    /// Last excitation samples, oldest first
    pub excitation_history: [i16; PITCH_MAX],
    /// Last input samples seen by the analysis filter (encoder only)
    pub input_memory: [i16; LPC_ORDER],
}

impl Default for BandState {
    fn default() -> Self {
        Self::new()
    }
}

impl BandState {
    /// Zeroed state
    pub fn new() -> Self {
        Self {
            synthesis_memory: [0; LPC_ORDER],
            excitation_history: [0; PITCH_MAX],
            input_memory: [0; LPC_ORDER],
        }
    }

    /// Clear all memories
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Append a frame of excitation, keeping the newest [`PITCH_MAX`] samples
    pub fn push_excitation(&mut self, excitation: &[i16]) {
        let n = excitation.len();
        if n >= PITCH_MAX {
            self.excitation_history
                .copy_from_slice(&excitation[n - PITCH_MAX..]);
        } else {
            self.excitation_history.copy_within(n.., 0);
            self.excitation_history[PITCH_MAX - n..].copy_from_slice(excitation);
        }
    }
}
