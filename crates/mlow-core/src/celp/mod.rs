//! CELP core
//!
//! Per coded band and frame the encoder runs LPC analysis to reflection
//! coefficients, quantized immediately, and then for every excitation
//! subframe:
//!
//! 1. Open-loop pitch estimate on the LPC residual
//! 2. Closed-loop pitch refinement against the target (input minus the
//!    synthesis filter's zero-input response)
//! 3. Stochastic codebook search on what the pitch contribution leaves
//! 4. Local synthesis with the quantized parameters to update the state
//!
//! Bands whose allocation has no adaptive codebook skip steps 1 and 2.
//! The decoder repeats step 4 only. Both sides update [`BandState`] with
//! identical arithmetic so their memories never diverge.

pub mod codebook;
pub mod lpc;
pub mod pitch;
pub mod state;
pub mod synthesis;

pub use lpc::LpcCoefficientSet;
pub use state::BandState;

use crate::error::{CodecError, Result};
use crate::math::sat16_wide;
use crate::quantizer::{BandSymbols, ParameterQuantizer};
use crate::types::PITCH_MIN;
use std::ops::Range;
use tracing::trace;

/// Excitation of one band subframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExcitationParameters {
    /// Adaptive codebook lag in band samples
    pub pitch_lag: u16,
    /// Adaptive codebook gain in Q14
    pub pitch_gain: i32,
    /// Stochastic codebook entry
    pub codebook_index: u32,
    /// Stochastic codebook gain (integer scale, codewords are ternary)
    pub codebook_gain: i32,
}

impl ExcitationParameters {
    /// Zero excitation
    pub fn silent() -> Self {
        Self {
            pitch_lag: PITCH_MIN as u16,
            ..Default::default()
        }
    }
}

/// Everything transmitted for one band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandParameters {
    /// Reflection coefficients in Q15
    pub reflection: Vec<i16>,
    /// Excitation per subframe, in time order
    pub subframes: Vec<ExcitationParameters>,
}

impl BandParameters {
    /// Parameters that synthesize silence from a silent state
    pub fn silent(order: usize, subframes: usize) -> Self {
        Self {
            reflection: vec![0; order],
            subframes: vec![ExcitationParameters::silent(); subframes],
        }
    }
}

/// Sample ranges of `count` subframes splitting a band of `len` samples
///
/// Subframes differ in length by at most one sample when `count` does not
/// divide `len`.
pub fn subframe_bounds(len: usize, count: usize) -> impl Iterator<Item = Range<usize>> {
    let count = count.max(1);
    (0..count).map(move |i| i * len / count..(i + 1) * len / count)
}

/// Filter instability absorbed while analysing a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StabilityReport {
    /// Reflection coefficients clamped to the stability limit
    pub clamped: u32,
}

impl StabilityReport {
    /// Quality points lost for the clamping, at most 20
    pub fn penalty(&self) -> u8 {
        (self.clamped.saturating_mul(5)).min(20) as u8
    }

    /// Combine reports of several bands
    pub fn merge(self, other: Self) -> Self {
        Self {
            clamped: self.clamped + other.clamped,
        }
    }
}

/// Search the excitation for one subframe
///
/// `direct` is the quantized synthesis filter and `residual` the subframe
/// filtered by its inverse. Gains are returned already snapped to the
/// quantizer's levels because the codebook target depends on the
/// quantized pitch contribution. `state` is only read.
pub fn estimate_excitation(
    signal: &[i16],
    direct: &[i32],
    residual: &[i32],
    state: &BandState,
    quantizer: &ParameterQuantizer,
) -> ExcitationParameters {
    let len = signal.len();
    let history = &state.excitation_history;

    let zir = synthesis::zero_input_response(direct, len, &state.synthesis_memory);
    let target: Vec<i64> = signal
        .iter()
        .zip(&zir)
        .map(|(&x, &z)| i64::from(x) - i64::from(z))
        .collect();
    let h = synthesis::impulse_response(direct, len);

    let (pitch_lag, pitch_gain, remainder) = match quantizer.pitch_gain_table() {
        Some(gains) => {
            let open_loop = pitch::open_loop_lag(residual, history);
            let pitch = pitch::closed_loop_search(&target, &h, history, open_loop);
            let pitch_gain = gains.snap(pitch.gain);
            let remainder: Vec<i64> = target
                .iter()
                .zip(pitch::apply_gain_q14(pitch_gain, &pitch.filtered))
                .map(|(&t, p)| t - p)
                .collect();
            trace!("pitch: open-loop lag {}, lag {}, gp {}", open_loop, pitch.lag, pitch_gain);
            (pitch.lag, pitch_gain, remainder)
        }
        None => (PITCH_MIN, 0, target),
    };

    let found = codebook::search(&remainder, &h, quantizer.codebook_size());
    let codebook_gain = quantizer.codebook_gain_table().snap(found.gain);
    trace!("codebook: {} x {}", found.index, codebook_gain);

    ExcitationParameters {
        pitch_lag: pitch_lag as u16,
        pitch_gain,
        codebook_index: found.index,
        codebook_gain,
    }
}

/// Excitation signal `gp * v + gc * c` for a subframe of `len` samples
pub fn excitation_signal(
    params: &ExcitationParameters,
    history: &[i16; crate::types::PITCH_MAX],
    len: usize,
) -> Result<Vec<i16>> {
    let adaptive = pitch::adaptive_vector(history, usize::from(params.pitch_lag), len);
    let fixed = codebook::codeword(params.codebook_index as usize, len).ok_or_else(|| {
        CodecError::internal_error(format!(
            "codeword {} of length {} outside the codebook",
            params.codebook_index, len
        ))
    })?;

    let gp = i64::from(params.pitch_gain);
    let gc = i64::from(params.codebook_gain);
    Ok(adaptive
        .iter()
        .zip(fixed)
        .map(|(&v, &c)| sat16_wide(((gp * i64::from(v) + 8192) >> 14) + gc * i64::from(c)))
        .collect())
}

/// Reconstruct one subframe through `direct` and advance the state
///
/// The state is only touched once the excitation has been built, so an
/// error leaves it unchanged.
pub fn synthesize_subframe(
    direct: &[i32],
    params: &ExcitationParameters,
    state: &mut BandState,
    len: usize,
) -> Result<Vec<i16>> {
    let excitation = excitation_signal(params, &state.excitation_history, len)?;
    let output = synthesis::synthesize(direct, &excitation, &mut state.synthesis_memory);
    state.push_excitation(&excitation);
    Ok(output)
}

/// Reconstruct a band frame of `len` samples and advance the state
///
/// Runs on a copy of the state that replaces `state` only once every
/// subframe succeeded.
pub fn synthesize(params: &BandParameters, state: &mut BandState, len: usize) -> Result<Vec<i16>> {
    let direct = lpc::reflection_to_direct(&params.reflection);
    let mut next = state.clone();
    let mut output = Vec::with_capacity(len);
    for (range, sub) in subframe_bounds(len, params.subframes.len()).zip(&params.subframes) {
        output.extend(synthesize_subframe(&direct, sub, &mut next, range.len())?);
    }
    *state = next;
    Ok(output)
}

/// Result of encoding one band frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBand {
    /// Symbols to transmit
    pub symbols: BandSymbols,
    /// Quantized parameter values behind the symbols
    pub params: BandParameters,
    /// What the decoder will reconstruct
    pub reconstruction: Vec<i16>,
    /// Instability absorbed during analysis
    pub stability: StabilityReport,
}

/// Analysis-by-synthesis encoder for one band
#[derive(Debug, Clone)]
pub struct BandEncoder {
    quantizer: ParameterQuantizer,
    state: BandState,
}

impl BandEncoder {
    /// Create an encoder using `quantizer`'s order and tables
    pub fn new(quantizer: ParameterQuantizer) -> Self {
        Self {
            quantizer,
            state: BandState::new(),
        }
    }

    /// LPC order
    pub fn order(&self) -> usize {
        self.quantizer.order()
    }

    /// Quantizer in use
    pub fn quantizer(&self) -> &ParameterQuantizer {
        &self.quantizer
    }

    /// Current inter-frame state
    pub fn state(&self) -> &BandState {
        &self.state
    }

    /// Clear inter-frame state
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Encode one band frame
    pub fn encode(&mut self, band: &[i16]) -> Result<EncodedBand> {
        let order = self.order();
        let analysis = lpc::analyze(band, order);
        let reflection: Vec<i16> = analysis
            .reflection
            .iter()
            .enumerate()
            .map(|(i, &k)| self.quantizer.reflection_table(i).snap(i32::from(k)) as i16)
            .collect();

        let direct = lpc::reflection_to_direct(&reflection);
        let mut next = self.state.clone();
        let residual = lpc::residual(band, &direct, &mut next.input_memory);

        let mut subframes = Vec::with_capacity(self.quantizer.subframes());
        let mut reconstruction = Vec::with_capacity(band.len());
        for range in subframe_bounds(band.len(), self.quantizer.subframes()) {
            let excitation = estimate_excitation(
                &band[range.clone()],
                &direct,
                &residual[range.clone()],
                &next,
                &self.quantizer,
            );
            reconstruction.extend(synthesize_subframe(&direct, &excitation, &mut next, range.len())?);
            subframes.push(excitation);
        }
        self.state = next;

        let params = BandParameters {
            reflection,
            subframes,
        };
        let symbols = self.quantizer.quantize(&params);

        Ok(EncodedBand {
            symbols,
            params,
            reconstruction,
            stability: StabilityReport {
                clamped: analysis.clamped,
            },
        })
    }
}

/// Synthesis-only decoder for one band
#[derive(Debug, Clone)]
pub struct BandDecoder {
    quantizer: ParameterQuantizer,
    state: BandState,
}

impl BandDecoder {
    /// Create a decoder using `quantizer`'s order and tables
    pub fn new(quantizer: ParameterQuantizer) -> Self {
        Self {
            quantizer,
            state: BandState::new(),
        }
    }

    /// LPC order
    pub fn order(&self) -> usize {
        self.quantizer.order()
    }

    /// Quantizer in use
    pub fn quantizer(&self) -> &ParameterQuantizer {
        &self.quantizer
    }

    /// Current inter-frame state
    pub fn state(&self) -> &BandState {
        &self.state
    }

    /// Clear inter-frame state
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Validate symbols and map them to parameters without touching state
    pub fn prepare(&self, symbols: &BandSymbols) -> Result<BandParameters> {
        self.quantizer.dequantize(symbols)
    }

    /// Reconstruct a band frame from prepared parameters
    pub fn apply(&mut self, params: &BandParameters, len: usize) -> Result<Vec<i16>> {
        synthesize(params, &mut self.state, len)
    }

    /// Dequantize and reconstruct in one step
    pub fn decode(&mut self, symbols: &BandSymbols, len: usize) -> Result<Vec<i16>> {
        let params = self.prepare(symbols)?;
        self.apply(&params, len)
    }
}
