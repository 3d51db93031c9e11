//! Probability models for the range coder
//!
//! A [`FrequencyModel`] is a cumulative frequency table over a fixed
//! alphabet. Static models never change; adaptive models bump the count of
//! every coded symbol and halve all counts when the total grows too large.
//! Encoder and decoder call [`FrequencyModel::update`] at the same point in
//! the stream, so their tables stay identical.

use super::MAX_TOTAL;
use crate::error::{CodecError, Result};
use crate::quantizer::{SymbolClass, SymbolSlot};
use crate::types::ModelPolicy;
use std::collections::HashMap;

/// Count added to a symbol each time it is coded
pub const ADAPT_INCREMENT: u32 = 24;
/// Counts are halved once the total exceeds this
pub const ADAPT_LIMIT: u32 = 1 << 15;

/// Cumulative frequency table over `0..alphabet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyModel {
    freqs: Vec<u32>,
    cumulative: Vec<u32>,
    adaptive: bool,
}

impl FrequencyModel {
    /// Equal frequency for every symbol
    pub fn uniform(alphabet: u32) -> Self {
        Self::from_frequencies(vec![1; alphabet.max(1) as usize])
    }

    /// Triangular table peaking at the middle symbol
    ///
    /// Reflection coefficient tables are symmetric around zero and small
    /// magnitudes dominate, so the middle symbols get the most weight.
    pub fn peaked(alphabet: u32) -> Self {
        let n = alphabet.max(1);
        let freqs = (0..n).map(|s| 1 + s.min(n - 1 - s)).collect();
        Self::from_frequencies(freqs)
    }

    fn from_frequencies(freqs: Vec<u32>) -> Self {
        let mut model = Self {
            cumulative: Vec::with_capacity(freqs.len() + 1),
            freqs,
            adaptive: false,
        };
        model.rebuild();
        model
    }

    /// Turn on per-symbol adaptation
    pub fn adaptive(mut self) -> Self {
        self.adaptive = true;
        self
    }

    /// Replace the counts; zero counts are raised to one
    pub fn set_frequencies(&mut self, freqs: &[u32]) {
        self.freqs = freqs.iter().map(|&f| f.max(1)).collect();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.cumulative.clear();
        self.cumulative.push(0);
        let mut total = 0u32;
        for &f in &self.freqs {
            total = total.saturating_add(f);
            self.cumulative.push(total);
        }
    }

    /// Alphabet size
    pub fn alphabet(&self) -> u32 {
        self.freqs.len() as u32
    }

    /// Sum of all counts
    pub fn total(&self) -> u32 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Whether the model adapts after each symbol
    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    /// Cumulative interval `[fl, fh)` of `symbol`
    pub fn interval(&self, symbol: u32) -> Result<(u32, u32)> {
        if symbol >= self.alphabet() {
            return Err(CodecError::InvalidSymbol {
                symbol,
                alphabet: self.alphabet(),
            });
        }
        if self.total() > MAX_TOTAL {
            return Err(CodecError::internal_error(format!(
                "model total {} exceeds {}",
                self.total(),
                MAX_TOTAL
            )));
        }
        let s = symbol as usize;
        Ok((self.cumulative[s], self.cumulative[s + 1]))
    }

    /// Symbol whose interval contains `target`, with that interval
    ///
    /// `target` values at or beyond the total map to the last symbol.
    pub fn find(&self, target: u32) -> (u32, u32, u32) {
        let upper = self.cumulative.partition_point(|&c| c <= target);
        let symbol = upper.saturating_sub(1).min(self.freqs.len().saturating_sub(1));
        (
            symbol as u32,
            self.cumulative[symbol],
            self.cumulative[symbol + 1],
        )
    }

    /// Record that `symbol` was coded
    pub fn update(&mut self, symbol: u32) {
        if !self.adaptive {
            return;
        }
        let Some(freq) = self.freqs.get_mut(symbol as usize) else {
            return;
        };
        *freq += ADAPT_INCREMENT;
        if self.total() + ADAPT_INCREMENT > ADAPT_LIMIT {
            for f in &mut self.freqs {
                *f = (*f + 1) / 2;
            }
        }
        self.rebuild();
    }
}

/// One model per symbol class for a frame
///
/// Built fresh for every frame so adaptive statistics never cross a frame
/// boundary.
#[derive(Debug, Clone)]
pub struct ModelBank {
    policy: ModelPolicy,
    models: HashMap<SymbolClass, FrequencyModel>,
}

impl ModelBank {
    /// Create the initial models for a frame layout
    pub fn new(policy: ModelPolicy, layout: &[SymbolSlot]) -> Self {
        let mut models = HashMap::new();
        for slot in layout {
            models.entry(slot.class).or_insert_with(|| {
                let model = match slot.class {
                    SymbolClass::Reflection(_) => FrequencyModel::peaked(slot.alphabet),
                    _ => FrequencyModel::uniform(slot.alphabet),
                };
                let adapts = !matches!(slot.class, SymbolClass::Quality | SymbolClass::Checksum);
                if policy == ModelPolicy::Adaptive && adapts {
                    model.adaptive()
                } else {
                    model
                }
            });
        }
        Self { policy, models }
    }

    /// Policy the bank was built with
    pub fn policy(&self) -> ModelPolicy {
        self.policy
    }

    /// Model for a slot
    pub fn model(&self, slot: &SymbolSlot) -> Result<&FrequencyModel> {
        let model = self.models.get(&slot.class).ok_or_else(|| {
            CodecError::internal_error(format!("no model for {:?}", slot.class))
        })?;
        if model.alphabet() != slot.alphabet {
            return Err(CodecError::internal_error(format!(
                "{:?} model has alphabet {}, slot expects {}",
                slot.class,
                model.alphabet(),
                slot.alphabet
            )));
        }
        Ok(model)
    }

    /// Adapt the model for a slot after coding `symbol`
    pub fn update(&mut self, slot: &SymbolSlot, symbol: u32) {
        if let Some(model) = self.models.get_mut(&slot.class) {
            model.update(symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_intervals() {
        let model = FrequencyModel::uniform(4);
        assert_eq!(model.total(), 4);
        assert_eq!(model.interval(2).unwrap(), (2, 3));
        assert!(model.interval(4).is_err());
    }

    #[test]
    fn test_peaked_is_symmetric() {
        let model = FrequencyModel::peaked(7);
        let widths: Vec<u32> = (0..7)
            .map(|s| {
                let (lo, hi) = model.interval(s).unwrap();
                hi - lo
            })
            .collect();
        assert_eq!(widths, vec![1, 2, 3, 4, 3, 2, 1]);
    }

    #[test]
    fn test_find_matches_interval() {
        let model = FrequencyModel::peaked(31);
        for s in 0..31 {
            let (lo, hi) = model.interval(s).unwrap();
            for target in lo..hi {
                assert_eq!(model.find(target), (s, lo, hi));
            }
        }
        assert_eq!(model.find(model.total() + 5).0, 30);
    }

    #[test]
    fn test_static_model_ignores_updates() {
        let mut model = FrequencyModel::uniform(8);
        model.update(3);
        assert_eq!(model, FrequencyModel::uniform(8));
    }

    #[test]
    fn test_adaptive_model_learns_and_rescales() {
        let mut model = FrequencyModel::uniform(8).adaptive();
        model.update(5);
        let (lo, hi) = model.interval(5).unwrap();
        assert_eq!(hi - lo, 1 + ADAPT_INCREMENT);

        for _ in 0..5000 {
            model.update(5);
            assert!(model.total() <= ADAPT_LIMIT);
        }
        let (lo, hi) = model.interval(0).unwrap();
        assert_eq!(hi - lo, 1);
    }

    #[test]
    fn test_bank_shares_models_per_class() {
        let layout = [
            SymbolSlot { class: SymbolClass::Quality, alphabet: 101 },
            SymbolSlot { class: SymbolClass::PitchGain, alphabet: 16 },
            SymbolSlot { class: SymbolClass::PitchGain, alphabet: 16 },
            SymbolSlot { class: SymbolClass::Checksum, alphabet: 256 },
        ];
        let mut bank = ModelBank::new(ModelPolicy::Adaptive, &layout);
        bank.update(&layout[1], 3);
        let (lo, hi) = bank.model(&layout[2]).unwrap().interval(3).unwrap();
        assert_eq!(hi - lo, 1 + ADAPT_INCREMENT);

        bank.update(&layout[0], 50);
        assert!(!bank.model(&layout[0]).unwrap().is_adaptive());

        let wrong = SymbolSlot { class: SymbolClass::PitchGain, alphabet: 8 };
        assert!(bank.model(&wrong).is_err());
    }
}
