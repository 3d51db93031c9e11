//! Parameter quantizer
//!
//! Maps LPC reflection coefficients and excitation parameters to integer
//! symbols and back. Every parameter has a sorted level table fixed at
//! configuration time; quantization picks the nearest level, ties go to
//! the upper level, and values outside the table clamp to its ends.

pub mod tables;

use crate::celp::{BandParameters, ExcitationParameters};
use crate::error::{CodecError, Result};
use crate::types::{PITCH_MAX, PITCH_MIN};
use tables::{BandAllocation, PITCH_GAIN_MAX, REFLECTION_RANGE};

/// Alphabet of the transmitted quality symbol (0..=100)
pub const QUALITY_ALPHABET: u32 = 101;
/// Alphabet of the frame checksum symbol
pub const CHECKSUM_ALPHABET: u32 = 256;
/// Alphabet of the pitch lag symbol
pub const PITCH_LAG_ALPHABET: u32 = (PITCH_MAX - PITCH_MIN + 1) as u32;

/// Sorted table of reconstruction levels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    levels: Vec<i32>,
}

impl LevelTable {
    /// `count` levels evenly spread over `lo..=hi`
    pub fn uniform(lo: i32, hi: i32, count: usize) -> Self {
        let count = count.max(2);
        let span = i64::from(hi) - i64::from(lo);
        let steps = count as i64 - 1;
        let levels = (0..count as i64)
            .map(|j| (i64::from(lo) + (span * j + steps / 2) / steps) as i32)
            .collect();
        Self { levels }
    }

    /// Mirror positive magnitudes around zero: `-m[n-1]..-m[0], 0, m[0]..m[n-1]`
    pub fn signed(magnitudes: &[i32]) -> Self {
        let levels = magnitudes
            .iter()
            .rev()
            .map(|&m| -m)
            .chain(std::iter::once(0))
            .chain(magnitudes.iter().copied())
            .collect();
        Self { levels }
    }

    /// Number of levels, i.e. the symbol alphabet size
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the nearest level, round-half-up, clamped to the table
    pub fn quantize(&self, value: i32) -> u32 {
        let upper = self.levels.partition_point(|&level| level < value);
        if upper == 0 {
            return 0;
        }
        if upper == self.levels.len() {
            return (self.levels.len() - 1) as u32;
        }
        let below = i64::from(value) - i64::from(self.levels[upper - 1]);
        let above = i64::from(self.levels[upper]) - i64::from(value);
        if below < above {
            (upper - 1) as u32
        } else {
            upper as u32
        }
    }

    /// Level for a symbol
    pub fn dequantize(&self, symbol: u32) -> Result<i32> {
        self.levels
            .get(symbol as usize)
            .copied()
            .ok_or(CodecError::InvalidSymbol {
                symbol,
                alphabet: self.levels.len() as u32,
            })
    }

    /// Snap a value onto the table
    pub fn snap(&self, value: i32) -> i32 {
        self.levels[self.quantize(value) as usize]
    }

    /// Largest gap between adjacent levels
    pub fn max_step(&self) -> i32 {
        self.levels
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Smallest level
    pub fn min(&self) -> i32 {
        self.levels.first().copied().unwrap_or(0)
    }

    /// Largest level
    pub fn max(&self) -> i32 {
        self.levels.last().copied().unwrap_or(0)
    }
}

/// Parameter class a symbol belongs to; keys the range coder model bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    /// Encoder quality estimate
    Quality,
    /// Reflection coefficient at the given index
    Reflection(usize),
    /// Pitch lag
    PitchLag,
    /// Quantized pitch gain
    PitchGain,
    /// Stochastic codebook entry
    CodebookIndex,
    /// Signed codebook gain
    CodebookGain,
    /// Frame checksum
    Checksum,
}

/// One position in the per-frame symbol stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSlot {
    pub class: SymbolClass,
    pub alphabet: u32,
}

/// Quantized excitation of one subframe
///
/// Bands without an adaptive codebook transmit neither pitch symbol; both
/// stay 0 here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubframeSymbols {
    pub pitch_lag: u32,
    pub pitch_gain: u32,
    pub codebook_index: u32,
    pub codebook_gain: u32,
}

/// Quantized parameters of one band
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSymbols {
    pub reflection: Vec<u32>,
    pub subframes: Vec<SubframeSymbols>,
}

/// Quantizer for the parameters of one band
///
/// Built once per configuration from the band's [`BandAllocation`]. The
/// band's symbol layout follows from it:
///
/// ```text
/// reflection 0..order | per subframe: [lag, gp] cb index, gc
/// ```
#[derive(Debug, Clone)]
pub struct ParameterQuantizer {
    reflection: Vec<LevelTable>,
    pitch_gain: Option<LevelTable>,
    codebook_gain: LevelTable,
    codebook_size: u32,
    subframes: usize,
}

impl ParameterQuantizer {
    /// Build the tables for a band of `band_len` samples
    ///
    /// The LPC order is `order` capped to what the allocation pays for.
    pub fn new(alloc: &BandAllocation, order: usize, band_len: usize) -> Self {
        let reflection = alloc
            .reflection_bits
            .iter()
            .take(order)
            .enumerate()
            .map(|(i, &bits)| {
                let count = (1usize << bits) - 1;
                LevelTable::uniform(-REFLECTION_RANGE[i], REFLECTION_RANGE[i], count)
            })
            .collect();

        let pitch_gain = alloc
            .has_pitch()
            .then(|| LevelTable::uniform(0, PITCH_GAIN_MAX, usize::from(alloc.pitch_gain_levels)));

        Self {
            reflection,
            pitch_gain,
            codebook_gain: LevelTable::signed(alloc.codebook_gain_magnitudes),
            codebook_size: alloc.codebook_size() as u32,
            subframes: alloc.subframes(band_len),
        }
    }

    /// LPC order this quantizer was built for
    pub fn order(&self) -> usize {
        self.reflection.len()
    }

    /// Excitation subframes per band frame
    pub fn subframes(&self) -> usize {
        self.subframes
    }

    /// Number of stochastic codebook entries
    pub fn codebook_size(&self) -> usize {
        self.codebook_size as usize
    }

    /// Level table of reflection coefficient `index`
    pub fn reflection_table(&self, index: usize) -> &LevelTable {
        &self.reflection[index]
    }

    /// Pitch gain level table (Q14), `None` without an adaptive codebook
    pub fn pitch_gain_table(&self) -> Option<&LevelTable> {
        self.pitch_gain.as_ref()
    }

    /// Codebook gain level table
    pub fn codebook_gain_table(&self) -> &LevelTable {
        &self.codebook_gain
    }

    /// Symbols per subframe
    fn subframe_width(&self) -> usize {
        if self.pitch_gain.is_some() {
            4
        } else {
            2
        }
    }

    /// Symbols of one band frame
    pub fn symbol_count(&self) -> usize {
        self.order() + self.subframes * self.subframe_width()
    }

    /// Symbol slots of one band, in stream order
    pub fn layout(&self) -> Vec<SymbolSlot> {
        let mut slots: Vec<SymbolSlot> = self
            .reflection
            .iter()
            .enumerate()
            .map(|(i, table)| SymbolSlot {
                class: SymbolClass::Reflection(i),
                alphabet: table.len() as u32,
            })
            .collect();
        for _ in 0..self.subframes {
            if let Some(pitch_gain) = &self.pitch_gain {
                slots.push(SymbolSlot {
                    class: SymbolClass::PitchLag,
                    alphabet: PITCH_LAG_ALPHABET,
                });
                slots.push(SymbolSlot {
                    class: SymbolClass::PitchGain,
                    alphabet: pitch_gain.len() as u32,
                });
            }
            slots.push(SymbolSlot {
                class: SymbolClass::CodebookIndex,
                alphabet: self.codebook_size,
            });
            slots.push(SymbolSlot {
                class: SymbolClass::CodebookGain,
                alphabet: self.codebook_gain.len() as u32,
            });
        }
        slots
    }

    /// Band symbols in stream order
    pub fn to_stream(&self, symbols: &BandSymbols) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.symbol_count());
        out.extend_from_slice(&symbols.reflection);
        for sub in &symbols.subframes {
            if self.pitch_gain.is_some() {
                out.extend_from_slice(&[sub.pitch_lag, sub.pitch_gain]);
            }
            out.extend_from_slice(&[sub.codebook_index, sub.codebook_gain]);
        }
        out
    }

    /// Rebuild band symbols from stream order
    pub fn from_stream(&self, stream: &[u32]) -> Result<BandSymbols> {
        if stream.len() != self.symbol_count() {
            return Err(CodecError::internal_error(format!(
                "band expects {} symbols, got {}",
                self.symbol_count(),
                stream.len()
            )));
        }
        let (reflection, rest) = stream.split_at(self.order());
        let subframes = rest
            .chunks_exact(self.subframe_width())
            .map(|chunk| match *chunk {
                [pitch_lag, pitch_gain, codebook_index, codebook_gain] => SubframeSymbols {
                    pitch_lag,
                    pitch_gain,
                    codebook_index,
                    codebook_gain,
                },
                [codebook_index, codebook_gain] => SubframeSymbols {
                    codebook_index,
                    codebook_gain,
                    ..Default::default()
                },
                _ => SubframeSymbols::default(),
            })
            .collect();
        Ok(BandSymbols {
            reflection: reflection.to_vec(),
            subframes,
        })
    }

    /// Map parameters to symbols, clamping out-of-range values
    ///
    /// Missing subframes quantize as silence.
    pub fn quantize(&self, params: &BandParameters) -> BandSymbols {
        let reflection = self
            .reflection
            .iter()
            .zip(params.reflection.iter().chain(std::iter::repeat(&0)))
            .map(|(table, &k)| table.quantize(i32::from(k)))
            .collect();

        let subframes = (0..self.subframes)
            .map(|i| {
                let exc = params
                    .subframes
                    .get(i)
                    .copied()
                    .unwrap_or_else(ExcitationParameters::silent);
                let (pitch_lag, pitch_gain) = match &self.pitch_gain {
                    Some(table) => {
                        let lag = usize::from(exc.pitch_lag).clamp(PITCH_MIN, PITCH_MAX);
                        ((lag - PITCH_MIN) as u32, table.quantize(exc.pitch_gain))
                    }
                    None => (0, 0),
                };
                SubframeSymbols {
                    pitch_lag,
                    pitch_gain,
                    codebook_index: exc.codebook_index.min(self.codebook_size - 1),
                    codebook_gain: self.codebook_gain.quantize(exc.codebook_gain),
                }
            })
            .collect();

        BandSymbols {
            reflection,
            subframes,
        }
    }

    /// Map symbols back to parameter values
    pub fn dequantize(&self, symbols: &BandSymbols) -> Result<BandParameters> {
        if symbols.reflection.len() != self.reflection.len()
            || symbols.subframes.len() != self.subframes
        {
            return Err(CodecError::internal_error(format!(
                "expected {} reflection and {} subframe symbols, got {} and {}",
                self.reflection.len(),
                self.subframes,
                symbols.reflection.len(),
                symbols.subframes.len()
            )));
        }
        let reflection = self
            .reflection
            .iter()
            .zip(&symbols.reflection)
            .map(|(table, &s)| table.dequantize(s).map(|k| k as i16))
            .collect::<Result<Vec<i16>>>()?;

        let subframes = symbols
            .subframes
            .iter()
            .map(|sub| self.dequantize_subframe(sub))
            .collect::<Result<Vec<_>>>()?;

        Ok(BandParameters {
            reflection,
            subframes,
        })
    }

    fn dequantize_subframe(&self, sub: &SubframeSymbols) -> Result<ExcitationParameters> {
        if sub.codebook_index >= self.codebook_size {
            return Err(CodecError::InvalidSymbol {
                symbol: sub.codebook_index,
                alphabet: self.codebook_size,
            });
        }
        let mut exc = ExcitationParameters {
            codebook_index: sub.codebook_index,
            codebook_gain: self.codebook_gain.dequantize(sub.codebook_gain)?,
            ..ExcitationParameters::silent()
        };
        if let Some(table) = &self.pitch_gain {
            if sub.pitch_lag >= PITCH_LAG_ALPHABET {
                return Err(CodecError::InvalidSymbol {
                    symbol: sub.pitch_lag,
                    alphabet: PITCH_LAG_ALPHABET,
                });
            }
            exc.pitch_lag = (sub.pitch_lag as usize + PITCH_MIN) as u16;
            exc.pitch_gain = table.dequantize(sub.pitch_gain)?;
        }
        Ok(exc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tables::BAND_TIERS;

    #[test]
    fn test_uniform_table_contains_zero() {
        for count in [3, 7, 15, 31, 63, 127] {
            let table = LevelTable::uniform(-32440, 32440, count);
            assert_eq!(table.len(), count);
            assert_eq!(table.min(), -32440);
            assert_eq!(table.max(), 32440);
            assert_eq!(table.snap(0), 0);
        }
    }

    #[test]
    fn test_round_half_up() {
        let table = LevelTable::uniform(0, 20, 3);
        assert_eq!(table.quantize(4), 0);
        assert_eq!(table.quantize(5), 1);
        assert_eq!(table.quantize(15), 2);
        assert_eq!(table.quantize(14), 1);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let table = LevelTable::uniform(-100, 100, 5);
        assert_eq!(table.quantize(i32::MIN), 0);
        assert_eq!(table.quantize(i32::MAX), 4);
    }

    #[test]
    fn test_signed_table() {
        let table = LevelTable::signed(&[8, 24, 75]);
        assert_eq!(table.len(), 7);
        assert_eq!(table.dequantize(3).unwrap(), 0);
        assert_eq!(table.dequantize(0).unwrap(), -75);
        assert_eq!(table.dequantize(6).unwrap(), 75);
        assert!(table.dequantize(7).is_err());
        assert_eq!(table.max_step(), 51);
    }

    #[test]
    fn test_layout_is_fixed_per_configuration() {
        let richest = &BAND_TIERS[17];
        let quantizer = ParameterQuantizer::new(richest, 16, 240);
        let layout = quantizer.layout();
        assert_eq!(quantizer.subframes(), 8);
        assert_eq!(layout.len(), 16 + 8 * 4);
        assert_eq!(layout.len(), quantizer.symbol_count());
        assert_eq!(layout[16].class, SymbolClass::PitchLag);
        assert_eq!(layout[16].alphabet, 141);
        assert_eq!(layout[17].alphabet, 32);
        assert_eq!(layout[18].alphabet as usize, richest.codebook_size());
        assert_eq!(layout[20].class, SymbolClass::PitchLag);

        // No adaptive codebook: two slots per subframe
        let quantizer = ParameterQuantizer::new(&BAND_TIERS[0], 16, 120);
        let layout = quantizer.layout();
        assert_eq!(quantizer.order(), 2);
        assert_eq!(layout.len(), 2 + 2);
        assert!(layout.iter().all(|slot| slot.class != SymbolClass::PitchLag
            && slot.class != SymbolClass::PitchGain));
        assert!(quantizer.pitch_gain_table().is_none());
    }

    #[test]
    fn test_order_capped_by_allocation() {
        assert_eq!(ParameterQuantizer::new(&BAND_TIERS[6], 16, 240).order(), 8);
        assert_eq!(ParameterQuantizer::new(&BAND_TIERS[17], 4, 8).order(), 4);
        assert_eq!(ParameterQuantizer::new(&BAND_TIERS[17], 4, 8).subframes(), 1);
    }

    #[test]
    fn test_quantize_dequantize_band() {
        let quantizer = ParameterQuantizer::new(&BAND_TIERS[9], 4, 240);
        let first = ExcitationParameters {
            pitch_lag: 57,
            pitch_gain: 12000,
            codebook_index: 99,
            codebook_gain: -300,
        };
        let params = BandParameters {
            reflection: vec![-30000, 12000, -500, 0],
            subframes: vec![first, ExcitationParameters::silent()],
        };
        let symbols = quantizer.quantize(&params);
        let restored = quantizer.dequantize(&symbols).unwrap();

        assert_eq!(restored.subframes.len(), 2);
        assert_eq!(restored.subframes[0].pitch_lag, 57);
        assert_eq!(restored.subframes[0].codebook_index, 99);
        assert_eq!(restored.subframes[1].codebook_gain, 0);
        for (i, (&a, &b)) in params.reflection.iter().zip(&restored.reflection).enumerate() {
            let step = quantizer.reflection_table(i).max_step();
            assert!((i32::from(a) - i32::from(b)).abs() <= step);
        }
        assert_eq!(quantizer.quantize(&restored), symbols);
    }

    #[test]
    fn test_band_without_pitch_ignores_pitch() {
        let quantizer = ParameterQuantizer::new(&BAND_TIERS[2], 4, 120);
        let mut params = BandParameters::silent(4, 1);
        params.subframes[0].pitch_lag = 90;
        params.subframes[0].pitch_gain = 16000;
        params.subframes[0].codebook_gain = 400;

        let symbols = quantizer.quantize(&params);
        assert_eq!(symbols.subframes[0].pitch_lag, 0);
        assert_eq!(symbols.subframes[0].pitch_gain, 0);

        let restored = quantizer.dequantize(&symbols).unwrap();
        assert_eq!(restored.subframes[0].pitch_lag as usize, PITCH_MIN);
        assert_eq!(restored.subframes[0].pitch_gain, 0);
        assert_eq!(restored.subframes[0].codebook_gain, 400);
    }

    #[test]
    fn test_out_of_range_lag_clamps() {
        let quantizer = ParameterQuantizer::new(&BAND_TIERS[4], 2, 240);
        let mut params = BandParameters::silent(2, 1);
        params.subframes[0].pitch_lag = 400;
        assert_eq!(quantizer.quantize(&params).subframes[0].pitch_lag, 140);
        params.subframes[0].pitch_lag = 3;
        assert_eq!(quantizer.quantize(&params).subframes[0].pitch_lag, 0);
    }

    #[test]
    fn test_band_symbols_stream_order() {
        let quantizer = ParameterQuantizer::new(&BAND_TIERS[7], 2, 240);
        let symbols = BandSymbols {
            reflection: vec![1, 2],
            subframes: vec![
                SubframeSymbols { pitch_lag: 3, pitch_gain: 4, codebook_index: 5, codebook_gain: 6 },
                SubframeSymbols { pitch_lag: 7, pitch_gain: 0, codebook_index: 8, codebook_gain: 9 },
            ],
        };
        let flat = quantizer.to_stream(&symbols);
        assert_eq!(flat, vec![1, 2, 3, 4, 5, 6, 7, 0, 8, 9]);
        assert_eq!(quantizer.from_stream(&flat).unwrap(), symbols);
        assert!(quantizer.from_stream(&flat[1..]).is_err());

        let plain = ParameterQuantizer::new(&BAND_TIERS[1], 2, 240);
        let flat = [1, 2, 5, 6];
        let parsed = plain.from_stream(&flat).unwrap();
        assert_eq!(parsed.subframes[0].codebook_index, 5);
        assert_eq!(plain.to_stream(&parsed), flat.to_vec());
    }
}
