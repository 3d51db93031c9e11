//! Split-band filterbank
//!
//! Wraps one or two QMF stages according to the bandwidth mode:
//!
//! - NarrowBand and WideBand split the frame once into a low and a high
//!   band at half rate. NarrowBand codes only the low band; its high band
//!   is synthesized from silence.
//! - SuperWideBand splits the high band again into two quarter-rate bands.
//!   On synthesis the low band is held back by [`QMF_DELAY`] half-rate
//!   samples so it lines up with the slower two-stage high path.
//!
//! Analysis followed by synthesis with no quantization reproduces the input
//! delayed by [`FilterbankState::delay`] samples, within
//! [`ROUND_TRIP_TOLERANCE`] for inputs bounded by half of full scale.

pub mod qmf;
pub mod tables;

pub use qmf::{QmfAnalysis, QmfSynthesis};
pub use tables::{CASCADE_DELAY, QMF_DELAY, ROUND_TRIP_TOLERANCE};

use crate::error::{CodecError, Result};
use crate::types::{BandwidthMode, SUBBAND_COUNT};
use crate::utils::validation::validate_band_split;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Band signals of one frame, lowest band first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subbands {
    mode: BandwidthMode,
    bands: Vec<Vec<i16>>,
}

impl Subbands {
    /// Assemble bands for `mode`; lengths must match [`BandwidthMode::band_lengths`]
    pub fn new(mode: BandwidthMode, bands: Vec<Vec<i16>>) -> Result<Self> {
        if bands.len() != mode.band_count() {
            return Err(CodecError::invalid_configuration(format!(
                "{} needs {} bands, got {}",
                mode,
                mode.band_count(),
                bands.len()
            )));
        }
        let expected = mode.band_lengths(bands[0].len() * SUBBAND_COUNT);
        if bands.iter().map(Vec::len).ne(expected.iter().copied()) {
            return Err(CodecError::internal_error(format!(
                "band lengths {:?} do not fit {}",
                bands.iter().map(Vec::len).collect::<Vec<_>>(),
                mode
            )));
        }
        Ok(Self { mode, bands })
    }

    /// Bandwidth mode the bands were produced for
    pub fn mode(&self) -> BandwidthMode {
        self.mode
    }

    /// All bands, lowest first
    pub fn bands(&self) -> &[Vec<i16>] {
        &self.bands
    }

    /// Bands carried in the bitstream for this mode
    pub fn coded(&self) -> &[Vec<i16>] {
        &self.bands[..self.mode.coded_band_count()]
    }
}

/// Filter memories for one direction of the filterbank
#[derive(Debug, Clone)]
pub struct FilterbankState {
    mode: BandwidthMode,
    first: (QmfAnalysis, QmfSynthesis),
    second: (QmfAnalysis, QmfSynthesis),
    low_delay: VecDeque<i16>,
}

impl FilterbankState {
    /// Create the filterbank for a bandwidth selector
    pub fn new(bandwidth_sel: u8) -> Result<Self> {
        let mode = BandwidthMode::from_sel(bandwidth_sel)?;
        debug!("Creating {} filterbank", mode);
        Ok(Self::with_mode(mode))
    }

    /// Create the filterbank for a resolved mode
    pub fn with_mode(mode: BandwidthMode) -> Self {
        Self {
            mode,
            first: (QmfAnalysis::new(), QmfSynthesis::new()),
            second: (QmfAnalysis::new(), QmfSynthesis::new()),
            low_delay: std::iter::repeat(0).take(QMF_DELAY).collect(),
        }
    }

    /// Bandwidth mode
    pub fn mode(&self) -> BandwidthMode {
        self.mode
    }

    /// Full-rate delay from analysis input to synthesis output
    pub fn delay(&self) -> usize {
        match self.mode {
            BandwidthMode::NarrowBand | BandwidthMode::WideBand => QMF_DELAY,
            BandwidthMode::SuperWideBand => CASCADE_DELAY,
        }
    }

    /// Clear every delay line
    pub fn reset(&mut self) {
        *self = Self::with_mode(self.mode);
    }

    /// Split a frame into its bands
    pub fn analyze(&mut self, frame: &[i16]) -> Result<Subbands> {
        validate_band_split(frame.len(), 2)?;
        let (low, high) = self.first.0.analyze(frame);
        let bands = match self.mode {
            BandwidthMode::NarrowBand | BandwidthMode::WideBand => vec![low, high],
            BandwidthMode::SuperWideBand => {
                let (upper_low, upper_high) = self.second.0.analyze(&high);
                vec![low, upper_low, upper_high]
            }
        };
        trace!("{} analysis: {} samples -> {} bands", self.mode, frame.len(), bands.len());
        Subbands::new(self.mode, bands)
    }

    /// Merge bands back into a frame
    pub fn synthesize(&mut self, subbands: &Subbands) -> Result<Vec<i16>> {
        if subbands.mode() != self.mode {
            return Err(CodecError::invalid_configuration(format!(
                "{} bands given to {} filterbank",
                subbands.mode(),
                self.mode
            )));
        }
        let bands = subbands.bands();
        let out = match self.mode {
            BandwidthMode::NarrowBand | BandwidthMode::WideBand => {
                self.first.1.synthesize(&bands[0], &bands[1])
            }
            BandwidthMode::SuperWideBand => {
                let high = self.second.1.synthesize(&bands[1], &bands[2]);
                let low: Vec<i16> = bands[0]
                    .iter()
                    .map(|&s| {
                        self.low_delay.push_back(s);
                        self.low_delay.pop_front().unwrap_or(0)
                    })
                    .collect();
                self.first.1.synthesize(&low, &high)
            }
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                let t = i as f64 / 48000.0;
                (9000.0 * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()
                    + 5000.0 * (2.0 * std::f64::consts::PI * 13000.0 * t).sin()) as i16
            })
            .collect()
    }

    fn assert_round_trip(mode: BandwidthMode, frame_size: usize) {
        let input = tone(frame_size * 8);
        let mut fb = FilterbankState::with_mode(mode);
        let mut output = Vec::new();
        for frame in input.chunks(frame_size) {
            let bands = fb.analyze(frame).unwrap();
            output.extend(fb.synthesize(&bands).unwrap());
        }
        let delay = fb.delay();
        for i in 0..input.len() - delay {
            let err = (i32::from(output[i + delay]) - i32::from(input[i])).abs();
            assert!(err <= ROUND_TRIP_TOLERANCE, "{} sample {} off by {}", mode, i, err);
        }
    }

    #[test]
    fn test_wideband_round_trip() {
        assert_round_trip(BandwidthMode::WideBand, 480);
        assert_round_trip(BandwidthMode::WideBand, 16);
    }

    #[test]
    fn test_narrowband_round_trip() {
        assert_round_trip(BandwidthMode::NarrowBand, 160);
    }

    #[test]
    fn test_superwideband_round_trip() {
        assert_round_trip(BandwidthMode::SuperWideBand, 480);
        assert_round_trip(BandwidthMode::SuperWideBand, 16);
    }

    #[test]
    fn test_band_layout() {
        let mut fb = FilterbankState::new(2).unwrap();
        let bands = fb.analyze(&[0; 480]).unwrap();
        let lens: Vec<usize> = bands.bands().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![240, 120, 120]);
        assert_eq!(bands.coded().len(), 3);

        let mut fb = FilterbankState::new(0).unwrap();
        let bands = fb.analyze(&[0; 480]).unwrap();
        assert_eq!(bands.bands().len(), 2);
        assert_eq!(bands.coded().len(), 1);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(matches!(
            FilterbankState::new(3),
            Err(CodecError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_odd_frame_rejected() {
        let mut fb = FilterbankState::with_mode(BandwidthMode::WideBand);
        assert!(fb.analyze(&[0; 10]).is_err());
        assert!(fb.analyze(&[]).is_err());
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let mut wb = FilterbankState::with_mode(BandwidthMode::WideBand);
        let mut swb = FilterbankState::with_mode(BandwidthMode::SuperWideBand);
        let bands = swb.analyze(&[0; 64]).unwrap();
        assert!(wb.synthesize(&bands).is_err());
    }
}
