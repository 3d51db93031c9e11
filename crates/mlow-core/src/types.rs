//! Core types and traits for the codec library
//!
//! This module defines the configuration surface of the codec: the
//! selector tables, the bandwidth modes and the [`AudioCodec`] trait used
//! for bulk frame processing.

use crate::error::{CodecError, Result};
use crate::quantizer::tables::{BandAllocation, BAND_TIERS};
use std::fmt;

/// Default input sample rate in Hz
pub const SAMPLE_RATE: u32 = 48_000;
/// Default frame size in samples
pub const FRAME_SIZE: usize = 480;
/// Maximum LPC order
pub const LPC_ORDER: usize = 16;
/// Number of bands produced by one QMF stage
pub const SUBBAND_COUNT: usize = 2;
/// Smallest accepted frame size
pub const MIN_FRAME_SIZE: usize = 16;
/// Largest accepted frame size
pub const MAX_FRAME_SIZE: usize = 960;
/// Shortest pitch lag searched, in band samples
pub const PITCH_MIN: usize = 20;
/// Longest pitch lag searched, in band samples
pub const PITCH_MAX: usize = 160;

/// Primary trait for audio codecs
///
/// This trait defines the core operations of a frame-oriented codec:
/// encoding, decoding, and state management.
pub trait AudioCodec: Send + Sync {
    /// Encode one frame of 16-bit PCM into a packet
    ///
    /// # Errors
    ///
    /// Returns an error if the frame length does not match the
    /// configured frame size.
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>>;

    /// Decode one packet into a frame of 16-bit PCM
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedBitstream`] for truncated or
    /// corrupted packets. Decoder state is left untouched in that case.
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>>;

    /// Get codec information
    fn info(&self) -> CodecInfo;

    /// Reset codec state
    ///
    /// This clears filter memories, excitation history and the QMF delay
    /// lines so the next frame is processed as the start of a stream.
    fn reset(&mut self) -> Result<()>;

    /// Get the expected frame size in samples
    fn frame_size(&self) -> usize;
}

/// Audio codec information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    /// Codec name
    pub name: &'static str,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Frame size in samples
    pub frame_size: usize,
    /// Bandwidth mode
    pub bandwidth: BandwidthMode,
}

/// Direction of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodecMode {
    /// Samples in, packets out
    #[default]
    Encode,
    /// Packets in, samples out
    Decode,
}

impl CodecMode {
    /// Map the control flag (`true` = encode) to a mode
    pub fn from_flag(encode: bool) -> Self {
        if encode {
            Self::Encode
        } else {
            Self::Decode
        }
    }

    /// Check if this is the encode direction
    pub fn is_encode(self) -> bool {
        self == Self::Encode
    }
}

/// Bandwidth mode selected by `bandwidth_sel`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandwidthMode {
    /// 0-4 kHz, low band only
    NarrowBand,
    /// 0-8 kHz, low and high band
    WideBand,
    /// 0-16 kHz, high band split again into two quarter bands
    SuperWideBand,
}

impl BandwidthMode {
    /// Resolve a 2-bit selector
    pub fn from_sel(sel: u8) -> Result<Self> {
        match sel {
            0 => Ok(Self::NarrowBand),
            1 => Ok(Self::WideBand),
            2 => Ok(Self::SuperWideBand),
            other => Err(CodecError::invalid_configuration(format!(
                "bandwidth_sel {} is not one of 0 (NB), 1 (WB), 2 (SWB)",
                other
            ))),
        }
    }

    /// Selector value
    pub fn sel(self) -> u8 {
        match self {
            Self::NarrowBand => 0,
            Self::WideBand => 1,
            Self::SuperWideBand => 2,
        }
    }

    /// Number of bands the filterbank produces
    pub fn band_count(self) -> usize {
        match self {
            Self::NarrowBand | Self::WideBand => SUBBAND_COUNT,
            Self::SuperWideBand => SUBBAND_COUNT + 1,
        }
    }

    /// Number of bands carried in the bitstream
    pub fn coded_band_count(self) -> usize {
        match self {
            Self::NarrowBand => 1,
            Self::WideBand => 2,
            Self::SuperWideBand => 3,
        }
    }

    /// Length of each band for a frame of `frame_size` samples
    pub fn band_lengths(self, frame_size: usize) -> Vec<usize> {
        let half = frame_size / SUBBAND_COUNT;
        match self {
            Self::NarrowBand | Self::WideBand => vec![half, half],
            Self::SuperWideBand => vec![half, half / SUBBAND_COUNT, half / SUBBAND_COUNT],
        }
    }

    /// Upper band edge in Hz
    pub fn upper_edge_hz(self) -> u32 {
        match self {
            Self::NarrowBand => 4_000,
            Self::WideBand => 8_000,
            Self::SuperWideBand => 16_000,
        }
    }
}

impl fmt::Display for BandwidthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NarrowBand => write!(f, "NB"),
            Self::WideBand => write!(f, "WB"),
            Self::SuperWideBand => write!(f, "SWB"),
        }
    }
}

/// Sample rate enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleRate {
    /// 8 kHz
    Rate8000,
    /// 16 kHz
    Rate16000,
    /// 32 kHz
    Rate32000,
    /// 48 kHz
    #[default]
    Rate48000,
}

impl SampleRate {
    /// Get the sample rate value in Hz
    pub fn hz(self) -> u32 {
        match self {
            Self::Rate8000 => 8000,
            Self::Rate16000 => 16000,
            Self::Rate32000 => 32000,
            Self::Rate48000 => 48000,
        }
    }

    /// Create from Hz value
    pub fn from_hz(hz: u32) -> Result<Self> {
        match hz {
            8000 => Ok(Self::Rate8000),
            16000 => Ok(Self::Rate16000),
            32000 => Ok(Self::Rate32000),
            48000 => Ok(Self::Rate48000),
            rate => Err(CodecError::invalid_configuration(format!(
                "sample rate {}Hz (supported: 8000, 16000, 32000, 48000)",
                rate
            ))),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.hz())
    }
}

/// Probability model policy for the range coder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelPolicy {
    /// Fixed per-bitrate frequency tables
    #[default]
    Static,
    /// Frequencies updated after each symbol, reset every frame
    Adaptive,
}

impl ModelPolicy {
    /// Header bit
    pub fn bit(self) -> u8 {
        match self {
            Self::Static => 0,
            Self::Adaptive => 1,
        }
    }

    /// Create from header bit
    pub fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Self::Static
        } else {
            Self::Adaptive
        }
    }
}

/// One entry of the bitrate table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateConfig {
    /// Selector value
    pub selector: u8,
    /// Nominal bitrate in bits per second
    pub target_bitrate: u32,
    /// Quality reported for frames with no signal energy
    pub quality_target: u8,
    /// [`BAND_TIERS`] index of each coded band, per bandwidth selector
    pub band_tiers: [&'static [u8]; 3],
}

/// Selector to bitrate/quality table
///
/// Tiers are chosen so a 480-sample frame spends about
/// `target_bitrate / 100` bits of payload in every bandwidth mode.
pub static BITRATE_TABLE: [BitrateConfig; 8] = [
    BitrateConfig { selector: 0, target_bitrate: 6_000, quality_target: 60, band_tiers: [&[6], &[5, 1], &[4, 0, 0]] },
    BitrateConfig { selector: 1, target_bitrate: 8_000, quality_target: 65, band_tiers: [&[7], &[6, 4], &[6, 1, 1]] },
    BitrateConfig { selector: 2, target_bitrate: 12_000, quality_target: 70, band_tiers: [&[10], &[9, 5], &[8, 3, 3]] },
    BitrateConfig { selector: 3, target_bitrate: 16_000, quality_target: 75, band_tiers: [&[12], &[10, 6], &[9, 6, 5]] },
    BitrateConfig { selector: 4, target_bitrate: 20_000, quality_target: 80, band_tiers: [&[14], &[12, 6], &[11, 6, 6]] },
    BitrateConfig { selector: 5, target_bitrate: 24_000, quality_target: 85, band_tiers: [&[15], &[13, 8], &[12, 7, 7]] },
    BitrateConfig { selector: 6, target_bitrate: 28_000, quality_target: 90, band_tiers: [&[16], &[14, 9], &[14, 6, 6]] },
    BitrateConfig { selector: 7, target_bitrate: 32_000, quality_target: 95, band_tiers: [&[17], &[15, 9], &[14, 10, 10]] },
];

impl BitrateConfig {
    /// Resolve a 4-bit selector
    pub fn lookup(sel: u8) -> Result<&'static Self> {
        BITRATE_TABLE.get(sel as usize).ok_or_else(|| {
            CodecError::invalid_configuration(format!(
                "bitrate_sel {} has no table entry (defined: 0-{})",
                sel,
                BITRATE_TABLE.len() - 1
            ))
        })
    }

    /// Allocation of each band `mode` codes, lowest band first
    pub fn band_allocations(&self, mode: BandwidthMode) -> Result<Vec<&'static BandAllocation>> {
        let tiers = self.band_tiers[usize::from(mode.sel())];
        if tiers.len() != mode.coded_band_count() {
            return Err(CodecError::internal_error(format!(
                "bitrate {} plans {} bands for {}",
                self.selector,
                tiers.len(),
                mode
            )));
        }
        tiers
            .iter()
            .map(|&tier| {
                BAND_TIERS.get(usize::from(tier)).ok_or_else(|| {
                    CodecError::internal_error(format!("no allocation tier {}", tier))
                })
            })
            .collect()
    }
}

/// Codec configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Pipeline direction
    pub mode: CodecMode,
    /// Index into [`BITRATE_TABLE`]
    pub bitrate_sel: u8,
    /// Bandwidth selector (0 = NB, 1 = WB, 2 = SWB)
    pub bandwidth_sel: u8,
    /// Input/output sample rate
    pub sample_rate: SampleRate,
    /// Samples per frame
    pub frame_size: usize,
    /// Maximum LPC order per band
    pub lpc_order: usize,
    /// Range coder probability model policy
    pub model_policy: ModelPolicy,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mode: CodecMode::Encode,
            bitrate_sel: 3,
            bandwidth_sel: 1,
            sample_rate: SampleRate::Rate48000,
            frame_size: FRAME_SIZE,
            lpc_order: LPC_ORDER,
            model_policy: ModelPolicy::Static,
        }
    }
}

impl CodecConfig {
    /// Create a configuration for the given selectors
    pub fn new(bitrate_sel: u8, bandwidth_sel: u8) -> Self {
        Self {
            bitrate_sel,
            bandwidth_sel,
            ..Self::default()
        }
    }

    /// Set pipeline direction
    pub fn with_mode(mut self, mode: CodecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set bitrate selector
    pub fn with_bitrate_sel(mut self, sel: u8) -> Self {
        self.bitrate_sel = sel;
        self
    }

    /// Set bandwidth selector
    pub fn with_bandwidth_sel(mut self, sel: u8) -> Self {
        self.bandwidth_sel = sel;
        self
    }

    /// Set sample rate
    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set frame size in samples
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Set maximum LPC order
    pub fn with_lpc_order(mut self, order: usize) -> Self {
        self.lpc_order = order;
        self
    }

    /// Set probability model policy
    pub fn with_model_policy(mut self, policy: ModelPolicy) -> Self {
        self.model_policy = policy;
        self
    }

    /// Resolve the bitrate selector
    pub fn bitrate(&self) -> Result<&'static BitrateConfig> {
        BitrateConfig::lookup(self.bitrate_sel)
    }

    /// Resolve the bandwidth selector
    pub fn bandwidth(&self) -> Result<BandwidthMode> {
        BandwidthMode::from_sel(self.bandwidth_sel)
    }

    /// LPC order used for a band of `band_len` samples
    pub fn effective_order(&self, band_len: usize) -> usize {
        self.lpc_order.min(band_len / 2).max(1)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.bitrate()?;
        let bandwidth = self.bandwidth()?;

        if self.sample_rate.hz() < 2 * bandwidth.upper_edge_hz() {
            return Err(CodecError::invalid_configuration(format!(
                "{} needs at least {} Hz, configured for {}",
                bandwidth,
                2 * bandwidth.upper_edge_hz(),
                self.sample_rate
            )));
        }

        if self.frame_size < MIN_FRAME_SIZE
            || self.frame_size > MAX_FRAME_SIZE
            || self.frame_size % (SUBBAND_COUNT * SUBBAND_COUNT) != 0
        {
            return Err(CodecError::invalid_configuration(format!(
                "frame size {} must be a multiple of 4 in {}..={}",
                self.frame_size, MIN_FRAME_SIZE, MAX_FRAME_SIZE
            )));
        }

        if self.lpc_order == 0 || self.lpc_order > LPC_ORDER {
            return Err(CodecError::invalid_configuration(format!(
                "LPC order {} outside 1..={}",
                self.lpc_order, LPC_ORDER
            )));
        }

        Ok(())
    }
}
