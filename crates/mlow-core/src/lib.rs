//! # MLOW-Core: Split-Band CELP Speech Codec
//!
//! A fixed-point speech codec core built from the stages of a split-band
//! CELP coder, sequenced one frame at a time by a pipeline controller with
//! explicit backpressure.
//!
//! ## Components
//!
//! - **Frame Buffer**: collects samples into frames and drains decoded frames
//! - **Filterbank**: G.722-style half-band QMF, one or two stages per mode
//! - **CELP**: LPC analysis, adaptive and stochastic excitation search, synthesis
//! - **Quantizer**: per-bitrate tables mapping parameters to symbols
//! - **Range Coder**: carry-propagating range coder with static or adaptive models
//! - **Pipeline**: tick-driven controller with `busy`, `error` and `quality_metric`
//!
//! ## Usage
//!
//! ```rust
//! use mlow_core::{AudioCodec, CodecConfig, MlowCodec};
//!
//! // 16 kbps, wideband, 10 ms frames at 48 kHz
//! let config = CodecConfig::new(3, 1);
//! let mut codec = MlowCodec::new(config)?;
//!
//! let samples = vec![0i16; 480];
//! let packet = codec.encode(&samples)?;
//! let decoded = codec.decode(&packet)?;
//! assert_eq!(decoded.len(), 480);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The [`pipeline::PipelineController`] drives the same encoder and decoder
//! sample by sample and byte by byte.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod celp;
pub mod codec;
pub mod error;
pub mod filterbank;
pub mod frame_buffer;
pub mod math;
pub mod packet;
pub mod pipeline;
pub mod quality;
pub mod quantizer;
pub mod range_coder;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use codec::{DecodedFrame, EncodedFrame, MlowCodec, MlowDecoder, MlowEncoder};
pub use error::{CodecError, ErrorKind, Result};
pub use frame_buffer::{FrameBuffer, PushOutcome};
pub use packet::{Packet, PacketByte, PacketHeader};
pub use pipeline::{ControlConfig, PipelineController, PipelineState, Status};
pub use types::{
    AudioCodec, BandwidthMode, BitrateConfig, CodecConfig, CodecInfo, CodecMode, ModelPolicy,
    SampleRate,
};

/// Version information for the codec library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the codec library
///
/// Installs a `tracing` subscriber if none is set and builds the
/// stochastic codebook. Safe to call more than once.
///
/// # Errors
///
/// Returns an error if the codebook cannot be built
pub fn init() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    if celp::codebook::codeword(0, 1).is_none() {
        return Err(CodecError::internal_error("stochastic codebook is empty"));
    }

    tracing::info!("MLOW-Core v{} initialized", VERSION);
    tracing::info!("Bitrates: {:?}", info().bitrates);

    Ok(())
}

/// Get library information
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        bitrates: types::BITRATE_TABLE.iter().map(|c| c.target_bitrate).collect(),
        bandwidths: vec![
            BandwidthMode::NarrowBand,
            BandwidthMode::WideBand,
            BandwidthMode::SuperWideBand,
        ],
    }
}

/// Library information structure
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    /// Library version
    pub version: &'static str,
    /// Target bitrate of each selector, in bits per second
    pub bitrates: Vec<u32>,
    /// Supported bandwidth modes
    pub bandwidths: Vec<BandwidthMode>,
}
