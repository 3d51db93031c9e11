//! Controller states and status outputs

use crate::error::ErrorKind;
use crate::types::CodecMode;
use std::fmt;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    /// Between frames, waiting for a full input frame or packet
    #[default]
    Idle,
    /// Validating a requested configuration
    Configuring,
    /// Running the codec on the frame in flight
    Processing,
    /// Handing an encoded packet to the consumer
    Emitting,
    /// Handing decoded samples to the consumer
    Draining,
    /// Holding a configuration error until reset or a valid configuration
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Processing => "Processing",
            Self::Emitting => "Emitting",
            Self::Draining => "Draining",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Control inputs sampled at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlConfig {
    /// Encode or decode
    pub mode: CodecMode,
    /// 4-bit bitrate selector
    pub bitrate_sel: u8,
    /// 2-bit bandwidth selector
    pub bandwidth_sel: u8,
}

impl ControlConfig {
    /// Build from the raw control signals
    pub fn new(encode_mode: bool, bitrate_sel: u8, bandwidth_sel: u8) -> Self {
        Self {
            mode: CodecMode::from_flag(encode_mode),
            bitrate_sel,
            bandwidth_sel,
        }
    }
}

/// Status outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Asserted exactly while a frame is being processed
    pub busy: bool,
    /// Asserted from a configuration or bitstream error until cleared
    pub error: bool,
    /// What raised `error`
    pub error_kind: Option<ErrorKind>,
    /// Quality of the last frame, 0..=100
    pub quality_metric: u8,
    /// Controller state
    pub state: PipelineState,
}

/// Whether a [`tick`](super::PipelineController::tick) changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The controller moved to another state
    Advanced,
    /// Waiting on a producer or consumer
    Stalled,
}
