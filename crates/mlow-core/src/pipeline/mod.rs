//! Frame pipeline controller
//!
//! Sequences frame buffer, codec and packet I/O one frame at a time and
//! turns component results into the `busy`, `error` and `quality_metric`
//! status outputs. Flow control follows a ready/valid discipline: every
//! push reports whether it was accepted, and nothing is ever dropped
//! while a consumer is slow.

pub mod controller;
pub mod status;

pub use controller::{PipelineController, MAX_PACKET_BYTES};
pub use status::{ControlConfig, PipelineState, Progress, Status};
