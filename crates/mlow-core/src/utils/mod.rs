//! Utility functions shared by the codec and its tools

pub mod pcm;
pub mod validation;

pub use pcm::{into_frames, samples_from_le_bytes, samples_to_le_bytes};
pub use validation::*;
