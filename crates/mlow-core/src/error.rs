//! Error handling for the codec library
//!
//! Structural failures (bad configuration, malformed packets, misuse of
//! the frame buffer) are reported through [`CodecError`]. Numeric trouble
//! inside the DSP path, such as an unstable LPC filter, is absorbed locally
//! and only shows up in the quality metric.

#![allow(missing_docs)]

use std::fmt;
use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Error type for codec operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Selector or parameter outside the defined tables
    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    /// A frame was requested before the buffer filled
    #[error("Incomplete frame: expected {expected} samples, have {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// Packet bytes are truncated, corrupted or inconsistent
    #[error("Malformed bitstream: {reason}")]
    MalformedBitstream { reason: String },

    /// Sample pushed while the buffer is full
    #[error("Buffer overflow: buffer of {capacity} samples is full")]
    BufferOverflow { capacity: usize },

    /// Input slice length does not match the configured frame size
    #[error("Invalid frame size: expected {expected}, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// Symbol outside its model's alphabet
    #[error("Invalid symbol: {symbol} not in alphabet of {alphabet}")]
    InvalidSymbol { symbol: u32, alphabet: u32 },

    /// Operation not allowed in the current state
    #[error("Invalid state: {operation} not allowed while {state}")]
    InvalidState { operation: String, state: String },

    /// I/O operation failed
    #[error("I/O operation failed: {reason}")]
    IoError { reason: String },

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {message} (this is a bug, please report it)")]
    InternalError { message: String },
}

impl CodecError {
    /// Create a new invalid configuration error
    pub fn invalid_configuration(details: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            details: details.into(),
        }
    }

    /// Create a new malformed bitstream error
    pub fn malformed_bitstream(reason: impl Into<String>) -> Self {
        Self::MalformedBitstream {
            reason: reason.into(),
        }
    }

    /// Create a new invalid state error
    pub fn invalid_state(operation: impl Into<String>, state: impl fmt::Debug) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state: format!("{:?}", state),
        }
    }

    /// Create a new internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors affect a single frame; the codec keeps running
    /// once the caller drops the offending input.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidConfiguration { .. } | Self::InternalError { .. } => false,

            Self::IncompleteFrame { .. }
            | Self::MalformedBitstream { .. }
            | Self::BufferOverflow { .. }
            | Self::InvalidFrameSize { .. }
            | Self::InvalidSymbol { .. }
            | Self::InvalidState { .. }
            | Self::IoError { .. } => true,
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfiguration { .. } => ErrorCategory::Configuration,

            Self::InvalidFrameSize { .. }
            | Self::InvalidSymbol { .. }
            | Self::MalformedBitstream { .. } => ErrorCategory::Processing,

            Self::IncompleteFrame { .. } | Self::BufferOverflow { .. } => ErrorCategory::Memory,

            Self::InvalidState { .. } => ErrorCategory::Sequencing,

            Self::IoError { .. } => ErrorCategory::Io,

            Self::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    /// Get the fieldless discriminant used by status reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration { .. } => ErrorKind::InvalidConfiguration,
            Self::IncompleteFrame { .. } => ErrorKind::IncompleteFrame,
            Self::MalformedBitstream { .. } => ErrorKind::MalformedBitstream,
            Self::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            Self::InvalidFrameSize { .. } => ErrorKind::InvalidFrameSize,
            Self::InvalidSymbol { .. } => ErrorKind::InvalidSymbol,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::IoError { .. } => ErrorKind::Io,
            Self::InternalError { .. } => ErrorKind::Internal,
        }
    }
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration and parameter errors
    Configuration,
    /// Audio or bitstream processing errors
    Processing,
    /// Buffer management errors
    Memory,
    /// Calls made in the wrong pipeline state
    Sequencing,
    /// I/O related errors
    Io,
    /// Internal library errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Processing => write!(f, "Processing"),
            Self::Memory => write!(f, "Memory"),
            Self::Sequencing => write!(f, "Sequencing"),
            Self::Io => write!(f, "I/O"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Copyable error discriminant latched by the pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    IncompleteFrame,
    MalformedBitstream,
    BufferOverflow,
    InvalidFrameSize,
    InvalidSymbol,
    InvalidState,
    Io,
    Internal,
}

/// Convert from I/O errors
impl From<std::io::Error> for CodecError {
    fn from(error: std::io::Error) -> Self {
        Self::IoError {
            reason: error.to_string(),
        }
    }
}
