//! Error types for encoding and decoding.
//!
//! Every failure is reported through [`CodecError`]. Callers that only care
//! about the broad class of a failure can use [`CodecError::kind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or parsing a stream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The stream does not start with the container signature.
    #[error("Bad signature: not a stillpix stream")]
    BadSignature,

    /// The stream is shorter (or longer) than its header declares.
    #[error("Truncated or corrupt stream: header declares {declared} payload bytes, found {actual}")]
    TruncatedOrCorrupt { declared: usize, actual: usize },

    /// A header byte holds a value with no meaning.
    #[error("Unknown {field} tag: {value}")]
    UnknownTag { field: &'static str, value: u8 },

    /// Width or height is zero.
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel buffer length doesn't match the declared dimensions and format.
    #[error("Invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Lossy quality outside 0-100.
    #[error("Invalid quality {0}: must be within 0-100")]
    InvalidQuality(f32),

    /// Dimensions are valid but larger than the configured limits allow.
    #[error("Image {width}x{height} exceeds limit of {max_width}x{max_height}")]
    LimitExceeded {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// Buffer size arithmetic on width * height would overflow.
    #[error("Dimension overflow: {width}x{height} does not fit in addressable memory")]
    DimensionOverflow { width: u32, height: u32 },

    /// The payload is inconsistent with its own header or tables.
    #[error("Corrupt bitstream: {0}")]
    CorruptBitstream(String),

    /// The bitstream ran out before a read completed.
    #[error("Bitstream underrun: requested {requested} bits, {remaining} remaining")]
    Underrun { requested: u32, remaining: usize },
}

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad input shape: lengths, parameters, malformed headers.
    Validation,
    /// Payload inconsistent with its header or tables.
    CorruptBitstream,
    /// Bitstream exhausted prematurely.
    Underrun,
    /// Size arithmetic would overflow.
    DimensionOverflow,
}

impl CodecError {
    /// Get the failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::BadSignature
            | CodecError::UnknownTag { .. }
            | CodecError::InvalidDimensions { .. }
            | CodecError::InvalidPixelData { .. }
            | CodecError::InvalidQuality(_)
            | CodecError::LimitExceeded { .. } => ErrorKind::Validation,
            CodecError::TruncatedOrCorrupt { .. } | CodecError::CorruptBitstream(_) => {
                ErrorKind::CorruptBitstream
            }
            CodecError::Underrun { .. } => ErrorKind::Underrun,
            CodecError::DimensionOverflow { .. } => ErrorKind::DimensionOverflow,
        }
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        CodecError::CorruptBitstream(msg.into())
    }
}
