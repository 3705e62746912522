//! Stillpix Core - RGB/RGBA still-image codec
//!
//! This crate encodes 8-bit RGB and RGBA images into a compact
//! self-describing byte stream and decodes them back. Two engines are
//! available:
//!
//! - **Lossy**: YCbCr conversion, 8x8 DCT, quality-driven quantization,
//!   Huffman coding and a deblocking filter on decode.
//! - **Lossless**: palette substitution or subtract-green decorrelation,
//!   per-tile spatial prediction and Huffman coding. Byte-exact.
//!
//! # Example
//!
//! ```ignore
//! use stillpix_core::{decode, encode, CodecMode, Image, PixelFormat};
//!
//! let image = Image::new(2, 2, PixelFormat::Rgb24, vec![0; 12])?;
//! let bytes = encode(&image, CodecMode::Lossless)?;
//! assert_eq!(decode(&bytes)?, image);
//! ```
//!
//! All calls are synchronous and keep no state between invocations.

pub mod bitio;
pub mod codec;
pub mod config;
pub mod container;
pub mod entropy;
pub mod error;
pub mod lossless;
pub mod lossy;
pub mod types;

pub use codec::{
    decode, decode_as, decode_as_with_config, decode_with_config, encode, encode_with_config,
    get_info,
};
pub use config::{CodecConfig, Limits, DEFAULT_MAX_DIMENSION};
pub use container::{FrameHeader, HEADER_LEN, MAGIC};
pub use error::{CodecError, ErrorKind, Result};
pub use lossy::QuantizationProfile;
pub use types::{CodecMode, Image, ImageInfo, PixelFormat, StreamKind};
