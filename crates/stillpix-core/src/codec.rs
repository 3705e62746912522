//! Top-level encode/decode entry points.
//!
//! Every call is self-contained: it validates its input, runs one engine,
//! and returns an owned result or a [`CodecError`]. Nothing is cached
//! between calls, so all functions are safe to call from many threads.
//!
//! [`CodecError`]: crate::error::CodecError

use tracing::{debug, warn};

use crate::config::CodecConfig;
use crate::container::{self, FrameHeader};
use crate::error::Result;
use crate::types::{CodecMode, Image, ImageInfo, PixelFormat, StreamKind};
use crate::{lossless, lossy};

/// Encode an image with the default configuration.
///
/// # Arguments
///
/// * `image` - The image to encode
/// * `mode` - Lossy (with quality 0-100) or lossless
///
/// # Errors
///
/// * `InvalidQuality` if a lossy quality is outside 0-100
/// * `LimitExceeded` if the image is larger than the default limits
pub fn encode(image: &Image, mode: CodecMode) -> Result<Vec<u8>> {
    encode_with_config(image, mode, &CodecConfig::default())
}

/// Encode an image with an explicit configuration.
///
/// # Errors
///
/// See [`encode`]. Additionally returns `DimensionOverflow` if the payload
/// is too large to frame.
pub fn encode_with_config(image: &Image, mode: CodecMode, config: &CodecConfig) -> Result<Vec<u8>> {
    config.limits.check(image.width(), image.height())?;

    let payload = match mode {
        CodecMode::Lossy { quality } => lossy::encode(image, quality, config)?,
        CodecMode::Lossless => lossless::encode(image, config),
    };

    let header = FrameHeader::for_payload(
        mode.kind(),
        image.format(),
        image.width(),
        image.height(),
        &payload,
    )?;
    debug!(
        width = image.width(),
        height = image.height(),
        kind = ?header.kind,
        format = ?header.format,
        payload = payload.len(),
        "encoded stream"
    );
    Ok(container::frame(&header, &payload))
}

/// Decode a stream into an image in the pixel format it was encoded from.
///
/// # Errors
///
/// * Validation errors for a bad signature, unknown tags or unusable
///   dimensions
/// * `TruncatedOrCorrupt` if the payload length disagrees with the header
/// * `CorruptBitstream` or `Underrun` if the payload is damaged
pub fn decode(bytes: &[u8]) -> Result<Image> {
    decode_with_config(bytes, &CodecConfig::default())
}

/// Decode a stream with an explicit configuration.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_with_config(bytes: &[u8], config: &CodecConfig) -> Result<Image> {
    let (header, payload) = container::parse(bytes, &config.limits).inspect_err(|err| {
        warn!(error = %err, "rejected stream header");
    })?;
    debug!(
        width = header.width,
        height = header.height,
        kind = ?header.kind,
        format = ?header.format,
        payload = payload.len(),
        "decoding stream"
    );

    match header.kind {
        StreamKind::Lossy => lossy::decode(payload, header.width, header.height, header.format),
        StreamKind::Lossless => {
            lossless::decode(payload, header.width, header.height, header.format)
        }
    }
}

/// Decode a stream and convert it to `format`.
///
/// Converting to RGB drops alpha; converting to RGBA fills alpha with 255.
/// The returned buffer is always `width * height * format.bytes_per_pixel()`
/// bytes long.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_as(bytes: &[u8], format: PixelFormat) -> Result<Image> {
    decode_as_with_config(bytes, format, &CodecConfig::default())
}

/// Decode a stream with explicit limits and convert it to `format`.
///
/// # Errors
///
/// See [`decode_with_config`].
pub fn decode_as_with_config(
    bytes: &[u8],
    format: PixelFormat,
    config: &CodecConfig,
) -> Result<Image> {
    let image = decode_with_config(bytes, config)?;
    if image.format() == format {
        Ok(image)
    } else {
        Ok(image.to_format(format))
    }
}

/// Read stream properties from the header without decoding the payload.
///
/// # Errors
///
/// Header validation errors, as for [`decode`]. The payload length is not
/// checked.
pub fn get_info(bytes: &[u8]) -> Result<ImageInfo> {
    let header = container::probe(bytes, &CodecConfig::default().limits)?;
    Ok(header.info())
}
