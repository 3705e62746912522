//! Core types shared by both codec paths.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Pixel layout of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// 8-bit red, green, blue (3 bytes per pixel).
    Rgb24 = 0,
    /// 8-bit red, green, blue, alpha (4 bytes per pixel).
    Rgba32 = 1,
}

impl PixelFormat {
    /// Number of bytes per pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }

    /// Whether this format carries an alpha channel.
    #[inline]
    pub fn has_alpha(self) -> bool {
        self == PixelFormat::Rgba32
    }

    /// Header byte for this format.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a header byte.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PixelFormat::Rgb24),
            1 => Ok(PixelFormat::Rgba32),
            value => Err(CodecError::UnknownTag {
                field: "pixel format",
                value,
            }),
        }
    }
}

/// Which engine produced a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamKind {
    /// Block transform coding.
    Lossy = 0,
    /// Predictive coding, byte-exact.
    Lossless = 1,
}

impl StreamKind {
    /// Header byte for this kind.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Parse a header byte.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(StreamKind::Lossy),
            1 => Ok(StreamKind::Lossless),
            value => Err(CodecError::UnknownTag {
                field: "stream kind",
                value,
            }),
        }
    }
}

/// How to encode an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CodecMode {
    /// Lossy coding with quality in 0-100 (100 = highest fidelity).
    Lossy { quality: f32 },
    /// Lossless coding.
    Lossless,
}

impl CodecMode {
    /// Lossy mode with the given quality.
    pub fn lossy(quality: f32) -> Self {
        CodecMode::Lossy { quality }
    }

    /// The stream kind this mode produces.
    pub fn kind(&self) -> StreamKind {
        match self {
            CodecMode::Lossy { .. } => StreamKind::Lossy,
            CodecMode::Lossless => StreamKind::Lossless,
        }
    }
}

impl Default for CodecMode {
    fn default() -> Self {
        CodecMode::Lossy { quality: 75.0 }
    }
}

/// Compute the pixel buffer length for the given dimensions and format.
///
/// # Errors
///
/// Returns `InvalidDimensions` if either side is zero and `DimensionOverflow`
/// if the byte count does not fit in `usize`.
pub fn buffer_len(width: u32, height: u32, format: PixelFormat) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        .ok_or(CodecError::DimensionOverflow { width, height })
}

/// An image: dimensions, pixel format and a row-major pixel buffer.
///
/// The buffer length always equals `width * height * bytes_per_pixel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Image {
    /// Create an image, validating that the buffer matches the dimensions.
    ///
    /// # Errors
    ///
    /// * `InvalidDimensions` if width or height is zero
    /// * `DimensionOverflow` if the buffer size can't be computed
    /// * `InvalidPixelData` if `pixels.len()` is not exactly the expected size
    pub fn new(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height, format)?;
        if pixels.len() != expected {
            return Err(CodecError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Create an image from a borrowed buffer.
    pub fn from_slice(width: u32, height: u32, format: PixelFormat, pixels: &[u8]) -> Result<Self> {
        let expected = buffer_len(width, height, format)?;
        if pixels.len() != expected {
            return Err(CodecError::InvalidPixelData {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            pixels: pixels.to_vec(),
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Take ownership of the pixel data.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Convert to another pixel format.
    ///
    /// Dropping alpha discards it; adding alpha fills it with 255.
    pub fn to_format(&self, format: PixelFormat) -> Image {
        if format == self.format {
            return self.clone();
        }
        let src_bpp = self.format.bytes_per_pixel();
        let mut pixels = Vec::with_capacity(self.pixel_count() * format.bytes_per_pixel());
        for px in self.pixels.chunks_exact(src_bpp) {
            pixels.extend_from_slice(&px[..3]);
            if format.has_alpha() {
                pixels.push(255);
            }
        }
        Image {
            width: self.width,
            height: self.height,
            format,
            pixels,
        }
    }

    /// Convert to an `image::DynamicImage` for use with the `image` crate.
    pub fn to_dynamic_image(&self) -> Option<image::DynamicImage> {
        match self.format {
            PixelFormat::Rgb24 => {
                image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
                    .map(image::DynamicImage::ImageRgb8)
            }
            PixelFormat::Rgba32 => {
                image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
                    .map(image::DynamicImage::ImageRgba8)
            }
        }
    }

    /// Create from an `image::DynamicImage`, keeping alpha only if the
    /// source has it.
    pub fn from_dynamic_image(img: &image::DynamicImage) -> Result<Self> {
        if img.color().has_alpha() {
            Self::try_from(img.to_rgba8())
        } else {
            Self::try_from(img.to_rgb8())
        }
    }
}

impl TryFrom<image::RgbImage> for Image {
    type Error = CodecError;

    fn try_from(img: image::RgbImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Image::new(width, height, PixelFormat::Rgb24, img.into_raw())
    }
}

impl TryFrom<image::RgbaImage> for Image {
    type Error = CodecError;

    fn try_from(img: image::RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Image::new(width, height, PixelFormat::Rgba32, img.into_raw())
    }
}

/// Stream properties readable from the header alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel format the image was encoded from.
    pub format: PixelFormat,
    /// Engine that produced the payload.
    pub kind: StreamKind,
    /// Payload size in bytes (excluding the header).
    pub payload_len: usize,
}
