//! Quantization profiles derived from a quality factor.

use crate::error::{CodecError, Result};

/// Zig-zag scan order: `ZIGZAG[i]` is the natural index of the i-th
/// coefficient in scan order.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Base luminance steps (ITU T.81 Annex K), natural order.
const BASE_LUMA: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69,
    56, 14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104,
    113, 92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

/// Base chrominance steps (ITU T.81 Annex K), natural order.
const BASE_CHROMA: [u16; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, 18, 21, 26, 66, 99, 99, 99, 99, 24, 26, 56, 99, 99, 99, 99,
    99, 47, 66, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
];

/// Chroma is subsampled 2x2 below this quality level.
const FULL_CHROMA_LEVEL: u8 = 80;

/// Largest deblocking filter level.
pub const MAX_FILTER_LEVEL: u8 = 63;

/// Step sizes for one quality level.
///
/// Recomputed from the level on every call; only the level is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationProfile {
    level: u8,
    luma: [u16; 64],
    chroma: [u16; 64],
}

impl QuantizationProfile {
    /// Build the profile for a quality factor in 0-100.
    ///
    /// Fractional qualities round to the nearest integer level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuality` for values outside 0-100 (including NaN).
    pub fn from_quality(quality: f32) -> Result<Self> {
        if !(0.0..=100.0).contains(&quality) {
            return Err(CodecError::InvalidQuality(quality));
        }
        Ok(Self::for_level(quality.round() as u8))
    }

    /// Build the profile for a stored integer level.
    ///
    /// # Errors
    ///
    /// Returns `CorruptBitstream` for levels above 100.
    pub fn from_level(level: u8) -> Result<Self> {
        if level > 100 {
            return Err(CodecError::corrupt(format!("quality level {level} out of range")));
        }
        Ok(Self::for_level(level))
    }

    fn for_level(level: u8) -> Self {
        // libjpeg-style scaling: 50 keeps the base tables, 100 gives all ones
        let q = u32::from(level.max(1));
        let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
        let scaled = |base: &[u16; 64]| {
            let mut out = [0u16; 64];
            for (o, &b) in out.iter_mut().zip(base) {
                *o = ((u32::from(b) * scale + 50) / 100).clamp(1, 255) as u16;
            }
            out
        };
        Self {
            level,
            luma: scaled(&BASE_LUMA),
            chroma: scaled(&BASE_CHROMA),
        }
    }

    /// The integer quality level (0-100).
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Luma step sizes, natural order.
    pub fn luma(&self) -> &[u16; 64] {
        &self.luma
    }

    /// Chroma step sizes, natural order.
    pub fn chroma(&self) -> &[u16; 64] {
        &self.chroma
    }

    /// Whether chroma planes are subsampled 2x2 at this level.
    pub fn subsample_chroma(&self) -> bool {
        self.level < FULL_CHROMA_LEVEL
    }

    /// Deblocking strength: 0 at quality 100, rising as quality drops.
    pub fn filter_level(&self) -> u8 {
        (((100 - u32::from(self.level)) * 32 / 100) as u8).min(MAX_FILTER_LEVEL)
    }
}

/// Quantize DCT coefficients (natural order) with the given steps.
pub fn quantize(coeffs: &[f32; 64], steps: &[u16; 64]) -> [i32; 64] {
    let mut out = [0i32; 64];
    for ((o, &c), &s) in out.iter_mut().zip(coeffs).zip(steps) {
        *o = (c / f32::from(s)).round() as i32;
    }
    out
}

/// Scale quantized coefficients back up.
pub fn dequantize(levels: &[i32; 64], steps: &[u16; 64]) -> [f32; 64] {
    let mut out = [0f32; 64];
    for ((o, &l), &s) in out.iter_mut().zip(levels).zip(steps) {
        *o = l.saturating_mul(i32::from(s)) as f32;
    }
    out
}
