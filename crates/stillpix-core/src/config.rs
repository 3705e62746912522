//! Codec configuration.
//!
//! Configuration is plain data passed into each call. There are no global
//! settings; two calls with different configs never affect each other.

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Largest width or height accepted by default.
pub const DEFAULT_MAX_DIMENSION: u32 = 16383;

/// Largest palette the lossless path can substitute.
pub const MAX_PALETTE_SIZE: usize = 256;

/// Dimension limits applied on both encode and decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum image width in pixels.
    pub max_width: u32,
    /// Maximum image height in pixels.
    pub max_height: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl Limits {
    /// Limits that accept any dimensions representable in a header.
    pub fn unlimited() -> Self {
        Self {
            max_width: u32::MAX,
            max_height: u32::MAX,
        }
    }

    /// Check that `width` x `height` is within these limits.
    pub fn check(&self, width: u32, height: u32) -> Result<()> {
        if width > self.max_width || height > self.max_height {
            return Err(CodecError::LimitExceeded {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        Ok(())
    }
}

/// Tunables for the encoder and decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Dimension limits.
    pub limits: Limits,
    /// Use a palette when an image has at most this many distinct colours
    /// (0 disables palettes, values above 256 act as 256).
    pub palette_threshold: usize,
    /// Lossless prediction tile side is `1 << predictor_tile_bits` (2-6).
    pub predictor_tile_bits: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            palette_threshold: MAX_PALETTE_SIZE,
            predictor_tile_bits: 4,
        }
    }
}

impl CodecConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Palette threshold clamped to what the format can store.
    pub fn effective_palette_threshold(&self) -> usize {
        self.palette_threshold.min(MAX_PALETTE_SIZE)
    }

    /// Prediction tile bits clamped to 2-6.
    pub fn effective_tile_bits(&self) -> u8 {
        self.predictor_tile_bits.clamp(2, 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert!(limits.check(16383, 16383).is_ok());
        assert!(matches!(
            limits.check(16384, 1),
            Err(CodecError::LimitExceeded { .. })
        ));
        assert!(matches!(
            limits.check(1, 16384),
            Err(CodecError::LimitExceeded { .. })
        ));
    }

    #[test]
    fn test_limits_unlimited() {
        assert!(Limits::unlimited().check(u32::MAX, u32::MAX).is_ok());
    }

    #[test]
    fn test_config_clamping() {
        let mut config = CodecConfig::new();
        config.palette_threshold = 10_000;
        config.predictor_tile_bits = 9;
        assert_eq!(config.effective_palette_threshold(), 256);
        assert_eq!(config.effective_tile_bits(), 6);

        config.predictor_tile_bits = 0;
        assert_eq!(config.effective_tile_bits(), 2);
    }
}
