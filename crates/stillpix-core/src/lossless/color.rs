//! Subtract-green colour decorrelation.
//!
//! Red and blue usually move with green, so storing them as differences
//! from green leaves smaller residuals. Arithmetic wraps mod 256, which
//! makes the transform exactly reversible.

/// Replace R with R - G and B with B - G on every pixel.
pub fn subtract_green(pixels: &mut [u8], channels: usize) {
    debug_assert!(channels >= 3);
    for px in pixels.chunks_exact_mut(channels) {
        let g = px[1];
        px[0] = px[0].wrapping_sub(g);
        px[2] = px[2].wrapping_sub(g);
    }
}

/// Inverse of [`subtract_green`].
pub fn add_green(pixels: &mut [u8], channels: usize) {
    debug_assert!(channels >= 3);
    for px in pixels.chunks_exact_mut(channels) {
        let g = px[1];
        px[0] = px[0].wrapping_add(g);
        px[2] = px[2].wrapping_add(g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtract_green() {
        let mut px = vec![100, 40, 10, 255];
        subtract_green(&mut px, 4);
        assert_eq!(px, vec![60, 40, 226, 255]);
        add_green(&mut px, 4);
        assert_eq!(px, vec![100, 40, 10, 255]);
    }

    #[test]
    fn test_gray_becomes_zero() {
        let mut px = vec![77, 77, 77, 3, 3, 3];
        subtract_green(&mut px, 3);
        assert_eq!(px, vec![0, 77, 0, 0, 3, 0]);
    }
}
