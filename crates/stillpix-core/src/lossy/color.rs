//! RGB <-> YCbCr conversion and chroma resampling.
//!
//! BT.601 full-range coefficients in 16.16 fixed point, so encode and
//! decode produce the same values on every platform.

/// Luma and chroma planes of one image.
#[derive(Debug, Clone)]
pub struct YCbCrPlanes {
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

const HALF: i32 = 1 << 15;

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert one RGB pixel to YCbCr.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    let y = (19595 * r + 38470 * g + 7471 * b + HALF) >> 16;
    let cb = ((-11059 * r - 21709 * g + 32768 * b + HALF) >> 16) + 128;
    let cr = ((32768 * r - 27439 * g - 5329 * b + HALF) >> 16) + 128;
    (clamp_u8(y), clamp_u8(cb), clamp_u8(cr))
}

/// Convert one YCbCr pixel to RGB.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = i32::from(y);
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;
    let r = y + ((91881 * cr + HALF) >> 16);
    let g = y - ((22554 * cb + 46802 * cr + HALF) >> 16);
    let b = y + ((116130 * cb + HALF) >> 16);
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

/// Split interleaved pixels (3 or 4 channels, alpha ignored) into planes.
pub fn split_planes(pixels: &[u8], channels: usize) -> YCbCrPlanes {
    let count = pixels.len() / channels;
    let mut planes = YCbCrPlanes {
        y: Vec::with_capacity(count),
        cb: Vec::with_capacity(count),
        cr: Vec::with_capacity(count),
    };
    for px in pixels.chunks_exact(channels) {
        let (y, cb, cr) = rgb_to_ycbcr(px[0], px[1], px[2]);
        planes.y.push(y);
        planes.cb.push(cb);
        planes.cr.push(cr);
    }
    planes
}

/// Dimensions of a chroma plane after optional 2x2 subsampling.
pub fn chroma_dims(width: usize, height: usize, subsampled: bool) -> (usize, usize) {
    if subsampled {
        (width.div_ceil(2), height.div_ceil(2))
    } else {
        (width, height)
    }
}

/// Average each 2x2 neighbourhood; edge cells average what exists.
pub fn downsample(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (cw, ch) = chroma_dims(width, height, true);
    let mut out = Vec::with_capacity(cw * ch);
    for cy in 0..ch {
        for cx in 0..cw {
            let mut sum = 0u32;
            let mut n = 0u32;
            for y in (cy * 2)..(cy * 2 + 2).min(height) {
                for x in (cx * 2)..(cx * 2 + 2).min(width) {
                    sum += u32::from(plane[y * width + x]);
                    n += 1;
                }
            }
            out.push(((sum + n / 2) / n) as u8);
        }
    }
    out
}

/// Expand a subsampled plane back to full size by replication.
pub fn upsample(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    let (cw, _) = chroma_dims(width, height, true);
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row = &plane[(y / 2) * cw..];
        for x in 0..width {
            out.push(row[x / 2]);
        }
    }
    out
}

/// Merge planes back into interleaved pixels, taking alpha from `alpha`
/// when present.
pub fn merge_planes(planes: &YCbCrPlanes, alpha: Option<&[u8]>) -> Vec<u8> {
    let channels = if alpha.is_some() { 4 } else { 3 };
    let mut out = Vec::with_capacity(planes.y.len() * channels);
    for i in 0..planes.y.len() {
        let (r, g, b) = ycbcr_to_rgb(planes.y[i], planes.cb[i], planes.cr[i]);
        out.extend_from_slice(&[r, g, b]);
        if let Some(alpha) = alpha {
            out.push(alpha[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_has_neutral_chroma() {
        for v in [0u8, 1, 64, 128, 200, 255] {
            assert_eq!(rgb_to_ycbcr(v, v, v), (v, 128, 128));
            assert_eq!(ycbcr_to_rgb(v, 128, 128), (v, v, v));
        }
    }

    #[test]
    fn test_primary_colors_roundtrip_closely() {
        for (r, g, b) in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (128, 64, 32), (10, 20, 30)] {
            let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
            let (r2, g2, b2) = ycbcr_to_rgb(y, cb, cr);
            assert!((i32::from(r) - i32::from(r2)).abs() <= 3, "{r} vs {r2}");
            assert!((i32::from(g) - i32::from(g2)).abs() <= 3, "{g} vs {g2}");
            assert!((i32::from(b) - i32::from(b2)).abs() <= 3, "{b} vs {b2}");
        }
    }

    #[test]
    fn test_downsample_odd_dimensions() {
        #[rustfmt::skip]
        let plane = [
            0, 10, 20,
            30, 40, 50,
            60, 70, 80,
        ];
        let out = downsample(&plane, 3, 3);
        assert_eq!(out, vec![20, 35, 65, 80]);
    }

    #[test]
    fn test_upsample_replicates() {
        let plane = [1, 2, 3, 4];
        let out = upsample(&plane, 3, 3);
        assert_eq!(out, vec![1, 1, 2, 1, 1, 2, 3, 3, 4]);
    }

    #[test]
    fn test_split_merge_with_alpha() {
        let pixels = [50, 50, 50, 7, 200, 200, 200, 9];
        let planes = split_planes(&pixels, 4);
        assert_eq!(planes.y, vec![50, 200]);
        let merged = merge_planes(&planes, Some(&[7, 9]));
        assert_eq!(merged, pixels.to_vec());
    }
}
