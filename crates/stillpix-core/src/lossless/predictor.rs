//! Spatial prediction filters.
//!
//! The image is split into square tiles and each tile uses one filter for
//! every pixel and channel inside it. A pixel's residual is its value minus
//! the prediction, wrapping mod 256. Neighbours outside the image read as 0.

use crate::entropy::estimate_bits;

/// Number of prediction filters.
pub const FILTER_COUNT: usize = 7;

/// Prediction filter applied to every channel of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Filter {
    /// No prediction (residual = value).
    None = 0,
    /// Pixel to the left.
    Left = 1,
    /// Pixel above.
    Top = 2,
    /// Pixel above-left.
    TopLeft = 3,
    /// Floor average of left and above.
    Average = 4,
    /// Paeth predictor from left, above and above-left.
    Paeth = 5,
    /// Left + above - above-left, clamped to 0-255.
    Gradient = 6,
}

impl Filter {
    /// All filters in symbol order.
    pub const ALL: [Filter; FILTER_COUNT] = [
        Filter::None,
        Filter::Left,
        Filter::Top,
        Filter::TopLeft,
        Filter::Average,
        Filter::Paeth,
        Filter::Gradient,
    ];

    /// Create from a symbol value.
    pub fn from_symbol(value: u16) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Predict a sample from its neighbours.
    #[inline]
    pub fn predict(self, left: u8, top: u8, top_left: u8) -> u8 {
        match self {
            Filter::None => 0,
            Filter::Left => left,
            Filter::Top => top,
            Filter::TopLeft => top_left,
            Filter::Average => ((u16::from(left) + u16::from(top)) / 2) as u8,
            Filter::Paeth => paeth_predictor(left, top, top_left),
            Filter::Gradient => {
                (i16::from(left) + i16::from(top) - i16::from(top_left)).clamp(0, 255) as u8
            }
        }
    }
}

/// Paeth predictor: whichever neighbour is closest to left + top - top_left.
#[inline]
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let pa = (i16::from(b) - i16::from(c)).abs();
    let pb = (i16::from(a) - i16::from(c)).abs();
    let pc = (i16::from(a) + i16::from(b) - 2 * i16::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Interleaved 8-bit samples, `channels` per pixel, row-major.
#[derive(Debug, Clone, Copy)]
pub struct PlaneShape {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl PlaneShape {
    /// Total sample count.
    pub fn len(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// Tiles per row for the given tile bits.
    pub fn tiles_x(&self, tile_bits: u8) -> usize {
        self.width.div_ceil(1 << tile_bits)
    }

    /// Total tile count for the given tile bits.
    pub fn tile_count(&self, tile_bits: u8) -> usize {
        self.tiles_x(tile_bits) * self.height.div_ceil(1 << tile_bits)
    }

    #[inline]
    fn neighbours(&self, data: &[u8], x: usize, y: usize, c: usize) -> (u8, u8, u8) {
        let stride = self.width * self.channels;
        let i = y * stride + x * self.channels + c;
        let left = if x > 0 { data[i - self.channels] } else { 0 };
        let top = if y > 0 { data[i - stride] } else { 0 };
        let top_left = if x > 0 && y > 0 {
            data[i - stride - self.channels]
        } else {
            0
        };
        (left, top, top_left)
    }
}

/// Choose a filter per tile, minimizing each tile's residual entropy.
///
/// Returns the filters (raster tile order) and the summed entropy estimate
/// in bits. Ties go to the lower filter.
pub fn select_filters(data: &[u8], shape: PlaneShape, tile_bits: u8) -> (Vec<Filter>, f64) {
    let tile = 1usize << tile_bits;
    let tiles_x = shape.tiles_x(tile_bits);
    let mut filters = Vec::with_capacity(shape.tile_count(tile_bits));
    let mut total = 0.0;
    let mut hist = [[0u32; 256]; FILTER_COUNT];

    for ty in 0..shape.height.div_ceil(tile) {
        for tx in 0..tiles_x {
            for h in hist.iter_mut() {
                h.fill(0);
            }
            let y_end = ((ty + 1) * tile).min(shape.height);
            let x_end = ((tx + 1) * tile).min(shape.width);
            for y in ty * tile..y_end {
                for x in tx * tile..x_end {
                    for c in 0..shape.channels {
                        let value = data[(y * shape.width + x) * shape.channels + c];
                        let (l, t, tl) = shape.neighbours(data, x, y, c);
                        for (f, filter) in Filter::ALL.iter().enumerate() {
                            let residual = value.wrapping_sub(filter.predict(l, t, tl));
                            hist[f][residual as usize] += 1;
                        }
                    }
                }
            }

            let mut best = (Filter::None, f64::INFINITY);
            for (f, filter) in Filter::ALL.iter().enumerate() {
                let bits = estimate_bits(&hist[f]);
                if bits < best.1 {
                    best = (*filter, bits);
                }
            }
            filters.push(best.0);
            total += best.1;
        }
    }

    (filters, total)
}

/// Compute residuals for every sample.
pub fn residuals(data: &[u8], shape: PlaneShape, tile_bits: u8, filters: &[Filter]) -> Vec<u8> {
    let tiles_x = shape.tiles_x(tile_bits);
    let mut out = Vec::with_capacity(shape.len());
    for y in 0..shape.height {
        let tile_row = (y >> tile_bits) * tiles_x;
        for x in 0..shape.width {
            let filter = filters[tile_row + (x >> tile_bits)];
            for c in 0..shape.channels {
                let value = data[(y * shape.width + x) * shape.channels + c];
                let (l, t, tl) = shape.neighbours(data, x, y, c);
                out.push(value.wrapping_sub(filter.predict(l, t, tl)));
            }
        }
    }
    out
}

/// Turn residuals back into samples in place.
///
/// Samples are restored in raster order, so every neighbour a prediction
/// reads has already been restored.
pub fn reconstruct(data: &mut [u8], shape: PlaneShape, tile_bits: u8, filters: &[Filter]) {
    let tiles_x = shape.tiles_x(tile_bits);
    for y in 0..shape.height {
        let tile_row = (y >> tile_bits) * tiles_x;
        for x in 0..shape.width {
            let filter = filters[tile_row + (x >> tile_bits)];
            for c in 0..shape.channels {
                let (l, t, tl) = shape.neighbours(data, x, y, c);
                let i = (y * shape.width + x) * shape.channels + c;
                data[i] = data[i].wrapping_add(filter.predict(l, t, tl));
            }
        }
    }
}
