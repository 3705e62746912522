//! 8x8 discrete cosine transform.
//!
//! Orthonormal DCT-II / DCT-III pair, computed separably (rows, then
//! columns). The basis table is built per codec call rather than stored in
//! a global.

use std::f32::consts::{FRAC_1_SQRT_2, PI};

/// Precomputed 1-D basis: `basis[k][n] = c(k)/2 * cos((2n + 1) k pi / 16)`.
#[derive(Debug, Clone)]
pub struct Dct {
    basis: [[f32; 8]; 8],
}

impl Default for Dct {
    fn default() -> Self {
        Self::new()
    }
}

impl Dct {
    /// Build the basis table.
    pub fn new() -> Self {
        let mut basis = [[0f32; 8]; 8];
        for (k, row) in basis.iter_mut().enumerate() {
            let c = if k == 0 { FRAC_1_SQRT_2 } else { 1.0 };
            for (n, b) in row.iter_mut().enumerate() {
                let angle = PI * (2 * n + 1) as f32 * k as f32 / 16.0;
                *b = 0.5 * c * angle.cos();
            }
        }
        Self { basis }
    }

    /// Forward 2-D DCT of level-shifted samples (natural order).
    pub fn forward(&self, block: &[f32; 64]) -> [f32; 64] {
        let mut temp = [0f32; 64];
        for row in 0..8 {
            for u in 0..8 {
                temp[row * 8 + u] = (0..8)
                    .map(|x| block[row * 8 + x] * self.basis[u][x])
                    .sum();
            }
        }

        let mut out = [0f32; 64];
        for col in 0..8 {
            for v in 0..8 {
                out[v * 8 + col] = (0..8).map(|y| temp[y * 8 + col] * self.basis[v][y]).sum();
            }
        }
        out
    }

    /// Inverse 2-D DCT back to level-shifted samples.
    pub fn inverse(&self, coeffs: &[f32; 64]) -> [f32; 64] {
        let mut temp = [0f32; 64];
        for row in 0..8 {
            for x in 0..8 {
                temp[row * 8 + x] = (0..8)
                    .map(|u| coeffs[row * 8 + u] * self.basis[u][x])
                    .sum();
            }
        }

        let mut out = [0f32; 64];
        for col in 0..8 {
            for y in 0..8 {
                out[y * 8 + col] = (0..8).map(|v| temp[v * 8 + col] * self.basis[v][y]).sum();
            }
        }
        out
    }
}
