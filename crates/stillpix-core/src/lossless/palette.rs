//! Palette substitution for images with few distinct colours.

use std::collections::BTreeSet;

use crate::error::{CodecError, Result};

/// Sorted distinct colours, each `channels` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    channels: usize,
    entries: Vec<u32>,
}

/// Pack up to four channel bytes into one sortable key.
#[inline]
fn pack(px: &[u8]) -> u32 {
    px.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

impl Palette {
    /// Collect the distinct colours of `pixels`, giving up once there are
    /// more than `max_size`.
    pub fn build(pixels: &[u8], channels: usize, max_size: usize) -> Option<Self> {
        if max_size == 0 {
            return None;
        }
        let mut colors = BTreeSet::new();
        for px in pixels.chunks_exact(channels) {
            colors.insert(pack(px));
            if colors.len() > max_size {
                return None;
            }
        }
        Some(Self {
            channels,
            entries: colors.into_iter().collect(),
        })
    }

    /// Build a palette from raw entry bytes as stored in a payload.
    pub fn from_entries(bytes: &[u8], channels: usize) -> Self {
        Self {
            channels,
            entries: bytes.chunks_exact(channels).map(pack).collect(),
        }
    }

    /// Number of colours.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Channel bytes of one entry.
    pub fn entry_bytes(&self, index: usize) -> Vec<u8> {
        let key = self.entries[index];
        (0..self.channels)
            .rev()
            .map(|c| (key >> (8 * c)) as u8)
            .collect()
    }

    /// Replace each pixel with its palette index.
    pub fn to_indices(&self, pixels: &[u8]) -> Vec<u8> {
        pixels
            .chunks_exact(self.channels)
            .map(|px| {
                // Every pixel was inserted while building the palette
                self.entries.binary_search(&pack(px)).unwrap_or(0) as u8
            })
            .collect()
    }

    /// Expand an index plane back to pixels.
    ///
    /// # Errors
    ///
    /// Returns `CorruptBitstream` if an index is outside the palette.
    pub fn expand(&self, indices: &[u8]) -> Result<Vec<u8>> {
        let table: Vec<Vec<u8>> = (0..self.len()).map(|i| self.entry_bytes(i)).collect();
        let mut out = Vec::with_capacity(indices.len() * self.channels);
        for &idx in indices {
            let entry = table.get(idx as usize).ok_or_else(|| {
                CodecError::corrupt(format!(
                    "palette index {idx} out of range for {} colours",
                    self.len()
                ))
            })?;
            out.extend_from_slice(entry);
        }
        Ok(out)
    }
}
