//! MSB-first bit reader.

use crate::error::{CodecError, Result};

/// Reads bits from a byte slice, most significant bit first.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new bit reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Get the total number of bits in the stream.
    pub fn total_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// Get the current bit position in the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the number of remaining bits.
    pub fn remaining_bits(&self) -> usize {
        self.total_bits().saturating_sub(self.pos)
    }

    /// Skip to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.pos = (self.pos + 7) & !7;
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = *self.data.get(self.pos >> 3).ok_or(CodecError::Underrun {
            requested: 1,
            remaining: 0,
        })?;
        let bit = (byte >> (7 - (self.pos & 7))) & 1;
        self.pos += 1;
        Ok(bit != 0)
    }

    /// Read up to 32 bits as an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns `Underrun` if fewer than `n` bits remain. The reader position
    /// is left unchanged on failure.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32, "cannot read more than 32 bits at once");
        if n == 0 {
            return Ok(0);
        }
        let remaining = self.remaining_bits();
        if remaining < n as usize {
            return Err(CodecError::Underrun {
                requested: n,
                remaining,
            });
        }

        let mut value: u64 = 0;
        let mut left = n;
        while left > 0 {
            let byte = self.data[self.pos >> 3];
            let avail = 8 - (self.pos & 7) as u32;
            let take = avail.min(left);
            let bits = (u32::from(byte) >> (avail - take)) & ((1u32 << take) - 1);
            value = (value << take) | u64::from(bits);
            left -= take;
            self.pos += take as usize;
        }

        Ok(value as u32)
    }

    /// Read a byte-wide value.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bits(8).map(|v| v as u8)
    }
}
