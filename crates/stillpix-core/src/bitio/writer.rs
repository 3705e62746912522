//! MSB-first bit writer.

/// Accumulates bits into a byte vector, most significant bit first.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    /// Create a new bit writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new bit writer with capacity in bytes.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8 + self.acc_bits as usize
    }

    /// Check if the writer is byte-aligned.
    pub fn is_byte_aligned(&self) -> bool {
        self.acc_bits == 0
    }

    /// Number of zero bits `flush` would add to complete the last byte.
    pub fn pad_bits(&self) -> u8 {
        ((8 - self.acc_bits) % 8) as u8
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(u32::from(bit), 1);
    }

    /// Write the low `n` bits of `value`, most significant first.
    ///
    /// `n` must be at most 32; bits of `value` above `n` are ignored.
    #[inline]
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "cannot write more than 32 bits at once");
        if n == 0 {
            return;
        }
        let masked = u64::from(value) & ((1u64 << n) - 1);
        self.acc = (self.acc << n) | masked;
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.data.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
    }

    /// Write whole bytes (the writer need not be aligned).
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.is_byte_aligned() {
            self.data.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// Pad with zero bits up to the next byte boundary.
    ///
    /// Returns the number of pad bits added.
    pub fn align_to_byte(&mut self) -> u8 {
        let pad = self.pad_bits();
        if pad > 0 {
            self.write_bits(0, u32::from(pad));
        }
        pad
    }

    /// Pad the final byte with zero bits and return the bytes.
    pub fn flush(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}
