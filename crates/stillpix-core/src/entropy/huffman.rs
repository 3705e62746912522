//! Canonical Huffman tables.
//!
//! Code lengths come from symbol frequencies; codes are then assigned
//! canonically in (length, symbol) order, so a table is fully described by
//! its code lengths. Only the lengths are ever serialized.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitio::{BitReader, BitWriter};
use crate::error::{CodecError, Result};

/// Longest code any table may contain.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Largest alphabet a table may cover.
pub const MAX_ALPHABET_SIZE: usize = 1 << 12;

/// A canonical Huffman table over symbols `0..alphabet_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// Code length per symbol (0 = symbol unused).
    lengths: Vec<u8>,
    /// Canonical code per symbol, right-aligned in `lengths[sym]` bits.
    codes: Vec<u16>,
    /// Number of codes of each length (index 0 unused).
    counts: [u16; MAX_CODE_LENGTH as usize + 1],
    /// Used symbols ordered by (length, symbol).
    sorted: Vec<u16>,
}

impl HuffmanTable {
    /// Build a table from symbol frequencies.
    ///
    /// More frequent symbols never get longer codes than less frequent ones.
    /// A single used symbol gets a 1-bit code; no used symbols gives an
    /// empty table that can encode nothing.
    pub fn from_frequencies(freqs: &[u32]) -> Self {
        debug_assert!(freqs.len() <= MAX_ALPHABET_SIZE);
        let lengths = limited_code_lengths(freqs, MAX_CODE_LENGTH);
        Self::canonical(lengths)
    }

    /// Build a table from symbols, counting their frequencies first.
    pub fn from_symbols(symbols: &[u16], alphabet_size: usize) -> Self {
        Self::from_frequencies(&histogram(symbols, alphabet_size))
    }

    /// Rebuild a table from code lengths.
    ///
    /// # Errors
    ///
    /// Returns `CorruptBitstream` if a length exceeds [`MAX_CODE_LENGTH`] or
    /// the lengths over-subscribe the code space.
    pub fn from_code_lengths(lengths: Vec<u8>) -> Result<Self> {
        if lengths.len() > MAX_ALPHABET_SIZE {
            return Err(CodecError::corrupt("Huffman alphabet too large"));
        }
        if lengths.iter().any(|&l| l > MAX_CODE_LENGTH) {
            return Err(CodecError::corrupt("Huffman code length out of range"));
        }

        // Kraft inequality: sum of 2^-len must not exceed 1
        let kraft: u32 = lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u32 << (MAX_CODE_LENGTH - l))
            .sum();
        if kraft > 1u32 << MAX_CODE_LENGTH {
            return Err(CodecError::corrupt("Huffman code lengths over-subscribed"));
        }

        Ok(Self::canonical(lengths))
    }

    /// Assign canonical codes to a valid set of lengths.
    fn canonical(lengths: Vec<u8>) -> Self {
        let mut counts = [0u16; MAX_CODE_LENGTH as usize + 1];
        for &len in &lengths {
            if len > 0 {
                counts[len as usize] += 1;
            }
        }

        let mut next_code = [0u32; MAX_CODE_LENGTH as usize + 2];
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH as usize {
            code = (code + u32::from(counts[len - 1])) << 1;
            next_code[len] = code;
        }
        // counts[0] is always 0, so the first length starts at code 0
        let mut codes = vec![0u16; lengths.len()];
        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                codes[sym] = next_code[len as usize] as u16;
                next_code[len as usize] += 1;
            }
        }

        let mut sorted: Vec<u16> = (0..lengths.len())
            .filter(|&s| lengths[s] > 0)
            .map(|s| s as u16)
            .collect();
        sorted.sort_by_key(|&s| (lengths[s as usize], s));

        Self {
            lengths,
            codes,
            counts,
            sorted,
        }
    }

    /// Number of symbols this table covers.
    pub fn alphabet_size(&self) -> usize {
        self.lengths.len()
    }

    /// Code lengths in symbol-index order.
    pub fn code_lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// The (code, length) pair for a symbol; length 0 means unused.
    pub fn code(&self, symbol: u16) -> (u16, u8) {
        let s = symbol as usize;
        match self.lengths.get(s) {
            Some(&len) => (self.codes[s], len),
            None => (0, 0),
        }
    }

    /// Whether no symbol has a code.
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Write one symbol's code.
    ///
    /// The symbol must have been present when the table was built.
    #[inline]
    pub fn write_symbol(&self, writer: &mut BitWriter, symbol: u16) {
        let (code, len) = self.code(symbol);
        debug_assert!(len > 0, "symbol {symbol} has no code");
        writer.write_bits(u32::from(code), u32::from(len));
    }

    /// Read one symbol.
    ///
    /// # Errors
    ///
    /// Returns `CorruptBitstream` if the bits don't form a code in this
    /// table, or if the stream ends inside a code.
    pub fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;
        for len in 1..=MAX_CODE_LENGTH as usize {
            let bit = reader
                .read_bit()
                .map_err(|_| CodecError::corrupt("bitstream ended inside a Huffman code"))?;
            code |= i32::from(bit);
            let count = i32::from(self.counts[len]);
            if code - count < first {
                return Ok(self.sorted[(index + (code - first)) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }
        Err(CodecError::corrupt("invalid Huffman code prefix"))
    }

    /// Serialize the code lengths.
    ///
    /// Each length takes 4 bits. A zero length is followed by one flag bit;
    /// when set, an 8-bit count of additional zero lengths follows.
    pub fn write_to(&self, writer: &mut BitWriter) {
        let n = self.lengths.len();
        let mut i = 0;
        while i < n {
            let len = self.lengths[i];
            writer.write_bits(u32::from(len), 4);
            i += 1;
            if len == 0 {
                let run = self.lengths[i..]
                    .iter()
                    .take(255)
                    .take_while(|&&l| l == 0)
                    .count();
                if run > 0 {
                    writer.write_bit(true);
                    writer.write_bits(run as u32, 8);
                    i += run;
                } else {
                    writer.write_bit(false);
                }
            }
        }
    }

    /// Read a table written by [`HuffmanTable::write_to`].
    pub fn read_from(reader: &mut BitReader<'_>, alphabet_size: usize) -> Result<Self> {
        let mut lengths = Vec::with_capacity(alphabet_size);
        while lengths.len() < alphabet_size {
            let len = reader.read_bits(4)? as u8;
            lengths.push(len);
            if len == 0 && reader.read_bit()? {
                let run = reader.read_bits(8)? as usize;
                if lengths.len() + run > alphabet_size {
                    return Err(CodecError::corrupt("Huffman zero run past end of alphabet"));
                }
                lengths.resize(lengths.len() + run, 0);
            }
        }
        Self::from_code_lengths(lengths)
    }
}

/// Count symbol occurrences.
///
/// Symbols at or beyond `alphabet_size` are ignored.
pub fn histogram(symbols: &[u16], alphabet_size: usize) -> Vec<u32> {
    let mut freqs = vec![0u32; alphabet_size];
    for &s in symbols {
        if let Some(f) = freqs.get_mut(s as usize) {
            *f += 1;
        }
    }
    freqs
}

/// Huffman code lengths no longer than `max_len`.
///
/// Frequencies are halved (rounding up, so used symbols stay used) until the
/// tree fits. With every weight at 1 the tree is balanced, so this ends.
fn limited_code_lengths(freqs: &[u32], max_len: u8) -> Vec<u8> {
    let mut weights: Vec<u64> = freqs.iter().map(|&f| u64::from(f)).collect();
    loop {
        let depths = code_depths(&weights);
        if depths.iter().all(|&d| d <= u32::from(max_len)) {
            return depths.into_iter().map(|d| d as u8).collect();
        }
        for w in weights.iter_mut().filter(|w| **w > 0) {
            *w = w.div_ceil(2);
        }
    }
}

/// Leaf depths of a Huffman tree over the non-zero weights.
fn code_depths(weights: &[u64]) -> Vec<u32> {
    let mut depths = vec![0u32; weights.len()];
    let used: Vec<usize> = (0..weights.len()).filter(|&s| weights[s] > 0).collect();

    match used.len() {
        0 => return depths,
        1 => {
            depths[used[0]] = 1;
            return depths;
        }
        _ => {}
    }

    // Node ids: leaves 0..used.len(), internal nodes after. Ties break on
    // node id, which keeps the tree deterministic.
    let mut parent: Vec<usize> = vec![usize::MAX; used.len()];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = used
        .iter()
        .enumerate()
        .map(|(id, &sym)| Reverse((weights[sym], id)))
        .collect();

    while heap.len() > 1 {
        let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        let id = parent.len();
        parent.push(usize::MAX);
        parent[a] = id;
        parent[b] = id;
        heap.push(Reverse((wa + wb, id)));
    }

    // Parents always have larger ids than their children
    let root = parent.len() - 1;
    let mut node_depth = vec![0u32; parent.len()];
    for id in (0..root).rev() {
        node_depth[id] = node_depth[parent[id]] + 1;
    }
    for (leaf, &sym) in used.iter().enumerate() {
        depths[sym] = node_depth[leaf];
    }

    // Among equal weights, lower symbols take the shorter codes
    let mut by_weight = used;
    by_weight.sort_by_key(|&s| (weights[s], s));
    for run in by_weight.chunk_by(|&a, &b| weights[a] == weights[b]) {
        let mut lens: Vec<u32> = run.iter().map(|&s| depths[s]).collect();
        lens.sort_unstable();
        for (&sym, len) in run.iter().zip(lens) {
            depths[sym] = len;
        }
    }
    depths
}
