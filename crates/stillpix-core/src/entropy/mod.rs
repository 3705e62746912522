//! Entropy coding of symbol streams with canonical Huffman codes.
//!
//! The engines write tables and symbols straight into a shared
//! [`BitWriter`](crate::bitio::BitWriter) through [`HuffmanTable`]. The
//! standalone [`encode`] / [`decode`] pair codes a single stream on its own.
//!
//! # Examples
//!
//! ```ignore
//! use stillpix_core::entropy;
//!
//! let symbols = [3u16, 3, 3, 1, 0, 3];
//! let (table, bits) = entropy::encode(&symbols, 4);
//! let decoded = entropy::decode(&table, &bits, symbols.len()).unwrap();
//! assert_eq!(decoded, symbols);
//! ```

mod huffman;

pub use huffman::{histogram, HuffmanTable, MAX_ALPHABET_SIZE, MAX_CODE_LENGTH};

use crate::bitio::{BitReader, BitWriter};
use crate::error::Result;

/// Encode a symbol sequence, returning its table and the coded bits.
///
/// Every symbol must be below `alphabet_size`.
pub fn encode(symbols: &[u16], alphabet_size: usize) -> (HuffmanTable, Vec<u8>) {
    let table = HuffmanTable::from_symbols(symbols, alphabet_size);
    let mut writer = BitWriter::with_capacity(symbols.len() / 2);
    for &s in symbols {
        table.write_symbol(&mut writer, s);
    }
    (table, writer.flush())
}

/// Decode exactly `count` symbols.
///
/// # Errors
///
/// Returns `CorruptBitstream` if the bits run out before `count` symbols
/// are read or a prefix matches no code.
pub fn decode(table: &HuffmanTable, bitstream: &[u8], count: usize) -> Result<Vec<u16>> {
    let mut reader = BitReader::new(bitstream);
    let mut symbols = Vec::with_capacity(count.min(bitstream.len() * 8));
    for _ in 0..count {
        symbols.push(table.read_symbol(&mut reader)?);
    }
    Ok(symbols)
}

/// Estimated coded size in bits of a stream with the given histogram.
///
/// Uses the Shannon bound, which tracks real Huffman cost closely enough to
/// rank alternatives against each other.
pub fn estimate_bits(counts: &[u32]) -> f64 {
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return 0.0;
    }
    let total_f = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let c = f64::from(c);
            -c * (c / total_f).log2()
        })
        .sum()
}
