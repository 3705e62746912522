//! Block tokenization: DC differences and AC run/size symbols.
//!
//! Each quantized block becomes one DC token (category of the difference
//! from the previous block's DC in the same plane) followed by AC tokens in
//! zig-zag order. An AC symbol packs `run << 4 | size`, where `run` is the
//! number of zeros skipped and `size` the magnitude category of the next
//! nonzero level. Magnitudes follow the symbol as `size` raw bits.

use crate::bitio::{BitReader, BitWriter};
use crate::entropy::HuffmanTable;
use crate::error::{CodecError, Result};

use super::quant::ZIGZAG;

/// DC symbol alphabet: magnitude categories 0-15.
pub const DC_ALPHABET: usize = 16;
/// AC symbol alphabet: every `run << 4 | size` byte.
pub const AC_ALPHABET: usize = 256;

/// End of block: all remaining levels are zero.
const EOB: u16 = 0x00;
/// Sixteen zeros with no level after them.
const ZRL: u16 = 0xF0;

/// Which of the four tables a token is coded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableId {
    DcLuma = 0,
    AcLuma = 1,
    DcChroma = 2,
    AcChroma = 3,
}

impl TableId {
    /// Alphabet size of this table.
    pub fn alphabet_size(self) -> usize {
        match self {
            TableId::DcLuma | TableId::DcChroma => DC_ALPHABET,
            TableId::AcLuma | TableId::AcChroma => AC_ALPHABET,
        }
    }
}

/// One coded symbol and its raw magnitude bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub table: TableId,
    pub symbol: u16,
    pub extra: u32,
    pub extra_len: u8,
}

impl Token {
    /// Write the token with its table, then the magnitude bits.
    pub fn write(&self, writer: &mut BitWriter, tables: &[HuffmanTable; 4]) {
        tables[self.table as usize].write_symbol(writer, self.symbol);
        if self.extra_len > 0 {
            writer.write_bits(self.extra, u32::from(self.extra_len));
        }
    }
}

/// Number of bits needed for `|value|`.
#[inline]
pub fn category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// Split a value into its category and magnitude bits.
///
/// Negative values are stored one's-complement style: `value - 1` masked
/// to `category` bits, so their top bit is always clear.
#[inline]
pub fn category_encode(value: i32) -> (u8, u32) {
    let cat = category(value);
    if cat == 0 {
        return (0, 0);
    }
    let bits = if value < 0 {
        (value - 1) as u32 & ((1u32 << cat) - 1)
    } else {
        value as u32
    };
    (cat, bits)
}

/// Inverse of [`category_encode`].
#[inline]
pub fn category_decode(cat: u8, bits: u32) -> i32 {
    if cat == 0 {
        return 0;
    }
    if bits < (1u32 << (cat - 1)) {
        bits as i32 - (1i32 << cat) + 1
    } else {
        bits as i32
    }
}

/// Tokenize one quantized block (natural order).
pub fn tokenize_block(
    levels: &[i32; 64],
    prev_dc: &mut i32,
    dc_table: TableId,
    ac_table: TableId,
    tokens: &mut Vec<Token>,
) {
    let diff = levels[0] - *prev_dc;
    *prev_dc = levels[0];
    let (cat, extra) = category_encode(diff);
    tokens.push(Token {
        table: dc_table,
        symbol: u16::from(cat),
        extra,
        extra_len: cat,
    });

    let mut run = 0u16;
    for &pos in &ZIGZAG[1..] {
        let level = levels[pos];
        if level == 0 {
            run += 1;
            continue;
        }
        while run >= 16 {
            tokens.push(Token {
                table: ac_table,
                symbol: ZRL,
                extra: 0,
                extra_len: 0,
            });
            run -= 16;
        }
        let (size, extra) = category_encode(level);
        tokens.push(Token {
            table: ac_table,
            symbol: (run << 4) | u16::from(size),
            extra,
            extra_len: size,
        });
        run = 0;
    }
    if run > 0 {
        tokens.push(Token {
            table: ac_table,
            symbol: EOB,
            extra: 0,
            extra_len: 0,
        });
    }
}

/// Read one block written by [`tokenize_block`], returning levels in
/// natural order.
///
/// # Errors
///
/// Returns `CorruptBitstream` for undefined symbols or runs that overflow
/// the block, and `Underrun` if the stream ends mid-block.
pub fn read_block(
    reader: &mut BitReader<'_>,
    dc_table: &HuffmanTable,
    ac_table: &HuffmanTable,
    prev_dc: &mut i32,
) -> Result<[i32; 64]> {
    let mut levels = [0i32; 64];

    let cat = dc_table.read_symbol(reader)? as u8;
    let bits = if cat > 0 {
        reader.read_bits(u32::from(cat))?
    } else {
        0
    };
    let dc = prev_dc
        .checked_add(category_decode(cat, bits))
        .ok_or_else(|| CodecError::corrupt("DC value overflow"))?;
    *prev_dc = dc;
    levels[0] = dc;

    let mut k = 1usize;
    while k < 64 {
        let symbol = ac_table.read_symbol(reader)?;
        match symbol {
            EOB => break,
            ZRL => {
                k += 16;
                if k > 64 {
                    return Err(CodecError::corrupt("zero run past end of block"));
                }
            }
            _ => {
                let run = usize::from(symbol >> 4);
                let size = (symbol & 0x0F) as u8;
                if size == 0 {
                    return Err(CodecError::corrupt(format!("undefined AC symbol {symbol:#04x}")));
                }
                k += run;
                if k > 63 {
                    return Err(CodecError::corrupt("AC run past end of block"));
                }
                let bits = reader.read_bits(u32::from(size))?;
                levels[ZIGZAG[k]] = category_decode(size, bits);
                k += 1;
            }
        }
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables_for(tokens: &[Token]) -> [HuffmanTable; 4] {
        let ids = [
            TableId::DcLuma,
            TableId::AcLuma,
            TableId::DcChroma,
            TableId::AcChroma,
        ];
        ids.map(|id| {
            let symbols: Vec<u16> = tokens
                .iter()
                .filter(|t| t.table == id)
                .map(|t| t.symbol)
                .collect();
            HuffmanTable::from_symbols(&symbols, id.alphabet_size())
        })
    }

    #[test]
    fn test_category() {
        assert_eq!(category(0), 0);
        assert_eq!(category(1), 1);
        assert_eq!(category(-1), 1);
        assert_eq!(category(2), 2);
        assert_eq!(category(-3), 2);
        assert_eq!(category(255), 8);
        assert_eq!(category(-1024), 11);
    }

    #[test]
    fn test_category_encode_decode() {
        for v in -2048..=2048 {
            let (cat, bits) = category_encode(v);
            assert_eq!(category_decode(cat, bits), v, "value {v}");
        }
        assert_eq!(category_encode(-1), (1, 0));
        assert_eq!(category_encode(-3), (2, 0));
        assert_eq!(category_encode(3), (2, 3));
    }

    #[test]
    fn test_all_zero_block_is_dc_plus_eob() {
        let mut tokens = Vec::new();
        let mut prev = 0;
        tokenize_block(&[0; 64], &mut prev, TableId::DcLuma, TableId::AcLuma, &mut tokens);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol, 0);
        assert_eq!(tokens[1].symbol, EOB);
    }

    #[test]
    fn test_long_run_uses_zrl() {
        let mut levels = [0i32; 64];
        levels[ZIGZAG[40]] = 5;
        let mut tokens = Vec::new();
        let mut prev = 0;
        tokenize_block(&levels, &mut prev, TableId::DcLuma, TableId::AcLuma, &mut tokens);
        let ac: Vec<u16> = tokens[1..].iter().map(|t| t.symbol).collect();
        // 39 zeros: two ZRLs then run 7, size 3, then EOB
        assert_eq!(ac, vec![ZRL, ZRL, 0x73, EOB]);
    }

    #[test]
    fn test_full_block_has_no_eob() {
        let levels = [1i32; 64];
        let mut tokens = Vec::new();
        let mut prev = 0;
        tokenize_block(&levels, &mut prev, TableId::DcLuma, TableId::AcLuma, &mut tokens);
        assert_eq!(tokens.len(), 64);
        assert!(tokens[1..].iter().all(|t| t.symbol == 0x01));
    }

    #[test]
    fn test_blocks_roundtrip() {
        let mut blocks = Vec::new();
        for b in 0..6 {
            let mut levels = [0i32; 64];
            levels[0] = 40 - b * 13;
            levels[ZIGZAG[1]] = -7 + b;
            levels[ZIGZAG[17 + b as usize]] = 300;
            levels[ZIGZAG[63]] = if b % 2 == 0 { -1 } else { 0 };
            blocks.push(levels);
        }

        let mut tokens = Vec::new();
        let mut prev = 0;
        for levels in &blocks {
            tokenize_block(levels, &mut prev, TableId::DcChroma, TableId::AcChroma, &mut tokens);
        }
        let tables = tables_for(&tokens);
        let mut writer = BitWriter::new();
        for t in &tokens {
            t.write(&mut writer, &tables);
        }
        let bytes = writer.flush();

        let mut reader = BitReader::new(&bytes);
        let mut prev = 0;
        for levels in &blocks {
            let decoded = read_block(
                &mut reader,
                &tables[TableId::DcChroma as usize],
                &tables[TableId::AcChroma as usize],
                &mut prev,
            )
            .unwrap();
            assert_eq!(&decoded, levels);
        }
    }

    #[test]
    fn test_zrl_overflow_rejected() {
        // AC table where ZRL is the only symbol: four ZRLs overrun 63 slots
        let mut freqs = vec![0u32; AC_ALPHABET];
        freqs[ZRL as usize] = 1;
        let ac = HuffmanTable::from_frequencies(&freqs);
        let dc = HuffmanTable::from_symbols(&[0], DC_ALPHABET);

        let mut writer = BitWriter::new();
        dc.write_symbol(&mut writer, 0);
        for _ in 0..4 {
            ac.write_symbol(&mut writer, ZRL);
        }
        let bytes = writer.flush();
        let mut reader = BitReader::new(&bytes);
        let mut prev = 0;
        let err = read_block(&mut reader, &dc, &ac, &mut prev).unwrap_err();
        assert!(matches!(err, CodecError::CorruptBitstream(_)));
    }

    #[test]
    fn test_undefined_symbol_rejected() {
        let ac = HuffmanTable::from_symbols(&[0x30], AC_ALPHABET);
        let dc = HuffmanTable::from_symbols(&[0], DC_ALPHABET);
        let mut writer = BitWriter::new();
        dc.write_symbol(&mut writer, 0);
        ac.write_symbol(&mut writer, 0x30);
        let bytes = writer.flush();
        let mut reader = BitReader::new(&bytes);
        let mut prev = 0;
        assert!(read_block(&mut reader, &dc, &ac, &mut prev).is_err());
    }
}
