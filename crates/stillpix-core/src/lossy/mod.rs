//! Lossy coding: YCbCr, 8x8 DCT, quantization, Huffman, deblocking.
//!
//! # Payload Layout
//!
//! ```text
//! quality level       7 bits   (0-100)
//! subsampled chroma   1 bit
//! filter level        6 bits
//! alpha present       1 bit
//! tables              DC luma, AC luma, DC chroma, AC chroma
//! tokens              Y blocks, then Cb, then Cr, each in raster order
//! if alpha:
//!   alpha plane       lossless plane, 1 channel
//! ```
//!
//! The quantization steps are not stored; both sides derive them from the
//! quality level. Edge blocks are padded by replicating the last row and
//! column.
//!
//! # Level Search
//!
//! Rounding error is not monotone in the step size, so a plain mapping from
//! quality to steps can lose fidelity as quality rises. The encoder walks
//! every level from 0 up to the requested one and moves to a level only when
//! its reconstruction error is no higher and its bitstream no shorter than
//! the current choice. The stored level can therefore be below the requested
//! one. The decoder is unaffected.

mod block;
mod color;
mod dct;
mod filter;
mod quant;

pub use block::{category_decode, category_encode};
pub use dct::Dct;
pub use filter::deblock_plane;
pub use quant::{dequantize, quantize, QuantizationProfile, MAX_FILTER_LEVEL, ZIGZAG};

use tracing::{debug, trace};

use crate::bitio::{BitReader, BitWriter};
use crate::config::CodecConfig;
use crate::entropy::HuffmanTable;
use crate::error::{CodecError, Result};
use crate::lossless::{self, PlaneShape};
use crate::types::{buffer_len, Image, PixelFormat};

use block::{read_block, tokenize_block, TableId, Token};
use color::{
    chroma_dims, downsample, merge_planes, split_planes, upsample, ycbcr_to_rgb, YCbCrPlanes,
};

const TABLE_IDS: [TableId; 4] = [
    TableId::DcLuma,
    TableId::AcLuma,
    TableId::DcChroma,
    TableId::AcChroma,
];

/// Forward-transformed 8x8 blocks of one plane, in raster order.
type Blocks = Vec<[f32; 64]>;

/// Geometry and coding parameters of one block-coded plane.
struct BlockPlane<'a> {
    width: usize,
    height: usize,
    steps: &'a [u16; 64],
    dc: TableId,
    ac: TableId,
}

/// Fixed fields at the start of a lossy payload.
struct PayloadHeader {
    profile: QuantizationProfile,
    subsampled: bool,
    filter_level: u8,
    has_alpha: bool,
}

impl PayloadHeader {
    fn from_level(level: u8, has_alpha: bool) -> Result<Self> {
        let profile = QuantizationProfile::from_level(level)?;
        Ok(Self {
            subsampled: profile.subsample_chroma(),
            filter_level: profile.filter_level(),
            profile,
            has_alpha,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_bits(u32::from(self.profile.level()), 7);
        writer.write_bit(self.subsampled);
        writer.write_bits(u32::from(self.filter_level), 6);
        writer.write_bit(self.has_alpha);
    }

    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let level = reader.read_bits(7)? as u8;
        let profile = QuantizationProfile::from_level(level)?;
        let subsampled = reader.read_bit()?;
        let filter_level = reader.read_bits(6)? as u8;
        let has_alpha = reader.read_bit()?;
        Ok(Self {
            profile,
            subsampled,
            filter_level,
            has_alpha,
        })
    }
}

/// Colour bitstream for one level and its reconstruction error.
struct Candidate {
    level: u8,
    writer: BitWriter,
    error: u64,
}

/// Level-independent analysis shared by every candidate level.
struct LevelSearch<'a> {
    image: &'a Image,
    dct: Dct,
    planes: YCbCrPlanes,
    luma: Blocks,
    half_chroma: [Blocks; 2],
    full_chroma: Option<[Blocks; 2]>,
}

impl<'a> LevelSearch<'a> {
    fn new(image: &'a Image) -> Self {
        let (width, height) = dims(image);
        let dct = Dct::new();
        let planes = split_planes(image.pixels(), image.format().bytes_per_pixel());
        let luma = transform_plane(&planes.y, width, height, &dct);
        let (cw, ch) = chroma_dims(width, height, true);
        let half_chroma = [&planes.cb, &planes.cr]
            .map(|p| transform_plane(&downsample(p, width, height), cw, ch, &dct));
        Self {
            image,
            dct,
            planes,
            luma,
            half_chroma,
            full_chroma: None,
        }
    }

    /// Code the colour planes at `level` and measure the decoded result.
    fn candidate(&mut self, level: u8) -> Result<Candidate> {
        let (width, height) = dims(self.image);
        let header = PayloadHeader::from_level(level, self.image.format().has_alpha())?;
        if !header.subsampled && self.full_chroma.is_none() {
            self.full_chroma = Some(
                [&self.planes.cb, &self.planes.cr]
                    .map(|p| transform_plane(p, width, height, &self.dct)),
            );
        }
        let chroma = match (&self.full_chroma, header.subsampled) {
            (Some(full), false) => full,
            _ => &self.half_chroma,
        };

        let mut tokens = Vec::new();
        tokenize_blocks(
            &self.luma,
            header.profile.luma(),
            (TableId::DcLuma, TableId::AcLuma),
            &mut tokens,
        );
        for plane in chroma {
            tokenize_blocks(
                plane,
                header.profile.chroma(),
                (TableId::DcChroma, TableId::AcChroma),
                &mut tokens,
            );
        }

        let tables = TABLE_IDS.map(|id| {
            let mut freqs = vec![0u32; id.alphabet_size()];
            for t in tokens.iter().filter(|t| t.table == id) {
                freqs[t.symbol as usize] += 1;
            }
            HuffmanTable::from_frequencies(&freqs)
        });

        let mut writer = BitWriter::new();
        header.write(&mut writer);
        for table in &tables {
            table.write_to(&mut writer);
        }
        for token in &tokens {
            token.write(&mut writer, &tables);
        }

        let coded = writer.clone().flush();
        let mut reader = BitReader::new(&coded);
        let header = PayloadHeader::read(&mut reader)?;
        let decoded = read_color(&mut reader, &header, width, height)?;
        let error = color_error(self.image, &decoded);
        trace!(level, error, bits = writer.bit_len(), "lossy: candidate");

        Ok(Candidate {
            level,
            writer,
            error,
        })
    }
}

fn dims(image: &Image) -> (usize, usize) {
    (image.width() as usize, image.height() as usize)
}

/// Sum of absolute RGB differences between `image` and decoded planes.
fn color_error(image: &Image, planes: &YCbCrPlanes) -> u64 {
    image
        .pixels()
        .chunks_exact(image.format().bytes_per_pixel())
        .enumerate()
        .map(|(i, px)| {
            let (r, g, b) = ycbcr_to_rgb(planes.y[i], planes.cb[i], planes.cr[i]);
            [(px[0], r), (px[1], g), (px[2], b)]
                .iter()
                .map(|&(src, out)| u64::from(src.abs_diff(out)))
                .sum::<u64>()
        })
        .sum()
}

/// Encode an image lossily at `quality` (0-100), returning the payload.
///
/// Raising `quality` never raises the decoded error and never shrinks the
/// payload.
///
/// # Errors
///
/// Returns `InvalidQuality` if `quality` is outside 0-100; nothing is
/// encoded in that case.
pub fn encode(image: &Image, quality: f32, config: &CodecConfig) -> Result<Vec<u8>> {
    let requested = QuantizationProfile::from_quality(quality)?;
    let mut search = LevelSearch::new(image);
    let mut best = search.candidate(0)?;
    for level in 1..=requested.level() {
        let next = search.candidate(level)?;
        if next.error <= best.error && next.writer.bit_len() >= best.writer.bit_len() {
            best = next;
        }
    }

    let Candidate {
        level,
        mut writer,
        error,
    } = best;
    if image.format().has_alpha() {
        let (width, height) = dims(image);
        let alpha: Vec<u8> = image.pixels().iter().skip(3).step_by(4).copied().collect();
        let shape = PlaneShape {
            width,
            height,
            channels: 1,
        };
        lossless::write_plane(&mut writer, &alpha, shape, config.effective_tile_bits());
    }

    let payload = writer.flush();
    debug!(
        requested = requested.level(),
        level,
        error,
        coded = payload.len(),
        "lossy: encoded"
    );
    Ok(payload)
}

/// Decode a lossy payload into an image of the given shape.
///
/// # Errors
///
/// * Dimension errors if `width`/`height`/`format` can't describe a buffer
/// * `CorruptBitstream` if header fields are out of range, the alpha flag
///   disagrees with `format`, or the token stream is damaged
/// * `Underrun` if the payload ends early
pub fn decode(payload: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Image> {
    buffer_len(width, height, format)?;
    let width_px = width as usize;
    let height_px = height as usize;
    let mut reader = BitReader::new(payload);

    let header = PayloadHeader::read(&mut reader)?;
    if header.has_alpha != format.has_alpha() {
        return Err(CodecError::corrupt(format!(
            "alpha flag {} does not match {format:?}",
            header.has_alpha
        )));
    }
    let planes = read_color(&mut reader, &header, width_px, height_px)?;

    let alpha = if header.has_alpha {
        let shape = PlaneShape {
            width: width_px,
            height: height_px,
            channels: 1,
        };
        Some(lossless::read_plane(&mut reader, shape)?)
    } else {
        None
    };

    debug!(
        level = header.profile.level(),
        subsampled = header.subsampled,
        filter_level = header.filter_level,
        "lossy: decoded"
    );
    Image::new(width, height, format, merge_planes(&planes, alpha.as_deref()))
}

/// Read tables and blocks, then deblock and upsample to full resolution.
fn read_color(
    reader: &mut BitReader<'_>,
    header: &PayloadHeader,
    width: usize,
    height: usize,
) -> Result<YCbCrPlanes> {
    let (cw, ch) = chroma_dims(width, height, header.subsampled);
    // A block costs at least two bits: its DC symbol and an EOB or AC symbol
    let blocks = block_count(width, height) + 2 * block_count(cw, ch);
    if blocks.saturating_mul(2) > reader.remaining_bits() {
        return Err(CodecError::corrupt(format!(
            "payload too small for {blocks} blocks"
        )));
    }

    let mut tables = Vec::with_capacity(4);
    for id in TABLE_IDS {
        tables.push(HuffmanTable::read_from(reader, id.alphabet_size())?);
    }

    let dct = Dct::new();
    let (luma, chroma) = block_planes(&header.profile, (width, height), (cw, ch));
    let mut y = read_plane_blocks(reader, &tables, &luma, &dct)?;
    let mut cb = read_plane_blocks(reader, &tables, &chroma, &dct)?;
    let mut cr = read_plane_blocks(reader, &tables, &chroma, &dct)?;

    deblock_plane(&mut y, width, height, header.filter_level);
    deblock_plane(&mut cb, cw, ch, header.filter_level);
    deblock_plane(&mut cr, cw, ch, header.filter_level);

    Ok(if header.subsampled {
        YCbCrPlanes {
            y,
            cb: upsample(&cb, width, height),
            cr: upsample(&cr, width, height),
        }
    } else {
        YCbCrPlanes { y, cb, cr }
    })
}

fn block_planes<'a>(
    profile: &'a QuantizationProfile,
    (width, height): (usize, usize),
    (cw, ch): (usize, usize),
) -> (BlockPlane<'a>, BlockPlane<'a>) {
    let luma = BlockPlane {
        width,
        height,
        steps: profile.luma(),
        dc: TableId::DcLuma,
        ac: TableId::AcLuma,
    };
    let chroma = BlockPlane {
        width: cw,
        height: ch,
        steps: profile.chroma(),
        dc: TableId::DcChroma,
        ac: TableId::AcChroma,
    };
    (luma, chroma)
}

fn block_count(width: usize, height: usize) -> usize {
    width.div_ceil(8) * height.div_ceil(8)
}

/// Forward transform every block of a plane.
fn transform_plane(data: &[u8], width: usize, height: usize, dct: &Dct) -> Blocks {
    let mut blocks = Vec::with_capacity(block_count(width, height));
    let mut samples = [0f32; 64];
    for by in 0..height.div_ceil(8) {
        for bx in 0..width.div_ceil(8) {
            for (i, s) in samples.iter_mut().enumerate() {
                let x = (bx * 8 + i % 8).min(width - 1);
                let y = (by * 8 + i / 8).min(height - 1);
                *s = f32::from(data[y * width + x]) - 128.0;
            }
            blocks.push(dct.forward(&samples));
        }
    }
    blocks
}

/// Quantize and tokenize transformed blocks.
fn tokenize_blocks(
    blocks: &[[f32; 64]],
    steps: &[u16; 64],
    (dc, ac): (TableId, TableId),
    tokens: &mut Vec<Token>,
) {
    let mut prev_dc = 0;
    for coeffs in blocks {
        tokenize_block(&quantize(coeffs, steps), &mut prev_dc, dc, ac, tokens);
    }
}

/// Read, dequantize and inverse transform every block of a plane.
///
/// The plane grows one block row at a time, so a damaged stream fails
/// before a full plane is allocated.
fn read_plane_blocks(
    reader: &mut BitReader<'_>,
    tables: &[HuffmanTable],
    plane: &BlockPlane<'_>,
    dct: &Dct,
) -> Result<Vec<u8>> {
    let (width, height) = (plane.width, plane.height);
    let dc_table = &tables[plane.dc as usize];
    let ac_table = &tables[plane.ac as usize];
    let mut out = Vec::new();
    let mut strip = vec![0u8; width * 8];
    let mut prev_dc = 0;
    for by in 0..height.div_ceil(8) {
        for bx in 0..width.div_ceil(8) {
            let levels = read_block(reader, dc_table, ac_table, &mut prev_dc)?;
            let samples = dct.inverse(&dequantize(&levels, plane.steps));
            for (i, &s) in samples.iter().enumerate() {
                let x = bx * 8 + i % 8;
                if x < width {
                    strip[(i / 8) * width + x] = (s + 128.0).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        let rows = (height - by * 8).min(8);
        out.extend_from_slice(&strip[..rows * width]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured_image(width: u32, height: u32, format: PixelFormat) -> Image {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                let b = ((((x as f32) * 0.4).sin() * 60.0 + 128.0) as i32
                    + (((y as f32) * 0.3).cos() * 40.0) as i32)
                    .clamp(0, 255) as u8;
                pixels.extend_from_slice(&[r, g, b]);
                if format.has_alpha() {
                    pixels.push(((x ^ y) * 7) as u8);
                }
            }
        }
        Image::new(width, height, format, pixels).unwrap()
    }

    fn mean_abs_error(a: &Image, b: &Image) -> f64 {
        let total: u64 = a
            .pixels()
            .iter()
            .zip(b.pixels())
            .map(|(&x, &y)| u64::from(x.abs_diff(y)))
            .sum();
        total as f64 / a.pixels().len() as f64
    }

    fn roundtrip(image: &Image, quality: f32) -> (Image, usize) {
        let payload = encode(image, quality, &CodecConfig::default()).unwrap();
        let decoded = decode(&payload, image.width(), image.height(), image.format()).unwrap();
        (decoded, payload.len())
    }

    #[test]
    fn test_dimensions_and_format_preserved() {
        for (w, h) in [(1, 1), (7, 3), (8, 8), (17, 9), (33, 40)] {
            for format in [PixelFormat::Rgb24, PixelFormat::Rgba32] {
                let image = textured_image(w, h, format);
                let (decoded, _) = roundtrip(&image, 75.0);
                assert_eq!(decoded.width(), w);
                assert_eq!(decoded.height(), h);
                assert_eq!(decoded.format(), format);
                assert_eq!(decoded.pixels().len(), image.pixels().len());
            }
        }
    }

    fn noise_image(width: u32, height: u32) -> Image {
        let mut state = 0x2545_f491_u32;
        let pixels = (0..width * height * 3)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();
        Image::new(width, height, PixelFormat::Rgb24, pixels).unwrap()
    }

    #[test]
    fn test_quality_trades_size_for_fidelity() {
        let image = textured_image(64, 64, PixelFormat::Rgb24);
        let (low, low_size) = roundtrip(&image, 10.0);
        let (high, high_size) = roundtrip(&image, 90.0);
        assert!(mean_abs_error(&image, &high) < mean_abs_error(&image, &low));
        assert!(high_size > low_size);
    }

    #[test]
    fn test_quality_sweep_is_monotone() {
        for image in [textured_image(64, 64, PixelFormat::Rgb24), noise_image(32, 32)] {
            let mut prev: Option<(f64, usize)> = None;
            for q in 0..=100u8 {
                let (decoded, size) = roundtrip(&image, f32::from(q));
                let err = mean_abs_error(&image, &decoded);
                if let Some((prev_err, prev_size)) = prev {
                    assert!(err <= prev_err, "error rose at q{q}: {prev_err} -> {err}");
                    assert!(size >= prev_size, "size shrank at q{q}: {prev_size} -> {size}");
                }
                prev = Some((err, size));
            }
        }
    }

    #[test]
    fn test_stored_level_never_exceeds_request() {
        let image = textured_image(16, 16, PixelFormat::Rgb24);
        for q in [0u8, 33, 79, 80, 100] {
            let payload = encode(&image, f32::from(q), &CodecConfig::default()).unwrap();
            let mut reader = BitReader::new(&payload);
            let header = PayloadHeader::read(&mut reader).unwrap();
            assert!(header.profile.level() <= q);
            assert_eq!(header.subsampled, header.profile.subsample_chroma());
        }
    }

    #[test]
    fn test_quality_100_is_close() {
        let image = textured_image(24, 24, PixelFormat::Rgb24);
        let (decoded, _) = roundtrip(&image, 100.0);
        assert!(mean_abs_error(&image, &decoded) < 3.0);
    }

    #[test]
    fn test_flat_image_is_exact_enough() {
        let image = Image::new(16, 16, PixelFormat::Rgb24, vec![90; 16 * 16 * 3]).unwrap();
        let (decoded, _) = roundtrip(&image, 50.0);
        // Level 0 lands at 96; no chosen level does worse
        let first = decoded.pixels()[0];
        assert!(decoded.pixels().iter().all(|&v| v == first));
        assert!(first.abs_diff(90) <= 6, "{first}");
    }

    #[test]
    fn test_alpha_is_lossless() {
        let image = textured_image(13, 11, PixelFormat::Rgba32);
        let (decoded, _) = roundtrip(&image, 20.0);
        let alpha_in: Vec<u8> = image.pixels().iter().skip(3).step_by(4).copied().collect();
        let alpha_out: Vec<u8> = decoded.pixels().iter().skip(3).step_by(4).copied().collect();
        assert_eq!(alpha_in, alpha_out);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let image = textured_image(4, 4, PixelFormat::Rgb24);
        for q in [-1.0, 100.01, f32::NAN] {
            let err = encode(&image, q, &CodecConfig::default()).unwrap_err();
            assert!(matches!(err, CodecError::InvalidQuality(_)));
        }
    }

    #[test]
    fn test_alpha_flag_mismatch_rejected() {
        let image = textured_image(4, 4, PixelFormat::Rgb24);
        let payload = encode(&image, 50.0, &CodecConfig::default()).unwrap();
        assert!(decode(&payload, 4, 4, PixelFormat::Rgba32).is_err());
    }

    #[test]
    fn test_truncated_payload_fails() {
        let image = textured_image(16, 16, PixelFormat::Rgb24);
        let payload = encode(&image, 60.0, &CodecConfig::default()).unwrap();
        for cut in 0..payload.len() {
            assert!(decode(&payload[..cut], 16, 16, PixelFormat::Rgb24).is_err());
        }
    }

    #[test]
    fn test_bad_level_rejected() {
        // Level 127 in the first 7 bits
        let payload = [0xFE, 0x00, 0x00, 0x00];
        let err = decode(&payload, 1, 1, PixelFormat::Rgb24).unwrap_err();
        assert!(matches!(err, CodecError::CorruptBitstream(_)));
    }

    #[test]
    fn test_payload_bound_counts_two_bits_per_block() {
        // 64x64 at full chroma has 192 blocks; 305 bits after the header
        // cover one bit per block but not two
        let mut writer = BitWriter::new();
        writer.write_bits(90, 7);
        writer.write_bit(false);
        writer.write_bits(3, 6);
        writer.write_bit(false);
        for _ in 0..38 {
            writer.write_bits(0, 8);
        }
        let payload = writer.flush();
        assert_eq!(payload.len(), 40);

        match decode(&payload, 64, 64, PixelFormat::Rgb24) {
            Err(CodecError::CorruptBitstream(msg)) => assert!(msg.contains("too small"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_partial_block_rows_are_cropped() {
        let image = textured_image(19, 13, PixelFormat::Rgb24);
        let (decoded, _) = roundtrip(&image, 100.0);
        assert_eq!(decoded.pixels().len(), 19 * 13 * 3);
        assert!(mean_abs_error(&image, &decoded) < 4.0);
    }
}
