//! Lossless coding: palette, colour decorrelation, prediction, Huffman.
//!
//! # Payload Layout
//!
//! All fields are packed MSB-first by [`BitWriter`]:
//!
//! ```text
//! palette flag        1 bit
//! if palette:
//!   size - 1          8 bits
//!   entries           size x channels x 8 bits
//!   plane             index plane, 1 channel
//! else:
//!   subtract-green    1 bit
//!   plane             pixel plane, `channels` channels
//! ```
//!
//! A plane is: tile bits (3 bits), the filter table and one filter symbol
//! per tile, one residual table per channel, then the residual symbols in
//! raster order with channels interleaved.
//!
//! Decoding never searches: every choice the encoder made is in the payload,
//! and all reconstruction arithmetic is integer.

mod color;
mod palette;
mod predictor;

pub use predictor::{paeth_predictor, Filter, PlaneShape, FILTER_COUNT};

use tracing::{debug, trace};

use crate::bitio::{BitReader, BitWriter};
use crate::config::CodecConfig;
use crate::entropy::HuffmanTable;
use crate::error::{CodecError, Result};
use crate::types::{buffer_len, Image, PixelFormat};

use color::{add_green, subtract_green};
use palette::Palette;
use predictor::{reconstruct, residuals, select_filters};

/// Encode an image losslessly, returning the payload.
pub fn encode(image: &Image, config: &CodecConfig) -> Vec<u8> {
    let channels = image.format().bytes_per_pixel();
    let width = image.width() as usize;
    let height = image.height() as usize;
    let tile_bits = config.effective_tile_bits();
    let mut writer = BitWriter::with_capacity(image.pixels().len() / 2);

    let palette = Palette::build(
        image.pixels(),
        channels,
        config.effective_palette_threshold(),
    );

    if let Some(palette) = palette {
        debug!(colors = palette.len(), "lossless: using palette");
        writer.write_bit(true);
        writer.write_bits((palette.len() - 1) as u32, 8);
        for i in 0..palette.len() {
            writer.write_bytes(&palette.entry_bytes(i));
        }
        let indices = palette.to_indices(image.pixels());
        let shape = PlaneShape {
            width,
            height,
            channels: 1,
        };
        write_plane(&mut writer, &indices, shape, tile_bits);
    } else {
        writer.write_bit(false);
        let shape = PlaneShape {
            width,
            height,
            channels,
        };
        let mut decorrelated = image.pixels().to_vec();
        subtract_green(&mut decorrelated, channels);

        let (plain_filters, plain_bits) = select_filters(image.pixels(), shape, tile_bits);
        let (green_filters, green_bits) = select_filters(&decorrelated, shape, tile_bits);
        trace!(plain_bits, green_bits, "lossless: residual estimates");

        if green_bits < plain_bits {
            debug!("lossless: using subtract-green");
            writer.write_bit(true);
            write_plane_with(&mut writer, &decorrelated, shape, tile_bits, &green_filters);
        } else {
            writer.write_bit(false);
            write_plane_with(&mut writer, image.pixels(), shape, tile_bits, &plain_filters);
        }
    }

    let payload = writer.flush();
    debug!(
        raw = image.pixels().len(),
        coded = payload.len(),
        "lossless: encoded"
    );
    payload
}

/// Decode a lossless payload into an image of the given shape.
///
/// # Errors
///
/// * Dimension errors if `width`/`height`/`format` can't describe a buffer
/// * `CorruptBitstream` or `Underrun` if the payload is damaged
pub fn decode(payload: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Image> {
    buffer_len(width, height, format)?;
    let channels = format.bytes_per_pixel();
    let width_px = width as usize;
    let height_px = height as usize;
    let mut reader = BitReader::new(payload);

    let pixels = if reader.read_bit()? {
        let size = reader.read_bits(8)? as usize + 1;
        let mut entries = Vec::with_capacity(size * channels);
        for _ in 0..size * channels {
            entries.push(reader.read_u8()?);
        }
        let palette = Palette::from_entries(&entries, channels);
        let shape = PlaneShape {
            width: width_px,
            height: height_px,
            channels: 1,
        };
        let indices = read_plane(&mut reader, shape)?;
        palette.expand(&indices)?
    } else {
        let green = reader.read_bit()?;
        let shape = PlaneShape {
            width: width_px,
            height: height_px,
            channels,
        };
        let mut pixels = read_plane(&mut reader, shape)?;
        if green {
            add_green(&mut pixels, channels);
        }
        pixels
    };

    Image::new(width, height, format, pixels)
}

/// Predict and entropy code a plane, choosing filters per tile.
pub(crate) fn write_plane(writer: &mut BitWriter, data: &[u8], shape: PlaneShape, tile_bits: u8) {
    let (filters, _) = select_filters(data, shape, tile_bits);
    write_plane_with(writer, data, shape, tile_bits, &filters);
}

fn write_plane_with(
    writer: &mut BitWriter,
    data: &[u8],
    shape: PlaneShape,
    tile_bits: u8,
    filters: &[Filter],
) {
    writer.write_bits(u32::from(tile_bits), 3);

    let filter_symbols: Vec<u16> = filters.iter().map(|&f| f as u16).collect();
    let filter_table = HuffmanTable::from_symbols(&filter_symbols, FILTER_COUNT);
    filter_table.write_to(writer);
    for &s in &filter_symbols {
        filter_table.write_symbol(writer, s);
    }

    let res = residuals(data, shape, tile_bits, filters);
    let tables: Vec<HuffmanTable> = (0..shape.channels)
        .map(|c| {
            let mut freqs = vec![0u32; 256];
            for &r in res.iter().skip(c).step_by(shape.channels) {
                freqs[r as usize] += 1;
            }
            HuffmanTable::from_frequencies(&freqs)
        })
        .collect();
    for table in &tables {
        table.write_to(writer);
    }
    for px in res.chunks_exact(shape.channels) {
        for (table, &r) in tables.iter().zip(px) {
            table.write_symbol(writer, u16::from(r));
        }
    }
}

/// Read a plane written by [`write_plane`].
pub(crate) fn read_plane(reader: &mut BitReader<'_>, shape: PlaneShape) -> Result<Vec<u8>> {
    let tile_bits = reader.read_bits(3)? as u8;
    if !(2..=6).contains(&tile_bits) {
        return Err(CodecError::corrupt(format!("invalid tile bits {tile_bits}")));
    }
    // Every sample costs at least one bit, so a short payload can't be real
    if shape.len() > reader.remaining_bits() {
        return Err(CodecError::corrupt(format!(
            "payload too small for {} samples",
            shape.len()
        )));
    }

    let filter_table = HuffmanTable::read_from(reader, FILTER_COUNT)?;
    let tile_count = shape.tile_count(tile_bits);
    let mut filters = Vec::with_capacity(tile_count);
    for _ in 0..tile_count {
        let symbol = filter_table.read_symbol(reader)?;
        let filter = Filter::from_symbol(symbol)
            .ok_or_else(|| CodecError::corrupt(format!("unknown filter {symbol}")))?;
        filters.push(filter);
    }

    let mut tables = Vec::with_capacity(shape.channels);
    for _ in 0..shape.channels {
        tables.push(HuffmanTable::read_from(reader, 256)?);
    }

    let mut data = Vec::with_capacity(shape.len());
    for _ in 0..shape.width * shape.height {
        for table in &tables {
            data.push(table.read_symbol(reader)? as u8);
        }
    }

    reconstruct(&mut data, shape, tile_bits, &filters);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(image: &Image, config: &CodecConfig) -> Image {
        let payload = encode(image, config);
        decode(&payload, image.width(), image.height(), image.format()).unwrap()
    }

    fn noisy_image(width: u32, height: u32, format: PixelFormat) -> Image {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        let mut state = 0x1234_5678u32;
        let pixels = (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();
        Image::new(width, height, format, pixels).unwrap()
    }

    #[test]
    fn test_two_by_two_roundtrip() {
        let pixels = vec![0, 0, 0, 255, 255, 255, 128, 64, 32, 10, 20, 30];
        let image = Image::new(2, 2, PixelFormat::Rgb24, pixels.clone()).unwrap();
        let decoded = roundtrip(&image, &CodecConfig::default());
        assert_eq!(decoded.pixels(), pixels.as_slice());
        assert_eq!(decoded.pixels().len(), 12);
    }

    #[test]
    fn test_single_pixel() {
        for format in [PixelFormat::Rgb24, PixelFormat::Rgba32] {
            let image = Image::new(1, 1, format, vec![17; format.bytes_per_pixel()]).unwrap();
            assert_eq!(roundtrip(&image, &CodecConfig::default()), image);
        }
    }

    #[test]
    fn test_noise_without_palette() {
        let image = noisy_image(37, 23, PixelFormat::Rgba32);
        assert_eq!(roundtrip(&image, &CodecConfig::default()), image);
    }

    #[test]
    fn test_palette_disabled() {
        let mut config = CodecConfig::default();
        config.palette_threshold = 0;
        let image = Image::new(4, 4, PixelFormat::Rgb24, vec![200; 48]).unwrap();
        assert_eq!(roundtrip(&image, &config), image);
    }

    #[test]
    fn test_gradient_compresses() {
        let (w, h) = (64u32, 64u32);
        let mut pixels = Vec::new();
        for y in 0..h {
            for x in 0..w {
                pixels.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8]);
            }
        }
        let image = Image::new(w, h, PixelFormat::Rgb24, pixels).unwrap();
        let payload = encode(&image, &CodecConfig::default());
        assert!(payload.len() < image.pixels().len() / 4);
        let decoded = decode(&payload, w, h, PixelFormat::Rgb24).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_every_tile_size() {
        let image = noisy_image(19, 11, PixelFormat::Rgb24);
        for bits in 2..=6 {
            let mut config = CodecConfig::default();
            config.predictor_tile_bits = bits;
            config.palette_threshold = 0;
            assert_eq!(roundtrip(&image, &config), image, "tile bits {bits}");
        }
    }

    #[test]
    fn test_truncated_payload_fails() {
        let image = noisy_image(8, 8, PixelFormat::Rgb24);
        let payload = encode(&image, &CodecConfig::default());
        for cut in 0..payload.len() {
            let result = decode(&payload[..cut], 8, 8, PixelFormat::Rgb24);
            assert!(result.is_err(), "truncated to {cut} bytes decoded");
        }
    }

    #[test]
    fn test_oversized_dimensions_rejected_before_allocation() {
        let image = Image::new(2, 2, PixelFormat::Rgb24, vec![1; 12]).unwrap();
        let payload = encode(&image, &CodecConfig::default());
        let err = decode(&payload, 10_000, 10_000, PixelFormat::Rgb24).unwrap_err();
        assert!(matches!(err, CodecError::CorruptBitstream(_)));
    }
}
