//! Bit-level reading and writing.
//!
//! # Bit Order
//!
//! Bits are packed **MSB-first**: the first bit written lands in the most
//! significant bit of the first byte, and multi-bit values are written from
//! their most significant bit down. [`BitWriter`] and [`BitReader`] both
//! follow this order for the entire stream, including Huffman codes, raw
//! extra bits and serialized tables.
//!
//! The final partial byte is padded with zero bits. Nothing in the stream
//! records the pad count: every decoder knows how many symbols it expects,
//! so it never reads into the padding.

mod reader;
mod writer;

pub use reader::BitReader;
pub use writer::BitWriter;
