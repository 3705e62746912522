//! Self-describing container around an encoded payload.
//!
//! Header layout (all integers little-endian):
//!
//! ```text
//! 0   4  magic "SPXL"
//! 4   1  stream kind: 0 = lossy, 1 = lossless
//! 5   1  pixel format: 0 = RGB24, 1 = RGBA32
//! 6   4  width
//! 10  4  height
//! 14  4  payload length
//! ```

use crate::config::Limits;
use crate::error::{CodecError, Result};
use crate::types::{buffer_len, ImageInfo, PixelFormat, StreamKind};

/// Container signature.
pub const MAGIC: &[u8; 4] = b"SPXL";

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 18;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: StreamKind,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub payload_len: u32,
}

impl FrameHeader {
    /// Header describing `payload` for an image of the given shape.
    ///
    /// # Errors
    ///
    /// Returns `DimensionOverflow` if the payload is too large for the
    /// 32-bit length field.
    pub fn for_payload(
        kind: StreamKind,
        format: PixelFormat,
        width: u32,
        height: u32,
        payload: &[u8],
    ) -> Result<Self> {
        let payload_len = u32::try_from(payload.len())
            .map_err(|_| CodecError::DimensionOverflow { width, height })?;
        Ok(Self {
            kind,
            format,
            width,
            height,
            payload_len,
        })
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(MAGIC);
        out[4] = self.kind.tag();
        out[5] = self.format.tag();
        out[6..10].copy_from_slice(&self.width.to_le_bytes());
        out[10..14].copy_from_slice(&self.height.to_le_bytes());
        out[14..18].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    /// Stream properties for reporting.
    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            format: self.format,
            kind: self.kind,
            payload_len: self.payload_len as usize,
        }
    }
}

#[inline]
fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Prepend the header to a payload.
pub fn frame(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

/// Read and validate the header only, without checking the payload length.
///
/// # Errors
///
/// * `BadSignature` if the magic doesn't match
/// * `TruncatedOrCorrupt` if the input is shorter than the header
/// * `UnknownTag` for an unknown stream kind or pixel format
/// * `InvalidDimensions` / `DimensionOverflow` / `LimitExceeded` for
///   unusable dimensions
pub fn probe(bytes: &[u8], limits: &Limits) -> Result<FrameHeader> {
    let prefix = bytes.len().min(MAGIC.len());
    if bytes[..prefix] != MAGIC[..prefix] {
        return Err(CodecError::BadSignature);
    }
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::TruncatedOrCorrupt {
            declared: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let kind = StreamKind::from_tag(bytes[4])?;
    let format = PixelFormat::from_tag(bytes[5])?;
    let width = read_u32_le(bytes, 6);
    let height = read_u32_le(bytes, 10);
    let payload_len = read_u32_le(bytes, 14);

    buffer_len(width, height, format)?;
    limits.check(width, height)?;

    Ok(FrameHeader {
        kind,
        format,
        width,
        height,
        payload_len,
    })
}

/// Split a stream into its validated header and payload.
///
/// # Errors
///
/// Everything [`probe`] reports, plus `TruncatedOrCorrupt` if the declared
/// payload length differs from the bytes that follow the header.
pub fn parse<'a>(bytes: &'a [u8], limits: &Limits) -> Result<(FrameHeader, &'a [u8])> {
    let header = probe(bytes, limits)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        return Err(CodecError::TruncatedOrCorrupt {
            declared: header.payload_len as usize,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn header(payload: &[u8]) -> FrameHeader {
        FrameHeader::for_payload(StreamKind::Lossless, PixelFormat::Rgba32, 3, 2, payload).unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let bytes = frame(&header(&[9, 8, 7]), &[9, 8, 7]);
        assert_eq!(&bytes[..4], b"SPXL");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 1);
        assert_eq!(&bytes[6..10], &[3, 0, 0, 0]);
        assert_eq!(&bytes[10..14], &[2, 0, 0, 0]);
        assert_eq!(&bytes[14..18], &[3, 0, 0, 0]);
        assert_eq!(&bytes[18..], &[9, 8, 7]);
    }

    #[test]
    fn test_parse_returns_payload() {
        let bytes = frame(&header(&[1, 2]), &[1, 2]);
        let (parsed, payload) = parse(&bytes, &Limits::default()).unwrap();
        assert_eq!(parsed, header(&[1, 2]));
        assert_eq!(payload, &[1, 2]);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = frame(&header(&[]), &[]);
        bytes[0] = b'X';
        assert_eq!(parse(&bytes, &Limits::default()), Err(CodecError::BadSignature));
        assert_eq!(parse(b"PNG", &Limits::default()), Err(CodecError::BadSignature));
    }

    #[test]
    fn test_signature_prefix_is_truncation() {
        for input in [&b""[..], b"S", b"SPX", b"SPXL\x01"] {
            let err = parse(input, &Limits::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CorruptBitstream, "{input:?}");
        }
    }

    #[test]
    fn test_length_mismatch() {
        let bytes = frame(&header(&[1, 2, 3]), &[1, 2, 3]);
        let err = parse(&bytes[..bytes.len() - 1], &Limits::default()).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedOrCorrupt {
                declared: 3,
                actual: 2
            }
        );

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            parse(&longer, &Limits::default()),
            Err(CodecError::TruncatedOrCorrupt { .. })
        ));
    }

    #[test]
    fn test_unknown_tags() {
        let mut bytes = frame(&header(&[]), &[]);
        bytes[4] = 7;
        assert!(matches!(
            parse(&bytes, &Limits::default()),
            Err(CodecError::UnknownTag { value: 7, .. })
        ));

        let mut bytes = frame(&header(&[]), &[]);
        bytes[5] = 2;
        assert!(matches!(
            parse(&bytes, &Limits::default()),
            Err(CodecError::UnknownTag { value: 2, .. })
        ));
    }

    #[test]
    fn test_zero_dimension() {
        let mut h = header(&[]);
        h.width = 0;
        let bytes = frame(&h, &[]);
        assert!(matches!(
            parse(&bytes, &Limits::default()),
            Err(CodecError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_limits_enforced() {
        let mut h = header(&[]);
        h.width = 20_000;
        let bytes = frame(&h, &[]);
        assert!(matches!(
            parse(&bytes, &Limits::default()),
            Err(CodecError::LimitExceeded { .. })
        ));
        assert!(parse(&bytes, &Limits::unlimited()).is_ok());
    }

    #[test]
    fn test_maximum_dimensions_do_not_overflow() {
        let mut h = header(&[]);
        h.width = u32::MAX;
        h.height = u32::MAX;
        let bytes = frame(&h, &[]);
        let err = parse(&bytes, &Limits::unlimited()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionOverflow);
    }

    #[test]
    fn test_probe_ignores_payload_length() {
        let bytes = frame(&header(&[1, 2, 3, 4]), &[1, 2, 3, 4]);
        let probed = probe(&bytes[..HEADER_LEN], &Limits::default()).unwrap();
        assert_eq!(probed.payload_len, 4);
        assert_eq!(probed.info().payload_len, 4);
    }
}
