use crate::checksum::ChecksumKind;
use crate::error::{LzopError, Result};

/// Magic bytes opening every lzop file: `\x89 L Z O \0 \r \n \x1a \n`.
pub const MAGIC: &[u8; 9] = &[0x89, 0x4c, 0x5a, 0x4f, 0x00, 0x0d, 0x0a, 0x1a, 0x0a];

/// Newest lzop on-disk version this decoder understands.
pub const LZOP_VERSION: u16 = 0x1040;

/// Oldest header layout we accept. Anything earlier predates the fields the
/// parser relies on.
pub const MIN_LZOP_VERSION: u16 = 0x0900;

/// Headers from 0x0940 onward carry `version_needed`, the compression level
/// byte, and the high half of the mtime.
pub const VERSION_WITH_EXTENDED_FIELDS: u16 = 0x0940;

/// Smallest possible header (old version, empty filename).
pub const MIN_HEADER_SIZE: usize = 32;

/// Upper bound on the header length: fixed fields plus a 255-byte filename
/// and a little slack. Used as the peek/readahead size when opening a file.
pub const MAX_HEADER_SIZE: usize = 300;

/// Hard cap on both declared block sizes. lzop never writes blocks larger
/// than 256 KiB, so a bigger value in the framing is corruption, not a legal
/// encoding.
pub const MAX_BLOCK_SIZE: u32 = 256 * 1024;

// ── Header flag bits ───────────────────────────────────────────────────────

/// Adler-32 over the uncompressed (decompressed-side, "D") bytes of each block.
pub const F_ADLER32_D: u32 = 0x0000_0001;
/// Adler-32 over the compressed-side ("C") bytes of each block.
pub const F_ADLER32_C: u32 = 0x0000_0002;
/// An extra field (u32 length + data + checksum) follows the header checksum.
pub const F_H_EXTRA_FIELD: u32 = 0x0000_0040;
/// CRC-32 over the uncompressed bytes of each block.
pub const F_CRC32_D: u32 = 0x0000_0100;
/// CRC-32 over the compressed bytes of each block.
pub const F_CRC32_C: u32 = 0x0000_0200;
/// A filter id follows the flags word. Filters rewrite the data before
/// compression; we reject them.
pub const F_H_FILTER: u32 = 0x0000_0800;
/// The header checksum is CRC-32 rather than Adler-32.
pub const F_H_CRC32: u32 = 0x0000_1000;

// ── Compression methods ────────────────────────────────────────────────────

pub const M_LZO1X_1: u8 = 1;
pub const M_LZO1X_1_15: u8 = 2;
pub const M_LZO1X_999: u8 = 3;

// ── Block framing ──────────────────────────────────────────────────────────

/// Size and checksum fields preceding one block's payload.
///
/// Wire layout (all big-endian u32):
///
/// ```text
/// uncompressed_size            0 = end-of-stream marker, nothing follows
/// compressed_size
/// [output_checksum]            iff the header declared an uncompressed-side kind
/// [input_checksum]             iff the header declared a compressed-side kind
///                              AND the block is not stored
/// <compressed_size payload bytes>
/// ```
///
/// `compressed_size == uncompressed_size` marks a stored block: the payload
/// is the raw bytes, and the compressed-side checksum is omitted because it
/// would duplicate the uncompressed-side one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFraming {
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    /// Checksum of the uncompressed payload, verified after decompression.
    pub output_checksum: Option<u32>,
    /// Checksum of the compressed payload, verified before decompression.
    pub input_checksum: Option<u32>,
}

impl BlockFraming {
    /// Largest possible wire size of the framing: two sizes plus two checksums.
    pub const MAX_WIRE_SIZE: usize = 16;

    /// The payload is stored verbatim, no decompression call needed.
    pub fn is_stored(&self) -> bool {
        self.compressed_size == self.uncompressed_size
    }

    /// Parse one block's framing from the front of `buf`.
    ///
    /// Returns `Ok(None)` for the end-of-stream marker (`uncompressed_size`
    /// of zero), otherwise the framing and the number of bytes it occupied.
    /// Size fields outside their legal bounds are corruption (`Size`); a
    /// buffer too short to hold the declared fields is `Decode` so the scan
    /// layer can treat a truncated tail like any other corrupt block.
    pub fn parse(
        buf: &[u8],
        output_kind: ChecksumKind,
        input_kind: ChecksumKind,
    ) -> Result<Option<(Self, usize)>> {
        let mut r = FieldReader::new(buf);
        let uncompressed_size = r.u32_be()?;
        if uncompressed_size == 0 {
            return Ok(None);
        }
        if uncompressed_size > MAX_BLOCK_SIZE {
            return Err(LzopError::Size(format!(
                "uncompressed size {uncompressed_size} exceeds cap {MAX_BLOCK_SIZE}"
            )));
        }
        let compressed_size = r.u32_be()?;
        if compressed_size == 0 || compressed_size > uncompressed_size {
            return Err(LzopError::Size(format!(
                "compressed size {compressed_size} outside (0, {uncompressed_size}]"
            )));
        }

        let output_checksum = if output_kind.is_declared() {
            Some(r.u32_be()?)
        } else {
            None
        };
        // Stored blocks omit the compressed-side checksum on the wire.
        let input_checksum = if input_kind.is_declared() && compressed_size != uncompressed_size {
            Some(r.u32_be()?)
        } else {
            None
        };

        Ok(Some((
            Self {
                uncompressed_size,
                compressed_size,
                output_checksum,
                input_checksum,
            },
            r.consumed(),
        )))
    }
}

/// Cursor over a byte slice for the fixed-width big-endian fields used
/// throughout the container.
pub(crate) struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(LzopError::Decode(format!(
                "truncated field: wanted {n} bytes at offset {}, {} available",
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framing_bytes(us: u32, cs: u32, checksums: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&us.to_be_bytes());
        out.extend_from_slice(&cs.to_be_bytes());
        for c in checksums {
            out.extend_from_slice(&c.to_be_bytes());
        }
        out
    }

    #[test]
    fn parses_plain_framing_without_checksums() {
        let buf = framing_bytes(1000, 400, &[]);
        let (f, consumed) =
            BlockFraming::parse(&buf, ChecksumKind::None, ChecksumKind::None)
                .unwrap()
                .unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(f.uncompressed_size, 1000);
        assert_eq!(f.compressed_size, 400);
        assert!(!f.is_stored());
        assert_eq!(f.output_checksum, None);
        assert_eq!(f.input_checksum, None);
    }

    #[test]
    fn zero_uncompressed_size_is_end_marker() {
        let buf = framing_bytes(0, 0, &[]);
        let parsed =
            BlockFraming::parse(&buf, ChecksumKind::Adler32, ChecksumKind::Adler32).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn stored_block_omits_input_checksum() {
        let buf = framing_bytes(512, 512, &[0xAABBCCDD]);
        let (f, consumed) =
            BlockFraming::parse(&buf, ChecksumKind::Adler32, ChecksumKind::Adler32)
                .unwrap()
                .unwrap();
        assert_eq!(consumed, 12);
        assert!(f.is_stored());
        assert_eq!(f.output_checksum, Some(0xAABBCCDD));
        assert_eq!(f.input_checksum, None);
    }

    #[test]
    fn both_checksums_read_in_output_then_input_order() {
        let buf = framing_bytes(1000, 400, &[0x11111111, 0x22222222]);
        let (f, consumed) =
            BlockFraming::parse(&buf, ChecksumKind::Crc32, ChecksumKind::Adler32)
                .unwrap()
                .unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(f.output_checksum, Some(0x11111111));
        assert_eq!(f.input_checksum, Some(0x22222222));
    }

    #[test]
    fn oversized_block_is_size_error() {
        let buf = framing_bytes(MAX_BLOCK_SIZE + 1, 100, &[]);
        let err = BlockFraming::parse(&buf, ChecksumKind::None, ChecksumKind::None).unwrap_err();
        assert!(matches!(err, LzopError::Size(_)));
    }

    #[test]
    fn compressed_larger_than_uncompressed_is_size_error() {
        let buf = framing_bytes(100, 200, &[]);
        let err = BlockFraming::parse(&buf, ChecksumKind::None, ChecksumKind::None).unwrap_err();
        assert!(matches!(err, LzopError::Size(_)));

        let buf = framing_bytes(100, 0, &[]);
        let err = BlockFraming::parse(&buf, ChecksumKind::None, ChecksumKind::None).unwrap_err();
        assert!(matches!(err, LzopError::Size(_)));
    }

    #[test]
    fn truncated_framing_is_decode_error() {
        let buf = framing_bytes(1000, 400, &[]);
        let err = BlockFraming::parse(&buf[..6], ChecksumKind::None, ChecksumKind::None)
            .unwrap_err();
        assert!(matches!(err, LzopError::Decode(_)));
        assert!(err.is_recoverable());
    }
}
