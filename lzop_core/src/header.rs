use tracing::debug;

use crate::checksum::{self, ChecksumKind};
use crate::error::{LzopError, Result};
use crate::format::{
    FieldReader, F_ADLER32_C, F_ADLER32_D, F_CRC32_C, F_CRC32_D, F_H_CRC32, F_H_EXTRA_FIELD,
    F_H_FILTER, LZOP_VERSION, MAGIC, MIN_LZOP_VERSION, M_LZO1X_1, M_LZO1X_999,
    VERSION_WITH_EXTENDED_FIELDS,
};

/// Everything the scan layer needs to know about one physical lzop file.
///
/// Parsed once per file and shared read-only across every worker scanning
/// that file (`Arc<FileHeader>`); nothing here is mutated after construction.
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// On-disk format version of the file.
    pub version: u16,
    /// Compression method byte (`M_LZO1X_*`).
    pub method: u8,
    /// Checksum declared over each block's compressed bytes.
    pub input_checksum_kind: ChecksumKind,
    /// Checksum declared over each block's uncompressed bytes.
    pub output_checksum_kind: ChecksumKind,
    /// Exact byte length of the header; the first block starts here.
    pub header_len: u64,
    /// Absolute offsets of every block start, from the sibling index file.
    /// Empty when no index exists, which marks the file non-splittable.
    pub block_offsets: Vec<u64>,
}

impl FileHeader {
    /// A file is splittable iff an index file supplied block offsets.
    pub fn is_splittable(&self) -> bool {
        !self.block_offsets.is_empty()
    }
}

/// Parse the lzop file header from the front of `buf`.
///
/// `buf` must hold at least the full header (peek `MAX_HEADER_SIZE` bytes
/// when opening). Consumes the magic, version fields, method/level, flags,
/// mode and mtime, the length-prefixed filename, the header checksum, and
/// the optional extra field — the filename and extra field are unused but
/// must be walked because `header_len` is the cursor position every block
/// read depends on.
///
/// Any grammar violation is a `Format` error and leaves no partial state.
/// `block_offsets` is returned empty; the caller merges in the index file.
pub fn parse_file_header(buf: &[u8]) -> Result<FileHeader> {
    let mut r = FieldReader::new(buf);

    let magic = r.take(MAGIC.len()).map_err(truncated)?;
    if magic != &MAGIC[..] {
        return Err(LzopError::Format("bad magic: not an lzop file".into()));
    }

    let version = r.u16_be().map_err(truncated)?;
    if version < MIN_LZOP_VERSION {
        return Err(LzopError::Format(format!(
            "unsupported lzop version {version:#06x}"
        )));
    }
    let _lib_version = r.u16_be().map_err(truncated)?;
    if version >= VERSION_WITH_EXTENDED_FIELDS {
        let version_needed = r.u16_be().map_err(truncated)?;
        if !(MIN_LZOP_VERSION..=LZOP_VERSION).contains(&version_needed) {
            return Err(LzopError::Format(format!(
                "file needs lzop version {version_needed:#06x} to extract, newest supported is {LZOP_VERSION:#06x}"
            )));
        }
    }

    let method = r.u8().map_err(truncated)?;
    if !(M_LZO1X_1..=M_LZO1X_999).contains(&method) {
        return Err(LzopError::Format(format!(
            "unsupported compression method {method}"
        )));
    }
    if version >= VERSION_WITH_EXTENDED_FIELDS {
        let _level = r.u8().map_err(truncated)?;
    }

    let flags = r.u32_be().map_err(truncated)?;
    if flags & F_H_FILTER != 0 {
        // A filter rewrites the payload before compression; decoding one
        // would need the inverse transform, which lzop itself barely uses.
        return Err(LzopError::Format("filtered lzop files are not supported".into()));
    }
    let output_checksum_kind = side_kind(flags, F_CRC32_D, F_ADLER32_D, "uncompressed")?;
    let input_checksum_kind = side_kind(flags, F_CRC32_C, F_ADLER32_C, "compressed")?;

    let _mode = r.u32_be().map_err(truncated)?;
    let _mtime_low = r.u32_be().map_err(truncated)?;
    if version >= VERSION_WITH_EXTENDED_FIELDS {
        let _mtime_high = r.u32_be().map_err(truncated)?;
    }

    let name_len = r.u8().map_err(truncated)? as usize;
    let _name = r.take(name_len).map_err(truncated)?;

    // The header checksum covers everything after the magic, up to but not
    // including the stored checksum itself.
    let header_kind = if flags & F_H_CRC32 != 0 {
        ChecksumKind::Crc32
    } else {
        ChecksumKind::Adler32
    };
    let checksummed = &buf[MAGIC.len()..r.consumed()];
    let stored = r.u32_be().map_err(truncated)?;
    checksum::verify(header_kind, "file header", stored, checksummed)
        .map_err(|e| LzopError::Format(e.to_string()))?;

    if flags & F_H_EXTRA_FIELD != 0 {
        let extra_start = r.consumed();
        let extra_len = r.u32_be().map_err(truncated)? as usize;
        let _extra = r.take(extra_len).map_err(truncated)?;
        let extra_checksummed = &buf[extra_start..r.consumed()];
        let extra_stored = r.u32_be().map_err(truncated)?;
        checksum::verify(header_kind, "header extra field", extra_stored, extra_checksummed)
            .map_err(|e| LzopError::Format(e.to_string()))?;
    }

    let header_len = r.consumed() as u64;
    debug!(
        version,
        method,
        header_len,
        ?input_checksum_kind,
        ?output_checksum_kind,
        "parsed lzop header"
    );

    Ok(FileHeader {
        version,
        method,
        input_checksum_kind,
        output_checksum_kind,
        header_len,
        block_offsets: Vec::new(),
    })
}

/// Resolve one side's checksum kind from the flag word. Declaring both
/// CRC-32 and Adler-32 on the same side is not a thing lzop produces.
fn side_kind(flags: u32, crc_bit: u32, adler_bit: u32, side: &str) -> Result<ChecksumKind> {
    match (flags & crc_bit != 0, flags & adler_bit != 0) {
        (true, true) => Err(LzopError::Format(format!(
            "both CRC-32 and Adler-32 declared on the {side} side"
        ))),
        (true, false) => Ok(ChecksumKind::Crc32),
        (false, true) => Ok(ChecksumKind::Adler32),
        (false, false) => Ok(ChecksumKind::None),
    }
}

/// A header cut short is a grammar violation, not a recoverable block error.
fn truncated(e: LzopError) -> LzopError {
    match e {
        LzopError::Decode(msg) => LzopError::Format(format!("truncated header: {msg}")),
        other => other,
    }
}
