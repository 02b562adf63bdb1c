use adler32::RollingAdler32;

use crate::error::{LzopError, Result};

/// Which digest the header declared for one side of a block, if any.
///
/// lzop can checksum the compressed bytes ("C" side, verified before
/// decompression) and the uncompressed bytes ("D" side, verified after),
/// each independently with CRC-32 or Adler-32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    None,
    Crc32,
    Adler32,
}

impl ChecksumKind {
    pub fn is_declared(self) -> bool {
        !matches!(self, ChecksumKind::None)
    }

    /// Bytes this checksum occupies in the block framing.
    pub fn wire_len(self) -> usize {
        if self.is_declared() {
            4
        } else {
            0
        }
    }
}

/// Compute the digest of `data` under `kind`. `None` computes to 0.
///
/// Both algorithms use their zlib conventions (CRC-32 seeded with 0,
/// Adler-32 seeded with 1), matching what lzop writes.
pub fn compute(kind: ChecksumKind, data: &[u8]) -> u32 {
    match kind {
        ChecksumKind::None => 0,
        ChecksumKind::Crc32 => crc32fast::hash(data),
        ChecksumKind::Adler32 => {
            let mut adler = RollingAdler32::new();
            adler.update_buffer(data);
            adler.hash()
        }
    }
}

/// Verify `expected` against the digest of `data`, or fail with a
/// `Checksum` error naming `context`. A `None` kind always passes.
pub fn verify(kind: ChecksumKind, context: &'static str, expected: u32, data: &[u8]) -> Result<()> {
    if !kind.is_declared() {
        return Ok(());
    }
    let computed = compute(kind, data);
    if computed != expected {
        return Err(LzopError::Checksum {
            context,
            expected,
            computed,
        });
    }
    Ok(())
}
