use minilzo_rs::LZO;

use lzop_core::{LzopError, Result};

/// LZO1X decompressor wrapped onto the crate's error taxonomy.
///
/// All lzop methods (LZO1X-1, LZO1X-1(15), LZO1X-999) produce streams the
/// one LZO1X decompressor reads, so a single context serves every file.
/// A failure here is block-level corruption (`Decode`), handled the same
/// way as a checksum mismatch.
pub(crate) struct Lzo1x {
    ctx: LZO,
}

impl Lzo1x {
    pub fn new() -> Result<Self> {
        let ctx = LZO::init().map_err(|e| LzopError::Decode(format!("lzo init failed: {e:?}")))?;
        Ok(Self { ctx })
    }

    /// Decompress `compressed` into exactly `uncompressed_len` bytes.
    ///
    /// Uses the bounds-checked decompressor: the input is untrusted, and a
    /// malformed stream must fail cleanly rather than overrun.
    pub fn decompress(&mut self, compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        let out = self
            .ctx
            .decompress_safe(compressed, uncompressed_len)
            .map_err(|e| LzopError::Decode(format!("lzo1x decompress failed: {e:?}")))?;
        if out.len() != uncompressed_len {
            return Err(LzopError::Decode(format!(
                "lzo1x produced {} bytes, framing declared {uncompressed_len}",
                out.len()
            )));
        }
        Ok(out)
    }
}
