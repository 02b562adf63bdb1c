use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LzopError, Result};

/// Conventional sibling index path: the data file's name with `.index`
/// appended (`part-00000.lzo` → `part-00000.lzo.index`).
pub fn index_path(data_path: &Path) -> PathBuf {
    let mut name = data_path.as_os_str().to_os_string();
    name.push(".index");
    PathBuf::from(name)
}

/// Load the sibling index for `data_path`, if one exists.
///
/// The index is a dense sequence of 8-byte big-endian absolute offsets, one
/// per block, each pointing at the block's `uncompressed_size` field.
///
/// An absent index is not an error: it returns an empty vector, the signal
/// that the file is non-splittable. A *present* index that is malformed —
/// length not a multiple of 8, or offsets not strictly increasing — is a
/// `Format` error, because trusting it would misplace every split.
pub fn load_index(data_path: &Path) -> Result<Vec<u64>> {
    let path = index_path(data_path);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(file = %data_path.display(), "no index file, treating as non-splittable");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    if bytes.len() % 8 != 0 {
        return Err(LzopError::Format(format!(
            "index file {} has length {} (not a multiple of 8)",
            path.display(),
            bytes.len()
        )));
    }

    let mut offsets = Vec::with_capacity(bytes.len() / 8);
    for chunk in bytes.chunks_exact(8) {
        let offset = u64::from_be_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        if let Some(&prev) = offsets.last() {
            if offset <= prev {
                return Err(LzopError::Format(format!(
                    "index file {} offsets not strictly increasing ({prev} then {offset})",
                    path.display()
                )));
            }
        }
        offsets.push(offset);
    }

    debug!(
        file = %data_path.display(),
        blocks = offsets.len(),
        "loaded block index"
    );
    Ok(offsets)
}
