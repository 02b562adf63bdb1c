use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use lzop_core::{load_index, parse_file_header, FileHeader, LzopError, Result, MAX_HEADER_SIZE};

/// Parse a file's header and merge in its sibling index.
///
/// Reads at most `MAX_HEADER_SIZE` bytes of the data file. The index, when
/// present, is validated against the header: its first offset must be the
/// first block (immediately after the header) and its last offset must fall
/// inside the file, otherwise it indexes some other file and trusting it
/// would corrupt every split.
pub fn open_file_header(path: &Path) -> Result<FileHeader> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; MAX_HEADER_SIZE];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);

    let mut header = parse_file_header(&buf)?;
    let offsets = load_index(path)?;
    if let (Some(&first), Some(&last)) = (offsets.first(), offsets.last()) {
        if first != header.header_len {
            return Err(LzopError::Format(format!(
                "index first offset {first} does not match header end {}",
                header.header_len
            )));
        }
        let file_len = file.metadata()?.len();
        if last >= file_len {
            return Err(LzopError::Format(format!(
                "index last offset {last} is beyond file length {file_len}"
            )));
        }
    }
    header.block_offsets = offsets;
    Ok(header)
}

/// Parse-once cache of per-file headers.
///
/// The header is immutable after construction and shared read-only by every
/// worker scanning the file; the lock is held only for the brief
/// parse-and-publish step of the first opener, and lookups after that clone
/// an `Arc`.
pub struct HeaderCache {
    inner: Mutex<HashMap<PathBuf, Arc<FileHeader>>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<FileHeader>> {
        let mut map = self.inner.lock().expect("header cache lock poisoned");
        if let Some(header) = map.get(path) {
            return Ok(header.clone());
        }
        let header = Arc::new(open_file_header(path)?);
        debug!(file = %path.display(), "published shared file header");
        map.insert(path.to_path_buf(), header.clone());
        Ok(header)
    }

    /// Drop a file's cached header, e.g. after its scan completes.
    pub fn evict(&self, path: &Path) {
        let mut map = self.inner.lock().expect("header cache lock poisoned");
        map.remove(path);
    }
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}
