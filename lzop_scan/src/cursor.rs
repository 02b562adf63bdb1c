use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use lzop_core::Result;

/// Default amount a [`FileCursor`] reads ahead per fill.
const DEFAULT_READAHEAD: usize = 64 * 1024;

/// Sequential byte supply for one worker's scan.
///
/// The decoder only ever moves forward: it reads framing and payload bytes
/// exactly, peeks ahead of the current position when resynchronizing, and
/// skips over regions another worker owns. Implementations report the
/// absolute file offset so block positions can be checked against the
/// assigned range and the index.
pub trait ByteCursor {
    /// Absolute file offset of the next byte this cursor will return.
    fn offset(&self) -> u64;

    /// Fill `buf` exactly, advancing the cursor. Hitting end of file before
    /// `buf` is full is an error.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Expose up to `len` bytes ahead of the cursor without advancing.
    /// Returns fewer bytes only at end of file.
    fn peek(&mut self, len: usize) -> Result<&[u8]>;

    /// Advance `n` bytes without surfacing them.
    fn skip(&mut self, n: u64) -> Result<()>;

    /// Hint the expected size of upcoming reads so the implementation can
    /// size its readahead. Implementations may ignore it.
    fn set_readahead_hint(&mut self, _bytes: usize) {}
}

// ── In-memory cursor ───────────────────────────────────────────────────────

/// Cursor over an in-memory byte buffer. Used by tests and by callers that
/// already hold the whole file.
pub struct MemoryCursor {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryCursor {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteCursor for MemoryCursor {
    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.data.len() - self.pos < buf.len() {
            return Err(unexpected_eof(self.pos as u64).into());
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn peek(&mut self, len: usize) -> Result<&[u8]> {
        let end = (self.pos + len).min(self.data.len());
        Ok(&self.data[self.pos..end])
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let remaining = (self.data.len() - self.pos) as u64;
        if n > remaining {
            return Err(unexpected_eof(self.pos as u64 + remaining).into());
        }
        self.pos += n as usize;
        Ok(())
    }
}

// ── File-backed cursor ─────────────────────────────────────────────────────

/// Buffered forward cursor over a [`File`].
///
/// Keeps a single readahead buffer; `peek` extends it on demand, so large
/// peeks (up to a full block during resynchronization) never lose the
/// cursor's position.
pub struct FileCursor {
    file: File,
    /// Buffered bytes; `buf[pos..]` is what the cursor has not yet returned.
    buf: Vec<u8>,
    pos: usize,
    /// Absolute file offset of `buf[0]`.
    base: u64,
    readahead: usize,
    /// True once `file` has reported end of file.
    at_eof: bool,
}

impl FileCursor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            buf: Vec::new(),
            pos: 0,
            base: 0,
            readahead: DEFAULT_READAHEAD,
            at_eof: false,
        })
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Ensure at least `want` bytes are buffered past `pos`, or as many as
    /// the file has left.
    fn fill(&mut self, want: usize) -> Result<()> {
        if self.available() >= want || self.at_eof {
            return Ok(());
        }
        // Drop consumed bytes before growing the buffer.
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.base += self.pos as u64;
            self.pos = 0;
        }
        while self.buf.len() < want {
            let target = self.buf.len() + self.readahead.max(want - self.buf.len());
            let old_len = self.buf.len();
            self.buf.resize(target, 0);
            let n = self.file.read(&mut self.buf[old_len..])?;
            self.buf.truncate(old_len + n);
            if n == 0 {
                self.at_eof = true;
                break;
            }
        }
        Ok(())
    }
}

impl ByteCursor for FileCursor {
    fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.fill(buf.len())?;
        if self.available() < buf.len() {
            return Err(unexpected_eof(self.base + self.buf.len() as u64).into());
        }
        buf.copy_from_slice(&self.buf[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn peek(&mut self, len: usize) -> Result<&[u8]> {
        self.fill(len)?;
        let end = (self.pos + len).min(self.buf.len());
        Ok(&self.buf[self.pos..end])
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        if n <= self.available() as u64 {
            self.pos += n as usize;
            return Ok(());
        }
        // Skip past the buffer: seek the file and start fresh.
        let target = self.offset() + n;
        self.file.seek(SeekFrom::Start(target))?;
        self.buf.clear();
        self.pos = 0;
        self.base = target;
        self.at_eof = false;
        Ok(())
    }

    fn set_readahead_hint(&mut self, bytes: usize) {
        self.readahead = bytes.max(1);
    }
}

fn unexpected_eof(offset: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("unexpected end of file at offset {offset}"),
    )
}
