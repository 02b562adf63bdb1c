use thiserror::Error;

/// Error taxonomy for lzop container decoding.
///
/// `Format` means the header or index file violates the container grammar and
/// is fatal at open time. `Checksum`, `Size` and `Decode` mark block-level
/// corruption; the scan layer may attempt resynchronization past them when an
/// index file exists. `Decode` is also what surfaces when resynchronization
/// itself gives up.
#[derive(Error, Debug)]
pub enum LzopError {
    #[error("format error: {0}")]
    Format(String),

    #[error("{context} checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    Checksum {
        context: &'static str,
        expected: u32,
        computed: u32,
    },

    #[error("block size out of bounds: {0}")]
    Size(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LzopError>;

impl LzopError {
    /// Block-level corruption the scan layer may resynchronize past.
    ///
    /// `Format` and `Io` are never recoverable: the former means the file is
    /// not an lzop file at all, the latter that the byte source itself failed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LzopError::Checksum { .. } | LzopError::Size(_) | LzopError::Decode(_)
        )
    }
}
