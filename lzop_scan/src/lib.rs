pub mod buffer;
pub mod cursor;
pub mod decoder;
pub mod header_cache;
pub mod resync;
pub mod split;

mod lzo;

pub use buffer::BufferPool;
pub use cursor::{ByteCursor, FileCursor, MemoryCursor};
pub use decoder::{BlockDecoder, DecodedBlock, DecoderOptions, ScanCursor, ScanStream};
pub use header_cache::{open_file_header, HeaderCache};
pub use resync::{resync, Resync, RESYNC_WINDOW};
pub use split::{plan_split, SplitPlan};

pub use lzop_core::{ChecksumKind, FileHeader, LzopError, Result};
