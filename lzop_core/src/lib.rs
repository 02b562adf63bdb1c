pub mod checksum;
pub mod error;
pub mod format;
pub mod header;
pub mod index;

pub use checksum::ChecksumKind;
pub use error::{LzopError, Result};
pub use format::{BlockFraming, MAX_BLOCK_SIZE, MAX_HEADER_SIZE, MIN_HEADER_SIZE};
pub use header::{parse_file_header, FileHeader};
pub use index::{index_path, load_index};
