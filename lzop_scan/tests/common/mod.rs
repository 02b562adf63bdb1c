//! Test-only lzop writer: builds bit-exact container files (and sibling
//! index files) so the decoder can be exercised against genuine input.
//! The library itself never compresses; this lives with the tests.

use std::fs;
use std::path::{Path, PathBuf};

use minilzo_rs::LZO;

use lzop_core::checksum::{self, ChecksumKind};
use lzop_core::format::{
    F_ADLER32_C, F_ADLER32_D, F_CRC32_C, F_CRC32_D, MAGIC, M_LZO1X_1,
};
use lzop_core::{parse_file_header, FileHeader};

pub struct FixtureOptions {
    /// Checksum over each block's uncompressed bytes (the "D" side).
    pub output_checksum: ChecksumKind,
    /// Checksum over each block's compressed bytes (the "C" side).
    pub input_checksum: ChecksumKind,
    /// Raw bytes per block.
    pub block_size: usize,
    pub filename: &'static [u8],
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            output_checksum: ChecksumKind::Adler32,
            input_checksum: ChecksumKind::Adler32,
            block_size: 4096,
            filename: b"fixture.txt",
        }
    }
}

pub struct Fixture {
    /// The complete lzop file image.
    pub bytes: Vec<u8>,
    /// Absolute offset of every block's `uncompressed_size` field.
    pub block_offsets: Vec<u64>,
    /// The raw data the file encodes.
    pub raw: Vec<u8>,
}

impl Fixture {
    /// Parse this fixture's header the way the scan layer would, attaching
    /// the block offsets iff `splittable`.
    pub fn header(&self, splittable: bool) -> FileHeader {
        let mut header = parse_file_header(&self.bytes).expect("fixture header must parse");
        if splittable {
            header.block_offsets = self.block_offsets.clone();
        }
        header
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Write the data file and, optionally, the sibling index to `dir`.
    pub fn write_to(&self, dir: &Path, name: &str, with_index: bool) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, &self.bytes).unwrap();
        let index = lzop_core::index_path(&path);
        if with_index {
            let mut bytes = Vec::new();
            for offset in &self.block_offsets {
                bytes.extend_from_slice(&offset.to_be_bytes());
            }
            fs::write(index, bytes).unwrap();
        } else {
            let _ = fs::remove_file(index);
        }
        path
    }
}

fn checksum_flags(output: ChecksumKind, input: ChecksumKind) -> u32 {
    let mut flags = 0;
    flags |= match output {
        ChecksumKind::None => 0,
        ChecksumKind::Crc32 => F_CRC32_D,
        ChecksumKind::Adler32 => F_ADLER32_D,
    };
    flags |= match input {
        ChecksumKind::None => 0,
        ChecksumKind::Crc32 => F_CRC32_C,
        ChecksumKind::Adler32 => F_ADLER32_C,
    };
    flags
}

/// Encode `data` as an lzop file the way lzop 1.04 with `-P` would.
pub fn build_lzop(data: &[u8], opts: &FixtureOptions) -> Fixture {
    let mut out = Vec::new();

    // ── Header ─────────────────────────────────────────────────────────────
    out.extend_from_slice(MAGIC);
    let body_start = out.len();
    out.extend_from_slice(&0x1040u16.to_be_bytes()); // version
    out.extend_from_slice(&0x2080u16.to_be_bytes()); // lib version
    out.extend_from_slice(&0x0940u16.to_be_bytes()); // version needed to extract
    out.push(M_LZO1X_1);
    out.push(5); // level
    out.extend_from_slice(&checksum_flags(opts.output_checksum, opts.input_checksum).to_be_bytes());
    out.extend_from_slice(&0o100644u32.to_be_bytes()); // mode
    out.extend_from_slice(&0u32.to_be_bytes()); // mtime low
    out.extend_from_slice(&0u32.to_be_bytes()); // mtime high
    out.push(opts.filename.len() as u8);
    out.extend_from_slice(opts.filename);
    let header_ck = checksum::compute(ChecksumKind::Adler32, &out[body_start..]);
    out.extend_from_slice(&header_ck.to_be_bytes());

    // ── Blocks ─────────────────────────────────────────────────────────────
    let mut lzo = LZO::init().unwrap();
    let mut block_offsets = Vec::new();
    for chunk in data.chunks(opts.block_size) {
        block_offsets.push(out.len() as u64);
        let compressed = lzo.compress(chunk).unwrap();
        // lzop stores the raw bytes whenever compression does not shrink them.
        let stored = compressed.len() >= chunk.len();
        let payload: &[u8] = if stored { chunk } else { &compressed };

        out.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        if opts.output_checksum.is_declared() {
            let ck = checksum::compute(opts.output_checksum, chunk);
            out.extend_from_slice(&ck.to_be_bytes());
        }
        if opts.input_checksum.is_declared() && !stored {
            let ck = checksum::compute(opts.input_checksum, payload);
            out.extend_from_slice(&ck.to_be_bytes());
        }
        out.extend_from_slice(payload);
    }
    out.extend_from_slice(&0u32.to_be_bytes()); // end-of-stream marker

    Fixture {
        bytes: out,
        block_offsets,
        raw: data.to_vec(),
    }
}

/// Deterministic pseudo-random bytes (LCG), effectively incompressible.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Delimited text rows, the shape the downstream tokenizer expects.
pub fn text_rows(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 64);
    let mut row = 0u64;
    while out.len() < len {
        let line = format!("{row}\tregion-{}\t{}\n", row % 17, row * 31 % 1009);
        out.extend_from_slice(line.as_bytes());
        row += 1;
    }
    out.truncate(len);
    out
}
