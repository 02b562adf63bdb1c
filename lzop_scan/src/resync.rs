use tracing::warn;

use lzop_core::checksum;
use lzop_core::{BlockFraming, FileHeader, Result};

use crate::cursor::ByteCursor;

/// How many byte positions the heuristic scan will try before declaring the
/// range unrecoverable. Two maximal blocks is enough to cross any single
/// corrupted block plus its framing; the format has no resync marker, so
/// this is a tunable bound, not a guarantee.
pub const RESYNC_WINDOW: usize = 2 * lzop_core::MAX_BLOCK_SIZE as usize;

/// Outcome of a resynchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// The cursor now sits at a block boundary at this absolute offset.
    FoundAt(u64),
    /// No plausible boundary within the window; the range is lost.
    NotFound,
}

/// Locate the next block boundary after corruption at `failed_block_start`.
///
/// When the index lists a block past the failure, skip straight to it —
/// exact and zero bytes scanned, with only the corrupted block lost. When
/// the failure is beyond the last indexed offset (or the caller has no
/// usable index entry ahead), fall back to a bounded byte-by-byte scan for
/// bytes that look like legal framing, confirmed against a declared
/// checksum where possible.
///
/// Callers only invoke this for splittable files; a non-indexed file has
/// exactly one decode path and corruption there is terminal.
pub fn resync<C: ByteCursor>(
    cursor: &mut C,
    header: &FileHeader,
    failed_block_start: u64,
) -> Result<Resync> {
    // First index entry strictly past the failed block that the forward-only
    // cursor can still reach.
    let min_target = (failed_block_start + 1).max(cursor.offset());
    let idx = header
        .block_offsets
        .partition_point(|&offset| offset < min_target);
    if let Some(&target) = header.block_offsets.get(idx) {
        warn!(
            failed_block_start,
            target, "resynchronizing via index, skipping corrupted block"
        );
        cursor.skip(target - cursor.offset())?;
        return Ok(Resync::FoundAt(target));
    }

    warn!(
        failed_block_start,
        from = cursor.offset(),
        window = RESYNC_WINDOW,
        "no index entry past failure, scanning for plausible framing"
    );
    byte_scan(cursor, header)
}

/// Scan forward one byte at a time looking for a position whose bytes parse
/// as in-bounds block framing. With a compressed-side checksum declared the
/// candidate payload is actually verified, which makes false positives
/// vanishingly rare; without one, size plausibility is all the format
/// offers.
fn byte_scan<C: ByteCursor>(cursor: &mut C, header: &FileHeader) -> Result<Resync> {
    let mut scanned = 0usize;
    while scanned <= RESYNC_WINDOW {
        let peeked = cursor.peek(BlockFraming::MAX_WIRE_SIZE)?;
        let available = peeked.len();
        if available < 4 {
            return Ok(Resync::NotFound);
        }
        match BlockFraming::parse(
            peeked,
            header.output_checksum_kind,
            header.input_checksum_kind,
        ) {
            // A bare end marker is only credible as the last 4 bytes of the
            // file; a zero word mid-stream is just corrupt data.
            Ok(None) if available == 4 => {
                return Ok(Resync::FoundAt(cursor.offset()));
            }
            Ok(Some((framing, consumed))) => {
                if candidate_verifies(cursor, header, &framing, consumed)? {
                    return Ok(Resync::FoundAt(cursor.offset()));
                }
            }
            Ok(None) | Err(_) => {}
        }
        cursor.skip(1)?;
        scanned += 1;
    }
    Ok(Resync::NotFound)
}

/// Confirm a size-plausible candidate by checksumming the bytes that would
/// be its payload, when the header declares a checksum we can test against.
fn candidate_verifies<C: ByteCursor>(
    cursor: &mut C,
    header: &FileHeader,
    framing: &BlockFraming,
    consumed: usize,
) -> Result<bool> {
    let (expected, kind) = if let Some(expected) = framing.input_checksum {
        (expected, header.input_checksum_kind)
    } else if let Some(expected) = framing.output_checksum {
        if !framing.is_stored() {
            // The uncompressed-side checksum can't be tested without
            // decompressing; take the size fields at their word.
            return Ok(true);
        }
        (expected, header.output_checksum_kind)
    } else {
        return Ok(true);
    };

    let want = consumed + framing.compressed_size as usize;
    let peeked = cursor.peek(want)?;
    if peeked.len() < want {
        return Ok(false);
    }
    Ok(checksum::compute(kind, &peeked[consumed..want]) == expected)
}
