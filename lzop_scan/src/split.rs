use std::ops::Range;

use tracing::debug;

use lzop_core::FileHeader;

/// Where a worker assigned a byte range should begin decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPlan {
    /// Begin at this absolute offset, which is a block start.
    StartAt(u64),
    /// No block in this range belongs to this worker.
    Empty,
}

/// Pick the block boundary a worker's assigned `[start, end)` range maps to.
///
/// With an index the answer is exact: binary-search for the first block
/// offset at or after `range.start` and check it lands before `range.end`.
/// No file bytes are read.
///
/// Without an index the file has exactly one decode path, so exactly one
/// worker — the one whose range contains the end of the header, i.e. the
/// first block — decodes the whole remainder of the file; every other
/// worker has no data. Byte-scanning is never used to place a split.
pub fn plan_split(header: &FileHeader, range: &Range<u64>) -> SplitPlan {
    let plan = if header.is_splittable() {
        let idx = header
            .block_offsets
            .partition_point(|&offset| offset < range.start);
        match header.block_offsets.get(idx) {
            Some(&offset) if offset < range.end => SplitPlan::StartAt(offset),
            _ => SplitPlan::Empty,
        }
    } else if range.start <= header.header_len && header.header_len < range.end {
        SplitPlan::StartAt(header.header_len)
    } else {
        SplitPlan::Empty
    };
    debug!(
        start = range.start,
        end = range.end,
        splittable = header.is_splittable(),
        ?plan,
        "planned split"
    );
    plan
}
