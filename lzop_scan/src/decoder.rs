use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use lzop_core::checksum;
use lzop_core::{BlockFraming, FileHeader, LzopError, Result, MAX_BLOCK_SIZE};

use crate::buffer::BufferPool;
use crate::cursor::ByteCursor;
use crate::lzo::Lzo1x;
use crate::resync::{resync, Resync};
use crate::split::{plan_split, SplitPlan};

/// Knobs for one worker's decode of one range.
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    /// Verify declared block checksums. Hosts whose transport already
    /// checksums every read (HDFS does) can turn this off and skip the
    /// redundant pass over each block.
    pub verify_checksums: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Positioned at a block boundary, ready to read size/checksum fields.
    AwaitingFraming,
    /// Framing read, consuming and decompressing the payload.
    Decompressing,
    /// End marker reached, or the assigned range is done.
    Exhausted,
    /// Unrecoverable error; the range is dead.
    Failed,
}

/// One block's decompressed bytes, exclusively owned by the consumer.
#[derive(Debug)]
pub struct DecodedBlock {
    pub bytes: Vec<u8>,
    /// This block ends at or past the worker's assigned range end; it is the
    /// last one this worker owns.
    pub end_of_range: bool,
}

/// Steady-state block decode loop for one worker's `[start, end)` range.
///
/// [`BlockDecoder::open`] runs the split planner, positions the cursor on
/// the first owned block boundary, and then [`next_block`] walks framing →
/// validate → decompress until the end marker or the range end. A block
/// whose framing starts inside the range is decoded fully even when its
/// bytes run past `range.end`; the neighboring worker's planner picked the
/// *next* boundary, so nothing is read twice.
///
/// Corruption (bad sizes, checksum mismatch, decompressor failure) routes
/// through the resynchronizer when the file has an index; without one there
/// is no second decode path and the error is terminal for the range.
///
/// [`next_block`]: BlockDecoder::next_block
pub struct BlockDecoder<C: ByteCursor> {
    cursor: C,
    header: Arc<FileHeader>,
    /// `u64::MAX` for a non-splittable file: the single worker runs to EOF.
    range_end: u64,
    state: DecoderState,
    options: DecoderOptions,
    lzo: Lzo1x,
    pool: BufferPool,
    /// Compressed payload staging buffer, reused across blocks.
    scratch: Vec<u8>,
}

impl<C: ByteCursor> BlockDecoder<C> {
    /// Open a decoder for `range`, or `Ok(None)` when no block boundary in
    /// the range belongs to this worker.
    ///
    /// `cursor` must not have advanced past the range's first block.
    pub fn open(
        mut cursor: C,
        header: Arc<FileHeader>,
        range: Range<u64>,
        options: DecoderOptions,
    ) -> Result<Option<Self>> {
        let start = match plan_split(&header, &range) {
            SplitPlan::Empty => return Ok(None),
            SplitPlan::StartAt(offset) => offset,
        };
        if start < cursor.offset() {
            return Err(LzopError::Decode(format!(
                "cursor at {} already past first block at {start}",
                cursor.offset()
            )));
        }
        cursor.skip(start - cursor.offset())?;
        cursor.set_readahead_hint(MAX_BLOCK_SIZE as usize + BlockFraming::MAX_WIRE_SIZE);

        let range_end = if header.is_splittable() {
            range.end
        } else {
            u64::MAX
        };
        debug!(start, range_end, "opened block decoder");
        Ok(Some(Self {
            cursor,
            header,
            range_end,
            state: DecoderState::AwaitingFraming,
            options,
            lzo: Lzo1x::new()?,
            pool: BufferPool::new(),
            scratch: Vec::new(),
        }))
    }

    /// Absolute offset of the next byte the decoder will read.
    pub fn offset(&self) -> u64 {
        self.cursor.offset()
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == DecoderState::Exhausted
    }

    /// Decode the next block, or `Ok(None)` once the end marker is read or
    /// the assigned range is exhausted.
    pub fn next_block(&mut self) -> Result<Option<DecodedBlock>> {
        loop {
            match self.state {
                DecoderState::Exhausted => return Ok(None),
                DecoderState::Failed => {
                    return Err(LzopError::Decode(
                        "decoder already failed for this range".into(),
                    ))
                }
                DecoderState::AwaitingFraming | DecoderState::Decompressing => {}
            }
            // The block that begins at or past the range end belongs to the
            // next worker.
            if self.cursor.offset() >= self.range_end {
                self.state = DecoderState::Exhausted;
                return Ok(None);
            }

            let block_start = self.cursor.offset();
            match self.read_block() {
                Ok(None) => {
                    self.state = DecoderState::Exhausted;
                    return Ok(None);
                }
                Ok(Some(bytes)) => {
                    self.state = DecoderState::AwaitingFraming;
                    let end_of_range = self.cursor.offset() >= self.range_end;
                    return Ok(Some(DecodedBlock {
                        bytes,
                        end_of_range,
                    }));
                }
                Err(e) if e.is_recoverable() && self.header.is_splittable() => {
                    warn!(block_start, error = %e, "corrupt block, attempting resync");
                    match resync(&mut self.cursor, &self.header, block_start)? {
                        Resync::FoundAt(offset) => {
                            debug!(offset, "resynchronized, resuming decode");
                            self.state = DecoderState::AwaitingFraming;
                        }
                        Resync::NotFound => {
                            self.state = DecoderState::Failed;
                            return Err(LzopError::Decode(format!(
                                "unable to resynchronize after corruption at offset {block_start}: {e}"
                            )));
                        }
                    }
                }
                Err(e) => {
                    self.state = DecoderState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Read and validate one block at the cursor. `Ok(None)` is the end
    /// marker (or a clean EOF in place of one).
    fn read_block(&mut self) -> Result<Option<Vec<u8>>> {
        self.state = DecoderState::AwaitingFraming;
        let peeked = self.cursor.peek(BlockFraming::MAX_WIRE_SIZE)?;
        if peeked.is_empty() {
            // Truncated file without an end marker; nothing left to decode.
            return Ok(None);
        }
        let (framing, consumed) = match BlockFraming::parse(
            peeked,
            self.header.output_checksum_kind,
            self.header.input_checksum_kind,
        )? {
            None => {
                self.cursor.skip(4)?;
                return Ok(None);
            }
            Some(parsed) => parsed,
        };
        self.cursor.skip(consumed as u64)?;

        self.state = DecoderState::Decompressing;
        self.scratch.resize(framing.compressed_size as usize, 0);
        let mut payload = std::mem::take(&mut self.scratch);
        let result = self.decode_payload(&framing, &mut payload);
        self.scratch = payload;
        result.map(Some)
    }

    fn decode_payload(&mut self, framing: &BlockFraming, payload: &mut [u8]) -> Result<Vec<u8>> {
        self.cursor.read_exact(payload)?;

        // Compressed-side checksum guards the payload before it reaches the
        // decompressor.
        if self.options.verify_checksums {
            if let Some(expected) = framing.input_checksum {
                checksum::verify(
                    self.header.input_checksum_kind,
                    "compressed block",
                    expected,
                    payload,
                )?;
            }
        }

        let bytes = if framing.is_stored() {
            // Stored block: copy through, no decompressor call.
            let mut out = self.pool.acquire(payload.len());
            out.extend_from_slice(payload);
            out
        } else {
            self.lzo
                .decompress(payload, framing.uncompressed_size as usize)?
        };

        // Uncompressed-side checksum is checked before any byte is surfaced.
        if self.options.verify_checksums {
            if let Some(expected) = framing.output_checksum {
                checksum::verify(
                    self.header.output_checksum_kind,
                    "uncompressed block",
                    expected,
                    &bytes,
                )?;
            }
        }
        Ok(bytes)
    }

    /// Hand back a block whose row batches are finalized so its buffer can
    /// be reused.
    pub fn recycle(&mut self, block: DecodedBlock) {
        self.pool.release(block.bytes);
    }

    /// Release pooled resources and return the cursor to the caller.
    pub fn close(self) -> C {
        self.cursor
    }
}

// ── Byte-granular supply for the line tokenizer ────────────────────────────

/// Logical scan position: (absolute file offset, bytes still unconsumed of
/// the current decompressed block, end-of-range flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub file_offset: u64,
    pub bytes_remaining: usize,
    pub end_of_range: bool,
}

/// Pull-based adapter over [`BlockDecoder`] that hands out decompressed
/// bytes in caller-sized slices, the shape a downstream line/field
/// tokenizer consumes. Blocks are recycled into the decoder's pool as soon
/// as they are fully consumed.
pub struct ScanStream<C: ByteCursor> {
    decoder: BlockDecoder<C>,
    current: Option<DecodedBlock>,
    consumed: usize,
    done: bool,
}

impl<C: ByteCursor> ScanStream<C> {
    pub fn new(decoder: BlockDecoder<C>) -> Self {
        Self {
            decoder,
            current: None,
            consumed: 0,
            done: false,
        }
    }

    /// Up to `max` decompressed bytes; an empty slice signals end of range.
    pub fn fill(&mut self, max: usize) -> Result<&[u8]> {
        if self.needs_next_block() {
            if self.done {
                return Ok(&[]);
            }
            if let Some(block) = self.current.take() {
                self.decoder.recycle(block);
            }
            self.consumed = 0;
            match self.decoder.next_block()? {
                Some(block) => self.current = Some(block),
                None => {
                    self.done = true;
                    return Ok(&[]);
                }
            }
        }
        let len = self.current.as_ref().map_or(0, |b| b.bytes.len());
        let start = self.consumed;
        let end = (start + max).min(len);
        self.consumed = end;
        Ok(self
            .current
            .as_ref()
            .map_or(&[][..], |b| &b.bytes[start..end]))
    }

    fn needs_next_block(&self) -> bool {
        match &self.current {
            None => true,
            Some(block) => self.consumed >= block.bytes.len(),
        }
    }

    pub fn cursor(&self) -> ScanCursor {
        let (remaining, eor) = match &self.current {
            Some(block) => (block.bytes.len() - self.consumed, block.end_of_range),
            None => (0, self.done),
        };
        ScanCursor {
            file_offset: self.decoder.offset(),
            bytes_remaining: remaining,
            end_of_range: eor && remaining == 0,
        }
    }

    pub fn into_inner(self) -> BlockDecoder<C> {
        self.decoder
    }
}
