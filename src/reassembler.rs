//! Out-of-order reassembly in front of the inbound [`ByteStream`].
//!
//! The [`Receiver`](crate::receiver::Receiver) hands every payload to a
//! [`Reassembler`] together with its absolute stream index.  The reassembler
//! is responsible for buffering data that arrives ahead of a gap and for
//! making only contiguous bytes visible in the stream it owns.
//!
//! [`StreamReassembler`] is the implementation used by default.  Pending
//! chunks live in a `BTreeMap` keyed by stream index and are merged as they
//! overlap, so the map never holds two chunks covering the same byte.
//!
//! ```text
//!  bytes_read      bytes_written                    bytes_read + capacity
//!      │  buffered      │   unassembled (gaps ok)          │
//!  ────┼────────────────┼──────────────────────────────────┼────▶ stream index
//!      │ <── stream ──▶ │ <──── acceptable window ────────▶│ discarded
//! ```

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};

use crate::byte_stream::ByteStream;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The seam between the receiver and whatever reorders its input.
pub trait Reassembler {
    /// Offer `data` starting at absolute stream `index`.  `eof` marks the
    /// last byte of `data` as the last byte of the stream.
    fn push_substring(&mut self, data: &[u8], index: u64, eof: bool);

    /// The stream contiguous bytes are written to.
    fn stream_out(&self) -> &ByteStream;

    fn stream_out_mut(&mut self) -> &mut ByteStream;

    /// Bytes held back because a gap precedes them.
    fn unassembled_bytes(&self) -> usize;
}

// ---------------------------------------------------------------------------
// StreamReassembler
// ---------------------------------------------------------------------------

/// Buffers out-of-order substrings and writes the contiguous prefix.
#[derive(Debug)]
pub struct StreamReassembler {
    output: ByteStream,
    capacity: usize,
    /// Non-overlapping, non-adjacent chunks beyond `output.bytes_written()`.
    pending: BTreeMap<u64, Vec<u8>>,
    /// Stream index one past the final byte, once known.  The first claim
    /// wins.
    eof_index: Option<u64>,
}

impl StreamReassembler {
    /// Create a reassembler whose output stream holds `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            output: ByteStream::new(capacity),
            capacity,
            pending: BTreeMap::new(),
            eof_index: None,
        }
    }

    /// Insert `bytes` at `start`, coalescing with every chunk it touches.
    fn insert(&mut self, mut start: u64, mut bytes: Vec<u8>) {
        if let Some((&prev_start, prev)) = self.pending.range(..=start).next_back() {
            let prev_end = prev_start + prev.len() as u64;
            if prev_end >= start {
                if prev_end >= start + bytes.len() as u64 {
                    return;
                }
                let skip = (prev_end - start) as usize;
                let mut merged = self.pending.remove(&prev_start).unwrap_or_default();
                merged.extend_from_slice(&bytes[skip..]);
                start = prev_start;
                bytes = merged;
            }
        }

        let end = start + bytes.len() as u64;
        let followers: Vec<u64> = self
            .pending
            .range((Excluded(start), Included(end)))
            .map(|(&s, _)| s)
            .collect();
        for next_start in followers {
            let Some(next) = self.pending.remove(&next_start) else {
                continue;
            };
            let cur_end = start + bytes.len() as u64;
            let next_end = next_start + next.len() as u64;
            if next_end > cur_end {
                bytes.extend_from_slice(&next[(cur_end - next_start) as usize..]);
            }
        }

        self.pending.insert(start, bytes);
    }

    /// Move the chunk at the write frontier (if any) into the output stream.
    fn flush_contiguous(&mut self) {
        let frontier = self.output.bytes_written();
        if let Some(chunk) = self.pending.remove(&frontier) {
            let written = self.output.write(&chunk);
            if written < chunk.len() {
                self.pending.insert(frontier + written as u64, chunk[written..].to_vec());
            }
        }
        if self.eof_index == Some(self.output.bytes_written()) {
            self.output.end_input();
        }
    }
}

impl Reassembler for StreamReassembler {
    fn push_substring(&mut self, data: &[u8], index: u64, eof: bool) {
        let first_unassembled = self.output.bytes_written();
        let first_unacceptable = self.output.bytes_read() + self.capacity as u64;
        let data_end = index + data.len() as u64;

        if eof && data_end <= first_unacceptable {
            match self.eof_index {
                None => self.eof_index = Some(data_end),
                Some(known) if known != data_end => {
                    log::debug!("[reassembler] end of stream already at {known}; ignoring {data_end}");
                }
                Some(_) => {}
            }
        }

        let start = index.max(first_unassembled);
        let end = data_end.min(first_unacceptable);
        if start < end {
            let slice = &data[(start - index) as usize..(end - index) as usize];
            self.insert(start, slice.to_vec());
        } else if !data.is_empty() {
            log::trace!(
                "[reassembler] dropping [{index}, {data_end}) outside [{first_unassembled}, {first_unacceptable})"
            );
        }

        self.flush_contiguous();
    }

    fn stream_out(&self) -> &ByteStream {
        &self.output
    }

    fn stream_out_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }

    fn unassembled_bytes(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
