//! Inbound half of a connection.
//!
//! The [`Receiver`] is responsible for everything that happens *after* a
//! segment arrives and *before* the application reads contiguous bytes:
//! - Learning the peer's ISN from its SYN.
//! - Translating each segment's 32-bit seqno into a 64-bit stream index.
//! - Handing payload and FIN to the [`Reassembler`].
//! - Computing the ACK number and advertised window for outbound segments.
//!
//! The [`Receiver`] does **not** send ACKs itself; it provides the values
//! that [`crate::connection::Connection`] stamps onto outbound segments.

use crate::byte_stream::ByteStream;
use crate::reassembler::{Reassembler, StreamReassembler};
use crate::segment::Segment;
use crate::wrapping::Wrap32;

/// Receive-side state for one connection.
#[derive(Debug)]
pub struct Receiver<R = StreamReassembler> {
    reassembler: R,
    capacity: usize,
    /// Peer's ISN; `None` until its SYN arrives.
    isn: Option<Wrap32>,
}

impl Receiver<StreamReassembler> {
    /// Create a receiver whose inbound stream buffers `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self::with_reassembler(StreamReassembler::new(capacity), capacity)
    }
}

impl<R: Reassembler> Receiver<R> {
    /// Create a receiver around an existing reassembler.
    ///
    /// `capacity` must match the capacity of the reassembler's output stream.
    pub fn with_reassembler(reassembler: R, capacity: usize) -> Self {
        Self {
            reassembler,
            capacity,
            isn: None,
        }
    }

    /// Process one inbound segment.
    ///
    /// Everything before the peer's SYN is ignored.
    pub fn segment_received(&mut self, seg: &Segment) {
        let syn = seg.header.syn();
        let isn = match self.isn {
            Some(isn) => isn,
            None if syn => {
                log::debug!("[receiver] ← SYN isn={}", seg.header.seqno);
                self.isn = Some(seg.header.seqno);
                seg.header.seqno
            }
            None => return,
        };

        let checkpoint = self.reassembler.stream_out().bytes_written() + 1;
        let abs_seqno = seg.header.seqno.unwrap(isn, checkpoint);

        // The SYN occupies absolute 0 but no stream index.
        let Some(index) = (abs_seqno + u64::from(syn)).checked_sub(1) else {
            log::trace!("[receiver] dropping non-SYN segment at the SYN position");
            return;
        };

        self.reassembler
            .push_substring(&seg.payload, index, seg.header.fin());
    }

    /// The next sequence number expected from the peer, once synchronised.
    pub fn ackno(&self) -> Option<Wrap32> {
        let isn = self.isn?;
        let stream = self.reassembler.stream_out();
        let abs_ackno = 1 + stream.bytes_written() + u64::from(stream.input_ended());
        Some(Wrap32::wrap(abs_ackno, isn))
    }

    /// Room left in the inbound stream for new data.
    pub fn window_size(&self) -> usize {
        self.capacity
            .saturating_sub(self.reassembler.stream_out().buffer_size())
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.reassembler.unassembled_bytes()
    }

    pub fn stream_out(&self) -> &ByteStream {
        self.reassembler.stream_out()
    }

    pub fn stream_out_mut(&mut self) -> &mut ByteStream {
        self.reassembler.stream_out_mut()
    }
}
