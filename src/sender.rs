//! Outbound half of a connection.
//!
//! [`Sender`] reads the application's outbound [`ByteStream`] and turns it
//! into segments that respect the peer's advertised window, keeps every
//! segment it sent until it is fully acknowledged, and re-sends the oldest
//! one when the retransmission timer fires.
//!
//! It does **not** touch any transport; emitted segments wait in an internal
//! FIFO that [`crate::connection::Connection`] drains with [`Sender::pop_segment`].
//!
//! # Sequence-number layout
//!
//! ```text
//!  oldest in-flight      next_seqno
//!        │                   │
//!  ──────┼───────────────────┼──────────────────▶ absolute seq space
//!        │ <── in flight ───▶│ <── sendable (window) ──▶
//! ```

use std::collections::{BTreeMap, VecDeque};

use crate::byte_stream::ByteStream;
use crate::config::MAX_PAYLOAD_SIZE;
use crate::segment::{flags, Segment};
use crate::timer::RetransmitTimer;
use crate::wrapping::Wrap32;

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Send-side state for one connection.
#[derive(Debug)]
pub struct Sender {
    isn: Wrap32,
    stream: ByteStream,

    /// Segments ready to leave, in emission order.
    segments_out: VecDeque<Segment>,

    /// Sent but not fully acknowledged, keyed by absolute start seqno.
    outstanding: BTreeMap<u64, Segment>,

    /// Absolute seqno of the next position to be assigned.
    next_seqno: u64,
    /// Sum of `length_in_sequence_space` over `outstanding`.
    bytes_in_flight: u64,

    timer: RetransmitTimer,
    consecutive_retransmissions: u32,

    /// Last window advertised by the peer.
    window_size: u16,

    syn_sent: bool,
    fin_sent: bool,
}

impl Sender {
    // -----------------------------------------------------------------------
    // Transmission
    // -----------------------------------------------------------------------

    /// Create a sender with an outbound stream of `capacity` bytes.
    ///
    /// `initial_rto` is in milliseconds.  The window is assumed to be one
    /// byte until the peer advertises otherwise, which is enough for the SYN.
    pub fn new(capacity: usize, initial_rto: u64, isn: Wrap32) -> Self {
        Self {
            isn,
            stream: ByteStream::new(capacity),
            segments_out: VecDeque::new(),
            outstanding: BTreeMap::new(),
            next_seqno: 0,
            bytes_in_flight: 0,
            timer: RetransmitTimer::new(initial_rto),
            consecutive_retransmissions: 0,
            window_size: 1,
            syn_sent: false,
            fin_sent: false,
        }
    }

    /// Emit as many segments as the peer's window allows.
    ///
    /// A zero window is treated as a window of one so that a probe keeps
    /// flowing and the peer eventually re-advertises.
    pub fn fill_window(&mut self) {
        let window = u64::from(self.window_size.max(1));

        while self.bytes_in_flight < window {
            let mut seg = Segment::default();
            if !self.syn_sent {
                seg.header.set(flags::SYN);
                self.syn_sent = true;
            }
            seg.header.seqno = self.next_seqno();

            let room = window - self.bytes_in_flight - u64::from(seg.header.syn());
            let payload_len = room.min(MAX_PAYLOAD_SIZE as u64) as usize;
            seg.payload = self.stream.read(payload_len);

            if !self.fin_sent
                && self.stream.is_eof()
                && self.bytes_in_flight + (seg.length_in_sequence_space() as u64) < window
            {
                seg.header.set(flags::FIN);
                self.fin_sent = true;
            }

            if seg.length_in_sequence_space() == 0 {
                break;
            }

            let is_fin = seg.header.fin();
            self.record_sent(seg);
            if is_fin {
                break;
            }
        }
    }

    /// Process the peer's acknowledgement number and window.
    ///
    /// Acknowledgements for data never sent are ignored outright.
    pub fn ack_received(&mut self, ackno: Wrap32, window_size: u16) {
        let abs_ackno = ackno.unwrap(self.isn, self.next_seqno);
        if abs_ackno > self.next_seqno {
            log::trace!(
                "[sender] ignoring ackno {ackno} (abs {abs_ackno}) beyond next seqno {}",
                self.next_seqno
            );
            return;
        }

        let mut newly_acked = 0usize;
        while let Some(entry) = self.outstanding.first_entry() {
            let end = *entry.key() + entry.get().length_in_sequence_space() as u64;
            if end > abs_ackno {
                break;
            }
            let seg = entry.remove();
            self.bytes_in_flight -= seg.length_in_sequence_space() as u64;
            newly_acked += 1;
        }

        if newly_acked > 0 {
            log::debug!(
                "[sender] ← ACK abs={abs_ackno} retired {newly_acked} seg; in_flight={}",
                self.bytes_in_flight
            );
            self.timer.reset_rto();
            self.consecutive_retransmissions = 0;
            if self.outstanding.is_empty() {
                self.timer.stop();
            } else {
                self.timer.restart();
            }
        }

        self.window_size = window_size;
        self.fill_window();
    }

    /// Advance the retransmission timer by `ms_since_last_tick` milliseconds.
    ///
    /// On expiry the oldest outstanding segment is queued again unchanged.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        if !self.timer.tick(ms_since_last_tick) {
            return;
        }
        let Some((&start, seg)) = self.outstanding.first_key_value() else {
            return;
        };
        self.segments_out.push_back(seg.clone());

        // A closed window means the peer is busy, not that the path is lossy.
        if self.window_size > 0 {
            self.consecutive_retransmissions += 1;
            self.timer.back_off();
        }
        self.timer.restart();
        log::debug!(
            "[sender] timeout; retransmit abs={start} (consecutive={}, rto={}ms)",
            self.consecutive_retransmissions,
            self.timer.current_rto()
        );
    }

    // -----------------------------------------------------------------------
    // Control segments and queue
    // -----------------------------------------------------------------------

    /// Queue a segment that occupies no sequence space, to carry an ACK.
    pub fn send_empty_segment(&mut self) {
        let mut seg = Segment::default();
        seg.header.seqno = self.next_seqno();
        self.segments_out.push_back(seg);
    }

    /// Queue a RST at the current sequence number.  RSTs are never retransmitted.
    pub fn send_reset_segment(&mut self) {
        let mut seg = Segment::default();
        seg.header.seqno = self.next_seqno();
        seg.header.set(flags::RST);
        self.segments_out.push_back(seg);
    }

    /// Take the next segment ready for transmission.
    pub fn pop_segment(&mut self) -> Option<Segment> {
        self.segments_out.pop_front()
    }

    /// Drop everything waiting to leave.
    pub fn clear_segments(&mut self) {
        self.segments_out.clear();
    }

    pub fn has_pending_segments(&self) -> bool {
        !self.segments_out.is_empty()
    }

    /// Sequence positions sent but not yet acknowledged.
    pub fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    /// Retransmissions since the last newly acknowledged data.
    pub fn consecutive_retransmissions(&self) -> u32 {
        self.consecutive_retransmissions
    }

    pub fn next_seqno_absolute(&self) -> u64 {
        self.next_seqno
    }

    pub fn next_seqno(&self) -> Wrap32 {
        Wrap32::wrap(self.next_seqno, self.isn)
    }

    /// Current RTO in milliseconds.
    pub fn retransmission_timeout(&self) -> u64 {
        self.timer.current_rto()
    }

    pub fn stream_in(&self) -> &ByteStream {
        &self.stream
    }

    pub fn stream_in_mut(&mut self) -> &mut ByteStream {
        &mut self.stream
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn record_sent(&mut self, seg: Segment) {
        let len = seg.length_in_sequence_space() as u64;
        log::trace!(
            "[sender] → seq={} len={} flags={:#06b}",
            seg.header.seqno,
            len,
            seg.header.flags
        );
        self.segments_out.push_back(seg.clone());
        self.outstanding.insert(self.next_seqno, seg);
        self.next_seqno += len;
        self.bytes_in_flight += len;
        self.timer.start();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
