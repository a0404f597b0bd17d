//! Per-connection lifecycle manager.
//!
//! A [`Connection`] owns the complete state for one endpoint of a TCP
//! connection.  Its responsibilities are:
//! - Driving the finite-state machine (see [`crate::state`]).
//! - Coordinating [`crate::sender`] and [`crate::receiver`].
//! - Stamping every outbound segment with the receiver's ACK and window.
//! - Aborting on RST or after too many consecutive retransmissions.
//! - Lingering after an active close so a retransmitted FIN is re-ACKed.
//!
//! Nothing here blocks or spawns.  Time moves only through [`Connection::tick`],
//! segments arrive only through [`Connection::segment_received`], and
//! segments leave through the [`Outbound`] queue handed out at construction.
//! The queue outlives the connection so the parting RST of an unclean drop
//! still reaches whoever is draining it.

use rand::RngCore;
use tokio::sync::mpsc;

use crate::byte_stream::ByteStream;
use crate::config::{TcpConfig, LINGER_RTO_MULTIPLE};
use crate::reassembler::{Reassembler, StreamReassembler};
use crate::receiver::Receiver;
use crate::segment::{flags, Segment};
use crate::sender::Sender;
use crate::state::{ConnectionState, ReceiverState, SenderState};
use crate::wrapping::Wrap32;

/// FIFO of segments ready for the transport, in emission order.
pub type Outbound = mpsc::UnboundedReceiver<Segment>;

/// One endpoint of a TCP connection.
#[derive(Debug)]
pub struct Connection<R: Reassembler = StreamReassembler> {
    config: TcpConfig,
    sender: Sender,
    receiver: Receiver<R>,
    outbound: mpsc::UnboundedSender<Segment>,

    time_since_last_segment_received: u64,
    active: bool,
    /// Keep running after both streams finish, in case the peer's FIN is
    /// retransmitted.  Cleared when the peer closed first.
    linger_after_streams_finish: bool,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Connection<StreamReassembler> {
    /// Create a connection and the queue its segments leave through.
    ///
    /// The ISN is `config.fixed_isn` if set, otherwise drawn from `rng`.
    pub fn new<G: RngCore + ?Sized>(config: TcpConfig, rng: &mut G) -> (Self, Outbound) {
        let isn = config
            .fixed_isn
            .unwrap_or_else(|| Wrap32::new(rng.next_u32()));
        let reassembler = StreamReassembler::new(config.recv_capacity);
        Self::with_reassembler(config, isn, reassembler)
    }
}

impl<R: Reassembler> Connection<R> {
    /// Create a connection around a caller-supplied reassembler.
    pub fn with_reassembler(config: TcpConfig, isn: Wrap32, reassembler: R) -> (Self, Outbound) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            sender: Sender::new(config.send_capacity, config.rt_timeout, isn),
            receiver: Receiver::with_reassembler(reassembler, config.recv_capacity),
            outbound: tx,
            config,
            time_since_last_segment_received: 0,
            active: true,
            linger_after_streams_finish: true,
        };
        (conn, rx)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Initiate an active open by sending SYN.
    pub fn connect(&mut self) {
        self.sender.fill_window();
        self.active = true;
        self.flush();
    }

    /// Process one inbound segment.
    pub fn segment_received(&mut self, seg: Segment) {
        if !self.active() {
            log::trace!("[conn] inactive; dropping seq={}", seg.header.seqno);
            return;
        }
        self.time_since_last_segment_received = 0;

        if seg.header.rst() {
            log::debug!("[conn] ← RST seq={}; aborting", seg.header.seqno);
            self.abort(false);
            return;
        }

        self.receiver.segment_received(&seg);
        if ReceiverState::of(&self.receiver) == ReceiverState::Listen {
            log::trace!("[conn] no SYN yet; ignoring seq={}", seg.header.seqno);
            return;
        }

        if seg.header.ack() && self.sender.next_seqno_absolute() > 0 {
            self.sender.ack_received(seg.header.ackno, seg.header.window);
        }

        let sender_state = SenderState::of(&self.sender);
        let receiver_state = ReceiverState::of(&self.receiver);

        if sender_state == SenderState::Closed && receiver_state == ReceiverState::SynReceived {
            log::debug!("[conn] passive open from SYN seq={}", seg.header.seqno);
            self.connect();
            return;
        }

        // Peer closed first: nobody will need our ACK of its FIN re-sent.
        if sender_state == SenderState::SynAcked && receiver_state == ReceiverState::FinReceived {
            self.linger_after_streams_finish = false;
        }

        if seg.length_in_sequence_space() > 0 && !self.sender.has_pending_segments() {
            self.sender.send_empty_segment();
        }
        self.flush();

        if sender_state == SenderState::FinAcked
            && receiver_state == ReceiverState::FinReceived
            && !self.linger_after_streams_finish
        {
            log::debug!("[conn] both streams finished; closed");
            self.active = false;
        }
    }

    /// Queue application bytes for sending.  Returns how many were accepted.
    ///
    /// Before [`connect`](Self::connect) or a passive open the bytes are only
    /// buffered; writing does not open the connection.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let accepted = self.sender.stream_in_mut().write(data);
        self.push_outbound();
        accepted
    }

    /// Signal that the application has nothing more to send.
    pub fn end_input_stream(&mut self) {
        self.sender.stream_in_mut().end_input();
        self.push_outbound();
    }

    /// Take up to `len` bytes the peer has delivered in order.
    pub fn read(&mut self, len: usize) -> Vec<u8> {
        self.receiver.stream_out_mut().read(len)
    }

    /// Report `ms_since_last_tick` milliseconds of elapsed time.
    pub fn tick(&mut self, ms_since_last_tick: u64) {
        if !self.active() {
            return;
        }

        self.sender.tick(ms_since_last_tick);
        if self.sender.consecutive_retransmissions() > self.config.max_retx_attempts {
            log::warn!(
                "[conn] {} consecutive retransmissions; resetting",
                self.sender.consecutive_retransmissions()
            );
            self.abort(true);
            return;
        }
        self.flush();

        self.time_since_last_segment_received += ms_since_last_tick;
        if self.linger_after_streams_finish
            && SenderState::of(&self.sender) == SenderState::FinAcked
            && ReceiverState::of(&self.receiver) == ReceiverState::FinReceived
            && self.time_since_last_segment_received >= LINGER_RTO_MULTIPLE * self.config.rt_timeout
        {
            log::debug!("[conn] linger expired; closed");
            self.active = false;
            self.linger_after_streams_finish = false;
        }
    }

    /// Abort the connection and tell the peer with a RST.
    ///
    /// Both streams are left errored.  Does nothing once the connection is
    /// no longer active.
    pub fn reset(&mut self) {
        if self.active() {
            log::warn!("[conn] reset in state {}; sending RST", self.state());
            self.abort(true);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `true` while the connection is live or lingering after close.
    pub fn active(&self) -> bool {
        self.active || self.linger_after_streams_finish
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::derive(
            SenderState::of(&self.sender),
            ReceiverState::of(&self.receiver),
            self.active,
            self.linger_after_streams_finish,
        )
    }

    pub fn remaining_outbound_capacity(&self) -> usize {
        self.sender.stream_in().remaining_capacity()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.sender.bytes_in_flight()
    }

    pub fn unassembled_bytes(&self) -> usize {
        self.receiver.unassembled_bytes()
    }

    pub fn time_since_last_segment_received(&self) -> u64 {
        self.time_since_last_segment_received
    }

    /// Bytes received from the peer, in order.
    pub fn inbound_stream(&self) -> &ByteStream {
        self.receiver.stream_out()
    }

    /// Bytes written by the application and not yet sent.
    pub fn outbound_stream(&self) -> &ByteStream {
        self.sender.stream_in()
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Send whatever the window allows, once the handshake has been started.
    fn push_outbound(&mut self) {
        if !matches!(
            SenderState::of(&self.sender),
            SenderState::Closed | SenderState::Error
        ) {
            self.sender.fill_window();
        }
        self.flush();
    }

    /// Move the sender's segments to the outbound queue, stamping ACK/window.
    fn flush(&mut self) {
        while let Some(mut seg) = self.sender.pop_segment() {
            if let Some(ackno) = self.receiver.ackno() {
                seg.header.set(flags::ACK);
                seg.header.ackno = ackno;
                seg.header.window = u16::try_from(self.receiver.window_size()).unwrap_or(u16::MAX);
            }
            log::trace!(
                "[conn] → seq={} ack={} flags={:#06b} win={} len={}",
                seg.header.seqno,
                seg.header.ackno,
                seg.header.flags,
                seg.header.window,
                seg.payload.len()
            );
            if self.outbound.send(seg).is_err() {
                log::trace!("[conn] outbound queue closed; segment dropped");
            }
        }
    }

    /// Enter the terminal errored state, optionally telling the peer.
    fn abort(&mut self, send_rst: bool) {
        if send_rst {
            self.sender.clear_segments();
            self.sender.send_reset_segment();
            self.flush();
        }
        self.sender.stream_in_mut().set_error();
        self.receiver.stream_out_mut().set_error();
        self.linger_after_streams_finish = false;
        self.active = false;
    }
}

impl<R: Reassembler> Drop for Connection<R> {
    fn drop(&mut self) {
        self.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
