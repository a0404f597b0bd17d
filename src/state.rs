//! Connection finite-state machine (FSM) types.
//!
//! None of these states is stored.  Each is *derived* from the counters the
//! [`Sender`] and [`Receiver`] already keep, so the summary can never drift
//! out of step with the machinery it describes.
//!
//! ```text
//!  sender:    CLOSED ──SYN──▶ SYN_SENT ──ack──▶ SYN_ACKED ──FIN──▶ FIN_SENT ──ack──▶ FIN_ACKED
//!  receiver:  LISTEN ──SYN──▶ SYN_RECEIVED ──FIN (all bytes in)──▶ FIN_RECEIVED
//! ```
//!
//! The pair, together with the connection's `active` and `linger` flags,
//! maps onto the familiar RFC 793 names (see [`ConnectionState::derive`]).

use std::fmt;

use crate::reassembler::Reassembler;
use crate::receiver::Receiver;
use crate::sender::Sender;

/// Progress of the outbound direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Nothing sent yet, not even a SYN.
    Closed,
    /// SYN sent and not yet acknowledged.
    SynSent,
    /// SYN acknowledged; local FIN not yet sent.
    SynAcked,
    /// FIN sent and not yet acknowledged.
    FinSent,
    /// FIN sent and acknowledged.
    FinAcked,
    /// The outbound stream has errored.
    Error,
}

impl SenderState {
    pub fn of(sender: &Sender) -> Self {
        let stream = sender.stream_in();
        let next = sender.next_seqno_absolute();
        let in_flight = sender.bytes_in_flight();

        if stream.is_error() {
            Self::Error
        } else if next == 0 {
            Self::Closed
        } else if next == in_flight {
            Self::SynSent
        } else if !stream.is_eof() || next < stream.bytes_written() + 2 {
            Self::SynAcked
        } else if in_flight > 0 {
            Self::FinSent
        } else {
            Self::FinAcked
        }
    }
}

/// Progress of the inbound direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the peer's SYN.
    Listen,
    /// Peer's SYN seen; its FIN not yet fully accounted for.
    SynReceived,
    /// Every byte up to and including the peer's FIN has arrived.
    FinReceived,
    /// The inbound stream has errored.
    Error,
}

impl ReceiverState {
    pub fn of<R: Reassembler>(receiver: &Receiver<R>) -> Self {
        if receiver.stream_out().is_error() {
            Self::Error
        } else if receiver.ackno().is_none() {
            Self::Listen
        } else if receiver.stream_out().input_ended() {
            Self::FinReceived
        } else {
            Self::SynReceived
        }
    }
}

/// All named states of the connection FSM.
///
/// ```text
///  active open:   LISTEN ─▶ SYN_SENT ─▶ ESTABLISHED
///  passive open:  LISTEN ─▶ SYN_RECEIVED ─▶ ESTABLISHED
///
///  active close:  ESTABLISHED ─▶ FIN_WAIT_1 ─▶ FIN_WAIT_2 ─▶ TIME_WAIT ─▶ CLOSED
///                                    └──▶ CLOSING ─────────────┘
///  passive close: ESTABLISHED ─▶ CLOSE_WAIT ─▶ LAST_ACK ─▶ CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for a SYN; nothing sent.
    Listen,
    /// SYN sent; peer's SYN not yet seen.
    SynSent,
    /// Peer's SYN seen; our SYN not yet acknowledged.
    SynReceived,
    /// Both SYNs acknowledged; data transfer in progress.
    Established,
    /// Peer closed; local side still sending.
    CloseWait,
    /// Peer closed, local FIN sent and awaiting ACK.
    LastAck,
    /// Local FIN sent; peer still sending.
    FinWait1,
    /// Local FIN acknowledged; peer still sending.
    FinWait2,
    /// Both FINs sent, ours not yet acknowledged.
    Closing,
    /// Both directions finished; lingering to re-ACK a retransmitted FIN.
    TimeWait,
    /// Cleanly finished.
    Closed,
    /// Aborted by RST or by the retransmission limit.
    Reset,
    /// A combination with no RFC 793 name.
    Transitional {
        sender: SenderState,
        receiver: ReceiverState,
    },
}

impl ConnectionState {
    /// Name the state implied by the two halves and the connection flags.
    pub fn derive(sender: SenderState, receiver: ReceiverState, active: bool, linger: bool) -> Self {
        use ReceiverState as R;
        use SenderState as S;

        match (sender, receiver) {
            (S::Error, _) | (_, R::Error) => Self::Reset,
            (S::Closed, R::Listen) => Self::Listen,
            (S::SynSent, R::Listen) => Self::SynSent,
            (S::SynSent, R::SynReceived) => Self::SynReceived,
            (S::SynAcked, R::SynReceived) => Self::Established,
            (S::SynAcked, R::FinReceived) if !linger => Self::CloseWait,
            (S::FinSent, R::FinReceived) if !linger => Self::LastAck,
            (S::FinSent, R::SynReceived) => Self::FinWait1,
            (S::FinAcked, R::SynReceived) => Self::FinWait2,
            (S::FinSent, R::FinReceived) => Self::Closing,
            (S::FinAcked, R::FinReceived) if active || linger => Self::TimeWait,
            (S::FinAcked, R::FinReceived) => Self::Closed,
            (sender, receiver) => Self::Transitional { sender, receiver },
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Listen
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transitional { sender, receiver } => write!(f, "{sender:?}/{receiver:?}"),
            other => write!(f, "{other:?}"),
        }
    }
}
