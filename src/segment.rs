//! Structured segment records exchanged between endpoints.
//!
//! A [`Segment`] is the unit the reliability engine consumes and produces.
//! It is already parsed: the engine never sees raw bytes.  Serialising a
//! segment for an actual datagram transport lives in [`crate::wire`].
//!
//! Every segment occupies some number of positions in sequence space: one per
//! payload byte, plus one for SYN and one for FIN.  ACK and RST consume
//! nothing.

use crate::wrapping::Wrap32;

/// Bit-flag constants for the `flags` header field.
pub mod flags {
    /// Synchronise sequence numbers (handshake initiation).
    pub const SYN: u8 = 0b0000_0001;
    /// Acknowledgement field is valid.
    pub const ACK: u8 = 0b0000_0010;
    /// No more data from the sender.
    pub const FIN: u8 = 0b0000_0100;
    /// Reset the connection.
    pub const RST: u8 = 0b0000_1000;
}

/// Segment header.  Fields not listed here are implicitly zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Sequence number of the first position this segment occupies.
    pub seqno: Wrap32,
    /// Next sequence number expected from the peer (valid when ACK is set).
    pub ackno: Wrap32,
    /// Bitmask of [`flags`] constants.
    pub flags: u8,
    /// Advertised receive window in bytes.
    pub window: u16,
}

impl Header {
    /// Set `flag` (one of the [`flags`] constants).
    pub fn set(&mut self, flag: u8) {
        self.flags |= flag;
    }

    pub fn has(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn syn(&self) -> bool {
        self.has(flags::SYN)
    }

    pub fn ack(&self) -> bool {
        self.has(flags::ACK)
    }

    pub fn fin(&self) -> bool {
        self.has(flags::FIN)
    }

    pub fn rst(&self) -> bool {
        self.has(flags::RST)
    }
}

/// A complete segment: header + payload bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Number of sequence numbers this segment consumes.
    pub fn length_in_sequence_space(&self) -> usize {
        self.payload.len() + usize::from(self.header.syn()) + usize::from(self.header.fin())
    }
}
