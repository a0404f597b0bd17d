//! Wire format for carrying [`Segment`]s inside datagrams.
//!
//! The reliability engine itself works on structured segments; this module
//! exists for transports that need bytes, such as [`crate::socket`].
//!
//! # Layout
//!
//! A fixed 15-byte header precedes the payload; integers are big-endian.
//!
//! ```text
//!  offset  size  field
//!  ──────  ────  ─────────────────────────────
//!     0     4    seqno
//!     4     4    ackno
//!     8     1    flags (SYN | ACK | FIN | RST)
//!     9     2    window
//!    11     2    payload length
//!    13     2    checksum over header + payload
//!    15     n    payload
//! ```

use thiserror::Error;

use crate::segment::{Header, Segment};
use crate::wrapping::Wrap32;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 15;

const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_FLAGS: usize = 8;
const OFF_WINDOW: usize = 9;
const OFF_PAYLOAD_LEN: usize = 11;
const OFF_CHECKSUM: usize = 13;

/// Errors that can arise when converting between segments and bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    #[error("payload_len field says {declared} but {actual} bytes follow the header")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("checksum verification failed")]
    ChecksumFailed,
    #[error("payload of {0} bytes does not fit the 16-bit length field")]
    PayloadTooLarge(usize),
}

/// Serialise `seg` into a newly allocated datagram.
pub fn encode(seg: &Segment) -> Result<Vec<u8>, WireError> {
    let payload_len =
        u16::try_from(seg.payload.len()).map_err(|_| WireError::PayloadTooLarge(seg.payload.len()))?;
    let mut buf = vec![0u8; HEADER_LEN + seg.payload.len()];

    buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&seg.header.seqno.raw().to_be_bytes());
    buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&seg.header.ackno.raw().to_be_bytes());
    buf[OFF_FLAGS] = seg.header.flags;
    buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&seg.header.window.to_be_bytes());
    buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2].copy_from_slice(&payload_len.to_be_bytes());
    buf[HEADER_LEN..].copy_from_slice(&seg.payload);

    let csum = internet_checksum(&buf);
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());
    Ok(buf)
}

/// Parse a datagram back into a [`Segment`].
pub fn decode(buf: &[u8]) -> Result<Segment, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::BufferTooShort(buf.len()));
    }

    let declared = usize::from(read_u16(buf, OFF_PAYLOAD_LEN));
    let actual = buf.len() - HEADER_LEN;
    if declared != actual {
        return Err(WireError::LengthMismatch { declared, actual });
    }

    let stored = read_u16(buf, OFF_CHECKSUM);
    let mut scratch = buf.to_vec();
    scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].fill(0);
    if internet_checksum(&scratch) != stored {
        return Err(WireError::ChecksumFailed);
    }

    Ok(Segment {
        header: Header {
            seqno: Wrap32::new(read_u32(buf, OFF_SEQ)),
            ackno: Wrap32::new(read_u32(buf, OFF_ACK)),
            flags: buf[OFF_FLAGS],
            window: read_u16(buf, OFF_WINDOW),
        },
        payload: buf[HEADER_LEN..].to_vec(),
    })
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// The caller must zero any checksum field within `data` first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match *pair {
            [hi, lo] => u32::from(u16::from_be_bytes([hi, lo])),
            [hi] => u32::from(hi) << 8,
            _ => 0,
        })
        .fold(0u32, u32::wrapping_add);

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::flags;

    fn make_segment(seq: u32, ack: u32, flag_bits: u8, window: u16, payload: &[u8]) -> Segment {
        Segment {
            header: Header {
                seqno: Wrap32::new(seq),
                ackno: Wrap32::new(ack),
                flags: flag_bits,
                window,
            },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn decode_restores_every_field() {
        let seg = make_segment(42, 7, flags::SYN | flags::ACK, 4096, b"hello");
        assert_eq!(decode(&encode(&seg).unwrap()).unwrap(), seg);
    }

    #[test]
    fn header_fields_land_at_fixed_offsets() {
        let bytes = encode(&make_segment(0xa1b2_c3d4, 0x1122_3344, flags::FIN, 0xbeef, b"")).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(bytes[..4], [0xa1, 0xb2, 0xc3, 0xd4]);
        assert_eq!(bytes[4..8], [0x11, 0x22, 0x33, 0x44]);
        assert_eq!(bytes[OFF_FLAGS], flags::FIN);
        assert_eq!(bytes[OFF_WINDOW..OFF_WINDOW + 2], [0xbe, 0xef]);
        assert_eq!(bytes[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2], [0, 0]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert_eq!(decode(&[]), Err(WireError::BufferTooShort(0)));
        assert_eq!(
            decode(&[0u8; HEADER_LEN - 1]),
            Err(WireError::BufferTooShort(HEADER_LEN - 1))
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut bytes = encode(&make_segment(0, 0, 0, 0, b"data")).unwrap();
        bytes.pop();
        assert_eq!(
            decode(&bytes),
            Err(WireError::LengthMismatch { declared: 4, actual: 3 })
        );
    }

    #[test]
    fn corrupt_byte_fails_checksum() {
        let mut bytes = encode(&make_segment(99, 0, flags::SYN, 1024, b"odd")).unwrap();
        bytes[HEADER_LEN] ^= 0x40;
        assert_eq!(decode(&bytes), Err(WireError::ChecksumFailed));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let seg = make_segment(0, 0, 0, 0, &vec![0u8; usize::from(u16::MAX) + 1]);
        assert_eq!(encode(&seg), Err(WireError::PayloadTooLarge(65_536)));
    }
}
