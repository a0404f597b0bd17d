//! Connection configuration and protocol constants.

use crate::wrapping::Wrap32;

/// Default capacity of each byte stream, in bytes.
pub const DEFAULT_CAPACITY: usize = 64_000;

/// Largest payload the sender places in a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// Default initial retransmission timeout, in milliseconds.
pub const TIMEOUT_DFLT: u64 = 1000;

/// Consecutive retransmissions tolerated before the connection is aborted.
pub const MAX_RETX_ATTEMPTS: u32 = 8;

/// How long a finished connection lingers, as a multiple of the initial RTO.
pub const LINGER_RTO_MULTIPLE: u64 = 10;

/// Parameters consumed when a [`crate::connection::Connection`] is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Capacity of the inbound stream; also bounds the advertised window.
    pub recv_capacity: usize,
    /// Capacity of the outbound stream.
    pub send_capacity: usize,
    /// Initial retransmission timeout in milliseconds.
    pub rt_timeout: u64,
    /// Abort once consecutive retransmissions exceed this.
    pub max_retx_attempts: u32,
    /// Use this ISN instead of drawing one from the RNG.
    pub fixed_isn: Option<Wrap32>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            recv_capacity: DEFAULT_CAPACITY,
            send_capacity: DEFAULT_CAPACITY,
            rt_timeout: TIMEOUT_DFLT,
            max_retx_attempts: MAX_RETX_ATTEMPTS,
            fixed_isn: None,
        }
    }
}
