//! Segment-oriented UDP transport.
//!
//! [`Socket`] wraps `tokio::net::UdpSocket` so that callers exchange
//! [`Segment`]s instead of raw bytes.  All protocol logic lives elsewhere;
//! this module owns only datagram I/O and the [`crate::wire`] conversion.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::segment::Segment;
use crate::wire::{self, WireError};

/// Largest datagram we are prepared to receive.
const MAX_DATAGRAM: usize = 65_535;

/// Failures while sending or receiving a segment.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The datagram could not be converted to or from a segment.
    #[error("wire format error: {0}")]
    Wire(#[from] WireError),
}

/// A segment-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address the OS actually bound, including any ephemeral port.
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind to `local_addr`; port 0 lets the OS choose.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        log::debug!("[socket] bound {local_addr}");
        Ok(Self { local_addr, inner })
    }

    /// Encode `seg` and send it as a single datagram to `dest`.
    pub async fn send_to(&self, seg: &Segment, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = wire::encode(seg)?;
        self.inner.send_to(&bytes, dest).await?;
        Ok(())
    }

    /// Like [`send_to`](Self::send_to) but without waiting for the socket
    /// to become writable.  Usable where no runtime can be awaited.
    pub fn try_send_to(&self, seg: &Segment, dest: SocketAddr) -> Result<(), SocketError> {
        let bytes = wire::encode(seg)?;
        self.inner.try_send_to(&bytes, dest)?;
        Ok(())
    }

    /// Receive the next datagram and decode it.
    ///
    /// A datagram that fails to decode is reported as [`SocketError::Wire`];
    /// the socket remains usable.
    pub async fn recv_from(&self) -> Result<(Segment, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let seg = wire::decode(&buf[..n])?;
        Ok((seg, addr))
    }

    /// Send raw bytes, bypassing the codec.  Used to inject junk in tests.
    #[cfg(test)]
    async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> std::io::Result<usize> {
        self.inner.send_to(bytes, dest).await
    }
}
