//! Async driver running one [`Connection`] over a UDP [`Socket`].
//!
//! The connection itself never performs I/O.  A [`Session`] supplies it:
//!
//! ```text
//!   input (AsyncRead) ──write──▶ ┌────────────┐ ──Outbound──▶ socket.send_to
//!                                │ Connection │
//!   output (AsyncWrite) ◀─read── └────────────┘ ◀──segment── socket.recv_from
//!                                       ▲
//!                                       └── tick(ms) from a tokio interval
//! ```
//!
//! One loop iteration flushes queued segments to the peer, hands delivered
//! bytes to the application, then waits on whichever comes first: the tick
//! interval, an inbound datagram, or application input (only while the
//! outbound stream has room).  The loop ends when the connection stops
//! being active.
//!
//! A session that stops early still resets the connection, and the RST goes
//! out before the session lets go of its socket.  A listening session learns
//! its peer from the first SYN; other datagrams are dropped until then.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{TcpConfig, MAX_PAYLOAD_SIZE};
use crate::connection::{Connection, Outbound};
use crate::segment::Segment;
use crate::socket::{Socket, SocketError};

/// Errors that end a [`Session`] early.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Reading application input or writing application output failed.
    #[error("application I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The connection was aborted by a RST, sent or received.
    #[error("connection reset")]
    Reset,
}

/// A connection bound to a socket and, once known, a peer address.
#[derive(Debug)]
pub struct Session {
    socket: Socket,
    peer: Option<SocketAddr>,
    conn: Connection,
    outbound: Outbound,
    tick_interval: Duration,
}

impl Session {
    /// Actively open a connection to `peer`.  The SYN is queued immediately.
    pub fn connect(
        socket: Socket,
        peer: SocketAddr,
        config: TcpConfig,
        tick_interval: Duration,
    ) -> Self {
        let (mut conn, outbound) = Connection::new(config, &mut rand::rng());
        conn.connect();
        log::info!("[session] {} connecting to {peer}", socket.local_addr);
        Self {
            socket,
            peer: Some(peer),
            conn,
            outbound,
            tick_interval,
        }
    }

    /// Wait for a peer to open a connection.  The first SYN that decodes
    /// fixes the peer address.
    pub fn listen(socket: Socket, config: TcpConfig, tick_interval: Duration) -> Self {
        let (conn, outbound) = Connection::new(config, &mut rand::rng());
        log::info!("[session] listening on {}", socket.local_addr);
        Self {
            socket,
            peer: None,
            conn,
            outbound,
            tick_interval,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Pump bytes from `input` to the peer and from the peer to `output`
    /// until the connection finishes.
    ///
    /// End of `input` closes the outbound direction.  If the session ends
    /// with the connection still active, because of an error or because
    /// this future is dropped, the peer is sent a RST.
    pub async fn run<I, O>(mut self, mut input: I, mut output: O) -> Result<(), SessionError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let driven = self.drive(&mut input, &mut output).await;
        if self.conn.active() {
            log::warn!("[session] ending with the connection open");
            self.conn.reset();
        }
        let flushed = flush_outbound(&self.socket, self.peer, &mut self.outbound).await;
        driven?;
        flushed?;

        if self.conn.inbound_stream().is_error() || self.conn.outbound_stream().is_error() {
            log::warn!("[session] connection reset");
            return Err(SessionError::Reset);
        }
        log::info!("[session] connection closed cleanly");
        Ok(())
    }

    /// The event loop.  Returns once the connection is no longer active.
    async fn drive<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<(), SessionError>
    where
        I: AsyncRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        let mut input_open = true;
        let mut buf = vec![0u8; MAX_PAYLOAD_SIZE];

        loop {
            flush_outbound(&self.socket, self.peer, &mut self.outbound).await?;

            let delivered = self.conn.read(usize::MAX);
            if !delivered.is_empty() {
                output.write_all(&delivered).await?;
                output.flush().await?;
            }

            if !self.conn.active() {
                break;
            }

            let room = self.conn.remaining_outbound_capacity().min(buf.len());
            let want_input = input_open && room > 0;

            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick).as_millis();
                    last_tick = now;
                    self.conn.tick(u64::try_from(elapsed).unwrap_or(u64::MAX));
                }
                received = self.socket.recv_from() => match received {
                    Ok((seg, from)) => accept(&mut self.conn, &mut self.peer, seg, from),
                    Err(SocketError::Wire(e)) => {
                        log::debug!("[session] undecodable datagram ignored: {e}");
                    }
                    Err(e) => return Err(e.into()),
                },
                read = input.read(&mut buf[..room]), if want_input => {
                    let n = read?;
                    if n == 0 {
                        log::debug!("[session] input finished; closing outbound stream");
                        input_open = false;
                        self.conn.end_input_stream();
                    } else {
                        let accepted = self.conn.write(&buf[..n]);
                        if accepted < n {
                            log::warn!("[session] outbound stream took {accepted} of {n} bytes");
                        }
                    }
                }
            }
        }

        output.flush().await?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.conn.active() {
            return;
        }
        self.conn.reset();
        let Some(dest) = self.peer else { return };
        while let Ok(seg) = self.outbound.try_recv() {
            if let Err(e) = self.socket.try_send_to(&seg, dest) {
                log::debug!("[session] parting segment lost: {e}");
                break;
            }
        }
    }
}

/// Send every queued segment to the peer.
async fn flush_outbound(
    socket: &Socket,
    peer: Option<SocketAddr>,
    outbound: &mut Outbound,
) -> Result<(), SocketError> {
    while let Ok(seg) = outbound.try_recv() {
        match peer {
            Some(dest) => socket.send_to(&seg, dest).await?,
            None => log::trace!("[session] no peer yet; dropping seq={}", seg.header.seqno),
        }
    }
    Ok(())
}

/// Hand a datagram from `from` to the connection.
///
/// Until the peer is known only a SYN is accepted, and its sender becomes
/// the peer.  Anything else, a RST included, is dropped unseen.
fn accept(conn: &mut Connection, peer: &mut Option<SocketAddr>, seg: Segment, from: SocketAddr) {
    match *peer {
        Some(known) if known != from => {
            log::debug!("[session] ignoring datagram from stranger {from}");
            return;
        }
        Some(_) => {}
        None if !seg.header.syn() => {
            log::debug!("[session] ignoring non-SYN from {from} while listening");
            return;
        }
        None => {
            log::info!("[session] peer is {from}");
            *peer = Some(from);
        }
    }
    conn.segment_received(seg);
}
