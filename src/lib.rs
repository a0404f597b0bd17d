//! `tcp-engine` — the reliability core of TCP, runnable over UDP.
//!
//! # Architecture
//!
//! ```text
//!   application bytes                          application bytes
//!         │ write                                     ▲ read
//!  ┌──────▼─────┐   segments (+ACK/window)   ┌────────┴─────┐
//!  │   Sender   │──────────────────────────▶ │   Receiver   │
//!  └──────┬─────┘                            └──────┬───────┘
//!         │ ACKs / window                          │ push_substring
//!         │◀─────────────────────────────┐   ┌─────▼───────┐
//!  ┌──────▼──────────────────────────────┴─┐ │ Reassembler │
//!  │              Connection               │ └─────────────┘
//!  │ (state machine, RST, linger, timers)  │
//!  └──────┬────────────────────────────────┘
//!         │ Outbound FIFO / segment_received / tick
//!  ┌──────▼──────┐
//!  │   Session   │  (tokio driver: UDP socket + wall-clock ticks)
//!  └─────────────┘
//! ```
//!
//! The protocol core is synchronous and deterministic: time only advances
//! through `tick`, and no module below [`session`] performs I/O.
//!
//! Each module has a single responsibility:
//! - [`byte_stream`]  — bounded FIFO with end-of-input and error flags
//! - [`wrapping`]     — 32-bit ⇄ 64-bit sequence-number conversion
//! - [`segment`]      — structured segment records and flag bits
//! - [`timer`]        — logical retransmission timer with back-off
//! - [`sender`]       — windowed transmission and retransmission
//! - [`reassembler`]  — out-of-order buffering ahead of the inbound stream
//! - [`receiver`]     — ackno / window computation
//! - [`state`]        — derived FSM states
//! - [`connection`]   — the endpoint state machine
//! - [`config`]       — construction parameters and protocol constants
//! - [`wire`]         — segment serialisation for datagram transports
//! - [`socket`]       — async UDP socket speaking segments
//! - [`session`]      — event loop pumping a connection over a socket
//! - [`simulator`]    — seeded lossy link for deterministic testing

pub mod byte_stream;
pub mod config;
pub mod connection;
pub mod reassembler;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;
pub mod wire;
pub mod wrapping;

pub use config::TcpConfig;
pub use connection::{Connection, Outbound};
pub use segment::{Header, Segment};
pub use wrapping::Wrap32;
