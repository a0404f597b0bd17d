//! Integration tests for the connection state machine.
//!
//! Two [`Connection`]s are wired back to back in memory: whatever one puts on
//! its outbound queue is handed straight to the other.  No sockets and no
//! wall-clock time are involved, so every scenario is exact.

use tcp_engine::segment::flags;
use tcp_engine::state::ConnectionState;
use tcp_engine::{Connection, Outbound, Segment, TcpConfig, Wrap32};

const RTO: u64 = 1000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Endpoint {
    conn: Connection,
    out: Outbound,
}

impl Endpoint {
    fn new(isn: u32, recv_capacity: usize) -> Self {
        let config = TcpConfig {
            recv_capacity,
            rt_timeout: RTO,
            fixed_isn: Some(Wrap32::new(isn)),
            ..TcpConfig::default()
        };
        let (conn, out) = Connection::new(config, &mut rand::rng());
        Self { conn, out }
    }

    fn drain(&mut self) -> Vec<Segment> {
        let mut segs = Vec::new();
        while let Ok(seg) = self.out.try_recv() {
            segs.push(seg);
        }
        segs
    }
}

/// Shuttle segments both ways until neither side has anything to say.
fn pump(a: &mut Endpoint, b: &mut Endpoint) {
    loop {
        let from_a = a.drain();
        let from_b = b.drain();
        if from_a.is_empty() && from_b.is_empty() {
            return;
        }
        for seg in from_a {
            b.conn.segment_received(seg);
        }
        for seg in from_b {
            a.conn.segment_received(seg);
        }
    }
}

/// Client at ISN 100, server at ISN 5000, handshake completed.
fn established() -> (Endpoint, Endpoint) {
    let mut client = Endpoint::new(100, 64_000);
    let mut server = Endpoint::new(5000, 64_000);
    client.conn.connect();
    pump(&mut client, &mut server);
    assert_eq!(client.conn.state(), ConnectionState::Established);
    assert_eq!(server.conn.state(), ConnectionState::Established);
    (client, server)
}

fn segment_with(flag_bits: u8, seqno: u32) -> Segment {
    let mut seg = Segment::default();
    seg.header.seqno = Wrap32::new(seqno);
    seg.header.flags = flag_bits;
    seg
}

// ---------------------------------------------------------------------------
// Opening
// ---------------------------------------------------------------------------

#[test]
fn three_way_handshake_step_by_step() {
    let mut client = Endpoint::new(100, 64_000);
    let mut server = Endpoint::new(5000, 64_000);

    client.conn.connect();
    let syn = client.drain();
    assert_eq!(syn.len(), 1);
    assert!(syn[0].header.syn());
    assert!(!syn[0].header.ack());
    assert_eq!(syn[0].header.seqno, Wrap32::new(100));
    assert_eq!(client.conn.state(), ConnectionState::SynSent);

    server.conn.segment_received(syn[0].clone());
    let syn_ack = server.drain();
    assert_eq!(syn_ack.len(), 1);
    assert!(syn_ack[0].header.syn());
    assert!(syn_ack[0].header.ack());
    assert_eq!(syn_ack[0].header.seqno, Wrap32::new(5000));
    assert_eq!(syn_ack[0].header.ackno, Wrap32::new(101));
    assert_eq!(server.conn.state(), ConnectionState::SynReceived);

    client.conn.segment_received(syn_ack[0].clone());
    let ack = client.drain();
    assert_eq!(ack.len(), 1);
    assert!(ack[0].header.ack());
    assert_eq!(ack[0].length_in_sequence_space(), 0);
    assert_eq!(ack[0].header.ackno, Wrap32::new(5001));
    assert_eq!(client.conn.state(), ConnectionState::Established);

    server.conn.segment_received(ack[0].clone());
    assert!(server.drain().is_empty());
    assert_eq!(server.conn.state(), ConnectionState::Established);
}

#[test]
fn segments_before_syn_are_ignored() {
    let mut server = Endpoint::new(5000, 64_000);

    let mut stray = segment_with(flags::ACK, 77);
    stray.header.ackno = Wrap32::new(5001);
    stray.payload = b"stray".to_vec();
    server.conn.segment_received(stray);

    assert!(server.drain().is_empty());
    assert!(server.conn.active());
    assert_eq!(server.conn.state(), ConnectionState::Listen);
    assert_eq!(server.conn.inbound_stream().bytes_written(), 0);
}

#[test]
fn data_written_before_open_follows_the_handshake() {
    let mut client = Endpoint::new(100, 64_000);
    let mut server = Endpoint::new(5000, 64_000);

    assert_eq!(server.conn.write(b"early reply"), 11);
    assert!(server.drain().is_empty());

    client.conn.connect();
    pump(&mut client, &mut server);
    assert_eq!(client.conn.read(64), b"early reply");
}

// ---------------------------------------------------------------------------
// Data transfer
// ---------------------------------------------------------------------------

#[test]
fn data_flows_in_both_directions() {
    let (mut client, mut server) = established();

    assert_eq!(client.conn.write(b"hello"), 5);
    assert_eq!(client.conn.bytes_in_flight(), 5);
    pump(&mut client, &mut server);
    assert_eq!(client.conn.bytes_in_flight(), 0);
    assert_eq!(server.conn.read(100), b"hello");

    assert_eq!(server.conn.write(b"world"), 5);
    pump(&mut client, &mut server);
    assert_eq!(client.conn.read(100), b"world");
}

#[test]
fn small_receive_window_throttles_sender() {
    let mut client = Endpoint::new(100, 64_000);
    let mut server = Endpoint::new(5000, 10);
    client.conn.connect();
    pump(&mut client, &mut server);

    let data: Vec<u8> = (0u8..30).collect();
    assert_eq!(client.conn.write(&data), 30);
    pump(&mut client, &mut server);
    assert_eq!(server.conn.read(100), &data[..10]);

    // Reading opens the window but sends nothing; the sender's zero-window
    // probe discovers it once its timer fires.
    assert!(server.drain().is_empty());
    client.conn.tick(RTO);
    pump(&mut client, &mut server);
    assert_eq!(server.conn.read(100), &data[10..20]);
}

// ---------------------------------------------------------------------------
// Closing
// ---------------------------------------------------------------------------

#[test]
fn active_closer_lingers_passive_closer_does_not() {
    let (mut client, mut server) = established();

    client.conn.end_input_stream();
    pump(&mut client, &mut server);
    assert_eq!(client.conn.state(), ConnectionState::FinWait2);
    assert_eq!(server.conn.state(), ConnectionState::CloseWait);
    assert!(server.conn.inbound_stream().is_eof());

    server.conn.end_input_stream();
    let fin = server.drain();
    assert_eq!(fin.len(), 1);
    assert!(fin[0].header.fin());
    assert_eq!(server.conn.state(), ConnectionState::LastAck);

    client.conn.segment_received(fin[0].clone());
    assert_eq!(client.conn.state(), ConnectionState::TimeWait);
    pump(&mut client, &mut server);

    assert!(!server.conn.active());
    assert_eq!(server.conn.state(), ConnectionState::Closed);

    assert!(client.conn.active());
    client.conn.tick(10 * RTO - 1);
    assert!(client.conn.active());
    client.conn.tick(1);
    assert!(!client.conn.active());
    assert_eq!(client.conn.state(), ConnectionState::Closed);
}

#[test]
fn lingering_side_re_acks_a_retransmitted_fin() {
    let (mut client, mut server) = established();

    client.conn.end_input_stream();
    pump(&mut client, &mut server);
    server.conn.end_input_stream();
    let fin = server.drain();
    client.conn.segment_received(fin[0].clone());
    // The ACK of the FIN is lost.
    let lost = client.drain();
    assert_eq!(lost.len(), 1);

    server.conn.tick(RTO);
    let retx = server.drain();
    assert_eq!(retx, fin);

    client.conn.tick(5 * RTO);
    client.conn.segment_received(retx[0].clone());
    let ack = client.drain();
    assert_eq!(ack.len(), 1);
    assert!(ack[0].header.ack());
    assert_eq!(ack[0].header.ackno, lost[0].header.ackno);
    assert_eq!(client.conn.time_since_last_segment_received(), 0);

    server.conn.segment_received(ack[0].clone());
    assert!(!server.conn.active());
}

#[test]
fn simultaneous_close_both_linger() {
    let (mut client, mut server) = established();

    client.conn.end_input_stream();
    server.conn.end_input_stream();
    assert_eq!(client.conn.state(), ConnectionState::FinWait1);
    assert_eq!(server.conn.state(), ConnectionState::FinWait1);

    pump(&mut client, &mut server);
    assert_eq!(client.conn.state(), ConnectionState::TimeWait);
    assert_eq!(server.conn.state(), ConnectionState::TimeWait);

    client.conn.tick(10 * RTO);
    server.conn.tick(10 * RTO);
    assert!(!client.conn.active());
    assert!(!server.conn.active());
}

// ---------------------------------------------------------------------------
// Aborts
// ---------------------------------------------------------------------------

#[test]
fn inbound_rst_aborts_without_reply() {
    let (_client, mut server) = established();

    server.conn.segment_received(segment_with(flags::RST, 12345));

    assert!(!server.conn.active());
    assert!(server.conn.inbound_stream().is_error());
    assert!(server.conn.outbound_stream().is_error());
    assert_eq!(server.conn.state(), ConnectionState::Reset);
    assert!(server.drain().is_empty());

    // An aborted connection ignores everything afterwards.
    server.conn.segment_received(segment_with(flags::SYN, 1));
    server.conn.tick(100 * RTO);
    assert!(server.drain().is_empty());
}

#[test]
fn rst_while_listening_aborts() {
    let mut server = Endpoint::new(5000, 64_000);
    server.conn.segment_received(segment_with(flags::RST, 0));
    assert!(!server.conn.active());
    assert_eq!(server.conn.state(), ConnectionState::Reset);
}

#[test]
fn too_many_retransmissions_send_rst() {
    let mut client = Endpoint::new(100, 64_000);
    let max_retx = client.conn.config().max_retx_attempts;
    client.conn.connect();
    assert_eq!(client.drain().len(), 1);

    client.conn.tick(RTO - 1);
    assert!(client.drain().is_empty());
    client.conn.tick(1);

    // Each retransmission doubles the timeout.
    let mut rto = RTO;
    for attempt in 1..=max_retx {
        if attempt > 1 {
            client.conn.tick(rto);
        }
        let retx = client.drain();
        assert_eq!(retx.len(), 1, "attempt {attempt}");
        assert!(retx[0].header.syn());
        assert!(client.conn.active());
        rto *= 2;
    }

    // Expiry number max_retx + 1 puts out a RST in place of the SYN.
    client.conn.tick(rto);
    let rst = client.drain();
    assert_eq!(rst.len(), 1);
    assert!(rst[0].header.rst());
    assert!(!client.conn.active());
    assert_eq!(client.conn.state(), ConnectionState::Reset);
}

#[test]
fn dropping_an_open_connection_resets_the_peer() {
    let (client, mut server) = established();
    let Endpoint { conn, mut out } = client;

    drop(conn);
    let rst = out.try_recv().expect("RST from dropped connection");
    assert!(rst.header.rst());

    server.conn.segment_received(rst);
    assert_eq!(server.conn.state(), ConnectionState::Reset);
}

#[test]
fn dropping_a_closed_connection_is_silent() {
    let (mut client, mut server) = established();
    client.conn.end_input_stream();
    server.conn.end_input_stream();
    pump(&mut client, &mut server);
    client.conn.tick(10 * RTO);
    assert!(!client.conn.active());

    let Endpoint { conn, mut out } = client;
    drop(conn);
    assert!(out.try_recv().is_err());
}
