//! Entry point for `tcp-engine`.
//!
//! Parses CLI arguments and runs one connection in either **listen** or
//! **connect** mode, moving stdin to the peer and the peer to stdout.
//! All protocol work is delegated to the library; `main.rs` owns only
//! process setup (logging, argument parsing, stdio).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use tcp_engine::config::{DEFAULT_CAPACITY, MAX_RETX_ATTEMPTS, TIMEOUT_DFLT};
use tcp_engine::session::Session;
use tcp_engine::socket::Socket;
use tcp_engine::TcpConfig;

/// Reliable TCP-style byte stream over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct Tuning {
    /// Capacity of each byte stream, in bytes.
    #[arg(long, global = true, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Initial retransmission timeout, in milliseconds.
    #[arg(long, global = true, default_value_t = TIMEOUT_DFLT)]
    rto_ms: u64,

    /// Consecutive retransmissions tolerated before resetting.
    #[arg(long, global = true, default_value_t = MAX_RETX_ATTEMPTS)]
    max_retx: u32,

    /// How often the connection's clock is advanced, in milliseconds.
    #[arg(long, global = true, default_value_t = 10)]
    tick_ms: u64,
}

#[derive(Subcommand)]
enum Mode {
    /// Wait for a peer to connect.
    Listen {
        /// Local address to bind (e.g. 0.0.0.0:9000).
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
    },
    /// Connect to a listening peer.
    Connect {
        /// Remote address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        server: SocketAddr,
        /// Local address to bind; port 0 picks an ephemeral port.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
    },
}

impl Tuning {
    fn config(&self) -> TcpConfig {
        TcpConfig {
            recv_capacity: self.capacity,
            send_capacity: self.capacity,
            rt_timeout: self.rto_ms,
            max_retx_attempts: self.max_retx,
            ..TcpConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity.
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.tuning.config();
    let tick = Duration::from_millis(cli.tuning.tick_ms.max(1));

    let session = match cli.mode {
        Mode::Listen { bind } => {
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            Session::listen(socket, config, tick)
        }
        Mode::Connect { server, bind } => {
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            Session::connect(socket, server, config, tick)
        }
    };

    session
        .run(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("session failed")?;
    Ok(())
}
