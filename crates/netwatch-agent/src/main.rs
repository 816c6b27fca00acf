//! Server Agent: emits a per-server sine-wave carrier over UDP.
//!
//! Each agent owns one "expected frequency" derived from its rack and
//! server id, samples it at a fixed rate, and fires one [`SampleDatagram`]
//! per tick at its Rack Controller. There is no feedback path — a dropped
//! or refused send is logged and the tick loop moves on.

use std::f64::consts::PI;
use std::net::ToSocketAddrs;
use std::process::ExitCode;

use clap::Parser;
use netwatch_common::SampleDatagram;
use tokio::net::UdpSocket;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "netwatch-agent", about = "NetWatch Server Agent")]
struct Cli {
    /// Rack this server belongs to.
    #[arg(long, env = "RACK_ID")]
    rack_id: u32,

    /// Id of this server within its rack.
    #[arg(long, env = "SERVER_ID")]
    server_id: u32,

    /// Host of the Rack Controller to report to.
    #[arg(long, env = "RACK_CONTROLLER_HOST", default_value = "localhost")]
    rack_controller_host: String,

    /// UDP port of the Rack Controller. No default: every deployment must
    /// say explicitly which rack controller a server agent feeds.
    #[arg(long, env = "RACK_CONTROLLER_PORT")]
    rack_controller_port: u16,

    /// Sampling rate of the synthetic carrier, in Hz.
    #[arg(long, env = "SAMPLE_RATE_HZ", default_value_t = 20.0)]
    sample_rate_hz: f64,

    /// Carrier amplitude.
    #[arg(long, env = "AMPLITUDE", default_value_t = 1.0)]
    amplitude: f64,
}

/// Expected carrier frequency for a given rack/server pair, in Hz.
fn expected_frequency(rack_id: u32, server_id: u32) -> f64 {
    (1 + rack_id) as f64 + 0.05 * server_id as f64
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli: Cli = match netwatch_common::cli::parse_or_exit() {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    let target = format!("{}:{}", cli.rack_controller_host, cli.rack_controller_port);

    let target_addr = match target.to_socket_addrs().map(|mut it| it.next()) {
        Ok(Some(addr)) => addr,
        Ok(None) | Err(_) => {
            error!(%target, "could not resolve rack controller address");
            return ExitCode::from(1);
        }
    };

    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to bind local UDP socket");
            return ExitCode::from(1);
        }
    };

    let freq = expected_frequency(cli.rack_id, cli.server_id);
    info!(
        rack_id = cli.rack_id,
        server_id = cli.server_id,
        %target_addr,
        frequency_hz = freq,
        sample_rate_hz = cli.sample_rate_hz,
        "server agent starting"
    );

    tokio::select! {
        _ = run(socket, target_addr, cli, freq) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping carrier");
        }
    }
    ExitCode::SUCCESS
}

async fn run(
    socket: UdpSocket,
    target_addr: std::net::SocketAddr,
    cli: Cli,
    freq: f64,
) {
    let period = Duration::from_secs_f64(1.0 / cli.sample_rate_hz);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut n: u64 = 0;
    let mut seq: u64 = 0;

    loop {
        ticker.tick().await;

        let t = n as f64 / cli.sample_rate_hz;
        let wave_sample = cli.amplitude * (2.0 * PI * freq * t).sin();
        let sent_ts = unix_timestamp_secs();

        let datagram = SampleDatagram {
            rack_id: cli.rack_id,
            server_id: cli.server_id,
            seq,
            sent_ts,
            wave_sample,
        };

        let encoded = datagram.encode();
        match socket.send_to(encoded.as_bytes(), target_addr).await {
            Ok(_) => debug!(seq, wave_sample, "sample sent"),
            Err(e) => warn!(error = %e, seq, "failed to send sample, dropping"),
        }

        n += 1;
        seq += 1;
    }
}

fn unix_timestamp_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
