//! Rack Controller: ingests server carriers over UDP, scores rack health,
//! and reports upward to the DC Controller.

mod analysis;
mod dc_reporter;
mod ingest;
mod metrics_server;
mod state;

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use netwatch_common::RackReport;
use tokio::net::UdpSocket;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use dc_reporter::DcReporter;
use ingest::{ingest, log_ingest_error};
use state::RackState;

#[derive(Parser, Debug)]
#[command(name = "netwatch-rack", about = "NetWatch Rack Controller")]
struct Cli {
    /// Id of the rack this controller serves.
    #[arg(long, env = "RACK_ID")]
    rack_id: u32,

    /// UDP port to listen for server agent datagrams on. Defaults to
    /// 9999 + rack_id.
    #[arg(long, env = "UDP_LISTEN_PORT")]
    udp_listen_port: Option<u16>,

    /// Host of the DC Controller to report to.
    #[arg(long, env = "DC_HOST", default_value = "localhost")]
    dc_host: String,

    /// TCP port of the DC Controller.
    #[arg(long, env = "DC_PORT", default_value_t = netwatch_common::config::DEFAULT_DC_PORT)]
    dc_port: u16,

    /// How often to run a spectral analysis pass and send a rack report, in
    /// seconds.
    #[arg(long, env = "ANALYSIS_INTERVAL_SEC", default_value_t = 5)]
    analysis_interval_sec: u64,

    /// Sampling rate each server agent uses for its carrier, in Hz. Must
    /// match the agents reporting to this rack.
    #[arg(long, env = "SAMPLE_RATE_HZ", default_value_t = 20.0)]
    sample_rate_hz: f64,

    /// Port the `/metrics` HTTP endpoint listens on. Defaults to
    /// 8000 + rack_id.
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

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

    let udp_port = cli
        .udp_listen_port
        .unwrap_or_else(|| netwatch_common::config::default_udp_listen_port(cli.rack_id));
    let metrics_port = cli
        .metrics_port
        .unwrap_or_else(|| netwatch_common::config::default_rack_metrics_port(cli.rack_id));

    let socket = match UdpSocket::bind(("0.0.0.0", udp_port)).await {
        Ok(s) => s,
        Err(e) => {
            error!(port = udp_port, error = %e, "failed to bind UDP listen socket");
            return ExitCode::from(2);
        }
    };

    let rack = Arc::new(RackState::new(cli.rack_id));
    info!(rack_id = cli.rack_id, udp_port, "rack controller starting");

    let metrics_addr = format!("0.0.0.0:{metrics_port}");
    let metrics_listener = match tokio::net::TcpListener::bind(&metrics_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %metrics_addr, error = %e, "failed to bind metrics listener");
            return ExitCode::from(2);
        }
    };
    let metrics_router = metrics_server::router(rack.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_router).await {
            error!(error = %e, "metrics server exited");
        }
    });

    // The analysis pass and the DC report share one cadence: the Rack
    // Controller sends one report per analysis pass, each carrying the
    // freshly recomputed rack health score.
    let pass_rack = rack.clone();
    let sample_rate_hz = cli.sample_rate_hz;
    let analysis_interval = Duration::from_secs(cli.analysis_interval_sec);
    let dc_addr = format!("{}:{}", cli.dc_host, cli.dc_port);
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let report_task = tokio::spawn(async move {
        let mut reporter = DcReporter::new(dc_addr);
        let mut ticker = interval(analysis_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    analysis::run_pass(&pass_rack, expected_frequency_for_rack(&pass_rack), sample_rate_hz).await;

                    let server_count = pass_rack.servers.read().await.len() as u32;
                    let health_score = *pass_rack.health_score.read().await;
                    let report = RackReport {
                        rack_id: pass_rack.rack_id,
                        health_score,
                        server_count,
                        timestamp: unix_timestamp_secs(),
                    };
                    reporter.send(&report).await;
                }
                _ = shutdown_rx.changed() => {
                    info!("analysis/report task draining before shutdown");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = run_ingest_loop(socket, rack) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining in-flight work");
        }
    }

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(1), report_task).await.is_err() {
        tracing::warn!("analysis/report task did not drain within shutdown deadline");
    }

    ExitCode::SUCCESS
}

fn expected_frequency_for_rack(rack: &RackState) -> impl Fn(u32) -> f64 {
    let rack_id = rack.rack_id;
    move |server_id| expected_frequency(rack_id, server_id)
}

async fn run_ingest_loop(socket: UdpSocket, rack: Arc<RackState>) {
    let mut buf = [0u8; 1024];
    let mut seen_foreign_racks: HashSet<u32> = HashSet::new();

    loop {
        let (n, _peer) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "UDP recv error, continuing");
                continue;
            }
        };

        match ingest(&rack, &buf[..n], Instant::now()).await {
            Ok(_) => {}
            Err(e) => log_ingest_error(&mut seen_foreign_racks, &e),
        }
    }
}

fn unix_timestamp_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_matches_agent_formula() {
        assert_eq!(expected_frequency(0, 0), 1.0);
        assert_eq!(expected_frequency(2, 4), 3.2);
    }
}
