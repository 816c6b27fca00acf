//! DC Controller: accepts TCP connections from Rack Controllers and rolls
//! their reports up into a single datacenter health score.

mod connection;
mod metrics_server;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use state::DcState;

#[derive(Parser, Debug)]
#[command(name = "netwatch-dc", about = "NetWatch DC Controller")]
struct Cli {
    /// Identifier for this datacenter, used only to label metrics.
    #[arg(long, env = "DC_ID", default_value_t = 0)]
    dc_id: u32,

    /// TCP port to accept rack connections on. This is the same port racks
    /// default to reporting on via their own `DC_PORT`.
    #[arg(long, env = "DC_PORT", default_value_t = netwatch_common::config::DEFAULT_DC_PORT)]
    dc_port: u16,

    /// How often to emit a summary log line, in seconds.
    #[arg(long, env = "DC_SUMMARY_INTERVAL_SEC", default_value_t = 10)]
    dc_summary_interval_sec: u64,

    /// Port the `/metrics` HTTP endpoint listens on.
    #[arg(long, env = "METRICS_PORT", default_value_t = netwatch_common::config::DEFAULT_DC_METRICS_PORT)]
    metrics_port: u16,
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

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", cli.dc_port)).await {
        Ok(l) => l,
        Err(e) => {
            error!(port = cli.dc_port, error = %e, "failed to bind TCP listen socket");
            return ExitCode::from(2);
        }
    };

    let dc = Arc::new(DcState::new(cli.dc_id));
    info!(dc_id = cli.dc_id, port = cli.dc_port, "dc controller starting");

    let metrics_addr = format!("0.0.0.0:{}", cli.metrics_port);
    let metrics_listener = match tokio::net::TcpListener::bind(&metrics_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %metrics_addr, error = %e, "failed to bind metrics listener");
            return ExitCode::from(2);
        }
    };
    let metrics_router = metrics_server::router(dc.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_router).await {
            error!(error = %e, "metrics server exited");
        }
    });

    let summary_dc = dc.clone();
    let summary_interval = Duration::from_secs(cli.dc_summary_interval_sec);
    let (shutdown_tx, mut summary_shutdown_rx) = tokio::sync::watch::channel(false);
    let summary_task = tokio::spawn(async move {
        let mut ticker = interval(summary_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (score, fresh_count, stale_count) = summary_dc.health_rollup().await;
                    info!(
                        rack_count = fresh_count + stale_count,
                        dc_health_score = score,
                        stale_count,
                        "dc health summary"
                    );
                }
                _ = summary_shutdown_rx.changed() => {
                    info!("summary task draining before shutdown");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = accept_loop(listener, dc) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, draining in-flight work");
        }
    }

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(1), summary_task).await.is_err() {
        tracing::warn!("summary task did not drain within shutdown deadline");
    }

    ExitCode::SUCCESS
}

async fn accept_loop(listener: tokio::net::TcpListener, dc: Arc<DcState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept rack connection, continuing");
                continue;
            }
        };
        let dc = dc.clone();
        tokio::spawn(async move {
            connection::handle_connection(stream, peer, dc).await;
        });
    }
}
