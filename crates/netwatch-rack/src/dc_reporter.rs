//! TCP reporter to the DC Controller.
//!
//! A single long-lived connection, reconnected with capped exponential
//! backoff on any error. There is no send queue: a report that fails to go
//! out is dropped, not retried, since the next periodic tick will carry a
//! fresher reading anyway.

use std::time::Duration;

use netwatch_common::RackReport;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reconnecting TCP client that ships [`RackReport`]s to a DC Controller.
pub struct DcReporter {
    addr: String,
    state: ReporterState,
    stream: Option<TcpStream>,
    backoff: Duration,
}

impl DcReporter {
    pub fn new(addr: String) -> Self {
        DcReporter {
            addr,
            state: ReporterState::Disconnected,
            stream: None,
            backoff: BACKOFF_INITIAL,
        }
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    /// Ensure a connection exists, reconnecting with backoff if needed.
    /// Returns `false` if this call's connection attempt failed.
    async fn ensure_connected(&mut self) -> bool {
        if self.state == ReporterState::Connected && self.stream.is_some() {
            return true;
        }

        self.state = ReporterState::Connecting;
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => {
                info!(addr = %self.addr, "connected to DC controller");
                self.stream = Some(stream);
                self.state = ReporterState::Connected;
                self.backoff = BACKOFF_INITIAL;
                true
            }
            Ok(Err(e)) => {
                warn!(addr = %self.addr, error = %e, "failed to connect to DC controller");
                self.enter_backoff().await;
                false
            }
            Err(_) => {
                warn!(addr = %self.addr, "timed out connecting to DC controller");
                self.enter_backoff().await;
                false
            }
        }
    }

    async fn enter_backoff(&mut self) {
        self.state = ReporterState::Disconnected;
        self.stream = None;
        let jitter_frac: f64 = rand::rng().random_range(-0.2..=0.2);
        let jittered = self.backoff.mul_f64(1.0 + jitter_frac).max(Duration::from_millis(100));
        debug!(backoff_ms = jittered.as_millis(), "backing off before next connect attempt");
        tokio::time::sleep(jittered).await;
        self.backoff = (self.backoff * 2).min(BACKOFF_CAP);
    }

    /// Send one report. On any I/O failure the connection is dropped and the
    /// state machine falls back to `Disconnected`; the caller should just
    /// try again on the next tick rather than retrying this report.
    pub async fn send(&mut self, report: &RackReport) {
        if !self.ensure_connected().await {
            return;
        }

        let line = report.encode_line();
        let stream = self.stream.as_mut().expect("connected state implies a stream");

        match timeout(SEND_TIMEOUT, stream.write_all(line.as_bytes())).await {
            Ok(Ok(())) => debug!(rack_id = report.rack_id, "report sent"),
            Ok(Err(e)) => {
                warn!(error = %e, "failed to send report, disconnecting");
                self.state = ReporterState::Disconnected;
                self.stream = None;
            }
            Err(_) => {
                warn!("timed out sending report, disconnecting");
                self.state = ReporterState::Disconnected;
                self.stream = None;
            }
        }
    }
}
