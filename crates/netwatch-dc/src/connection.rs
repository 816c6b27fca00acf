//! Per-rack TCP connection handling.
//!
//! Each accepted connection is handled independently: malformed lines are
//! logged and skipped, never tearing down the connection, since one rack's
//! transient corruption shouldn't cost every other rack its reporting
//! channel too.

use std::sync::Arc;

use netwatch_common::RackReport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::state::DcState;

pub async fn handle_connection(stream: TcpStream, peer: std::net::SocketAddr, dc: Arc<DcState>) {
    info!(%peer, "rack connection accepted");
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match RackReport::decode(line) {
                    Ok(report) => {
                        debug!(rack_id = report.rack_id, health_score = report.health_score, "report received");
                        dc.record(report).await;
                    }
                    Err(e) => warn!(%peer, error = %e, "skipping malformed rack report"),
                }
            }
            Ok(None) => {
                info!(%peer, "rack connection closed");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "error reading from rack connection");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn malformed_line_does_not_close_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dc = Arc::new(DcState::new(0));
        let dc_clone = dc.clone();

        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, dc_clone).await;
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"not a valid report\n").await.unwrap();
        let good = RackReport {
            rack_id: 1,
            health_score: 0.9,
            server_count: 2,
            timestamp: 1.0,
        };
        client.write_all(good.encode_line().as_bytes()).await.unwrap();
        drop(client);

        server.await.unwrap();
        let reports = dc.reports.read().await;
        assert_eq!(reports.get(&1).unwrap().0.health_score, 0.9);
    }
}
