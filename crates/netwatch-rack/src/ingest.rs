//! UDP ingest path: decode, reject cross-rack traffic, update per-server
//! state.

use std::sync::atomic::Ordering;
use std::time::Instant;

use netwatch_common::{NetWatchError, SampleDatagram};
use tracing::{debug, warn};

use crate::state::RackState;

/// Decode and fold one raw UDP payload into rack state.
///
/// Returns the decoded datagram on success so the caller can log or test
/// against it; errors are already accounted for in the rack's debug
/// counters before they're returned.
pub async fn ingest(
    rack: &RackState,
    raw: &[u8],
    received_at: Instant,
) -> Result<SampleDatagram, NetWatchError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| NetWatchError::Decode(format!("non-utf8 datagram: {e}")))?;

    let datagram = match SampleDatagram::decode(text) {
        Ok(d) => d,
        Err(e) => {
            rack.decode_errors.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
    };

    if datagram.rack_id != rack.rack_id {
        rack.cross_rack_drops.fetch_add(1, Ordering::Relaxed);
        return Err(NetWatchError::CrossRackDatagram {
            got: datagram.rack_id,
            expected: rack.rack_id,
        });
    }

    let server = rack.server_or_insert(datagram.server_id).await;
    let mut server = server.lock().await;

    server.account_sequence(datagram.seq);
    server.push_sample(datagram.wave_sample);
    server.packets_received += 1;
    server.last_seen = Some(received_at);

    let latency_ms = (unix_timestamp_secs() - datagram.sent_ts).max(0.0) * 1000.0;
    server.latency_ms.observe(latency_ms);

    debug!(
        rack_id = datagram.rack_id,
        server_id = datagram.server_id,
        seq = datagram.seq,
        latency_ms,
        "datagram ingested"
    );

    Ok(datagram)
}

/// Log a decode or cross-rack failure, suppressing repeats per offending
/// rack id so a misconfigured sender can't flood the log.
pub fn log_ingest_error(seen_rack_ids: &mut std::collections::HashSet<u32>, err: &NetWatchError) {
    match err {
        NetWatchError::CrossRackDatagram { got, .. } => {
            if seen_rack_ids.insert(*got) {
                warn!(error = %err, rack_id = got, "dropping datagram for foreign rack");
            }
        }
        other => warn!(error = %other, "dropping malformed datagram"),
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

    #[tokio::test]
    async fn accepts_datagram_for_own_rack() {
        let rack = RackState::new(0);
        let d = SampleDatagram {
            rack_id: 0,
            server_id: 1,
            seq: 0,
            sent_ts: unix_timestamp_secs(),
            wave_sample: 0.5,
        };
        let raw = d.encode();
        let result = ingest(&rack, raw.as_bytes(), Instant::now()).await;
        assert!(result.is_ok());
        let server = rack.server_or_insert(1).await;
        let server = server.lock().await;
        assert_eq!(server.packets_received, 1);
        assert_eq!(server.samples.back().copied(), Some(0.5));
    }

    #[tokio::test]
    async fn rejects_datagram_for_foreign_rack() {
        let rack = RackState::new(0);
        let d = SampleDatagram {
            rack_id: 1,
            server_id: 1,
            seq: 0,
            sent_ts: unix_timestamp_secs(),
            wave_sample: 0.5,
        };
        let raw = d.encode();
        let result = ingest(&rack, raw.as_bytes(), Instant::now()).await;
        assert!(matches!(
            result,
            Err(NetWatchError::CrossRackDatagram { got: 1, expected: 0 })
        ));
        assert_eq!(rack.cross_rack_drops.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn rejects_malformed_payload_and_counts_it() {
        let rack = RackState::new(0);
        let result = ingest(&rack, b"garbage", Instant::now()).await;
        assert!(result.is_err());
        assert_eq!(rack.decode_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn loss_is_credited_across_ingest_calls() {
        let rack = RackState::new(0);
        for seq in [0u64, 1, 5] {
            let d = SampleDatagram {
                rack_id: 0,
                server_id: 2,
                seq,
                sent_ts: unix_timestamp_secs(),
                wave_sample: 0.0,
            };
            let raw = d.encode();
            ingest(&rack, raw.as_bytes(), Instant::now()).await.unwrap();
        }
        let server = rack.server_or_insert(2).await;
        let server = server.lock().await;
        assert_eq!(server.packets_lost, 3);
        assert_eq!(server.packets_received, 3);
    }

    #[tokio::test]
    async fn out_of_order_arrival_credits_exactly_one_loss() {
        // Scenario S3 end-to-end through the ingest path.
        let rack = RackState::new(0);
        for seq in [0u64, 1, 3, 2, 4] {
            let d = SampleDatagram {
                rack_id: 0,
                server_id: 5,
                seq,
                sent_ts: unix_timestamp_secs(),
                wave_sample: 0.0,
            };
            let raw = d.encode();
            ingest(&rack, raw.as_bytes(), Instant::now()).await.unwrap();
        }
        let server = rack.server_or_insert(5).await;
        let server = server.lock().await;
        assert_eq!(server.packets_received, 5);
        assert_eq!(server.packets_lost, 1);
    }
}
