//! `/metrics` HTTP endpoint exposing everything this Rack Controller owns.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use netwatch_common::metrics::{labels, write_header, write_value};

use crate::state::RackState;

pub fn router(rack: Arc<RackState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(rack)
}

async fn metrics_handler(State(rack): State<Arc<RackState>>) -> impl IntoResponse {
    let body = render(&rack).await;
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}

async fn render(rack: &RackState) -> String {
    let mut out = String::new();
    let rack_label = [("rack_id", rack.rack_id.to_string())];
    let rack_label: Vec<(&str, &str)> = rack_label.iter().map(|(k, v)| (*k, v.as_str())).collect();

    write_header(
        &mut out,
        "netwatch_rack_health_score",
        "aggregate health score for this rack, in [0, 1]",
        "gauge",
    );
    write_value(
        &mut out,
        "netwatch_rack_health_score",
        &labels(&rack_label),
        *rack.health_score.read().await,
    );

    write_header(
        &mut out,
        "netwatch_server_spectral_error",
        "most recent spectral error for a server's carrier, in [0, 1]",
        "gauge",
    );
    write_header(
        &mut out,
        "netwatch_server_snr_db",
        "most recent signal-to-noise ratio for a server's carrier, in dB",
        "gauge",
    );
    write_header(
        &mut out,
        "netwatch_packets_received_total",
        "datagrams received from a server",
        "counter",
    );
    write_header(
        &mut out,
        "netwatch_packets_lost_total",
        "datagrams inferred lost from sequence gaps",
        "counter",
    );
    write_header(
        &mut out,
        "netwatch_latency_ms",
        "end-to-end datagram transit latency",
        "histogram",
    );

    let servers = rack.servers.read().await;
    for server in servers.values() {
        let server = server.lock().await;
        let server_id = server.server_id.to_string();
        let label_pairs: Vec<(&str, &str)> =
            vec![("rack_id", rack_label[0].1), ("server_id", server_id.as_str())];
        let label_str = labels(&label_pairs);

        if let Some(err) = server.last_spectral_error {
            write_value(&mut out, "netwatch_server_spectral_error", &label_str, err);
        }
        if let Some(snr) = server.last_snr_db {
            write_value(&mut out, "netwatch_server_snr_db", &label_str, snr);
        }
        write_value(
            &mut out,
            "netwatch_packets_received_total",
            &label_str,
            server.packets_received as f64,
        );
        write_value(
            &mut out,
            "netwatch_packets_lost_total",
            &label_str,
            server.packets_lost as f64,
        );
        server.latency_ms.render("netwatch_latency_ms", &label_str, &mut out);
    }
    drop(servers);

    write_header(
        &mut out,
        "netwatch_decode_errors_total",
        "malformed datagrams dropped at decode time",
        "counter",
    );
    write_value(
        &mut out,
        "netwatch_decode_errors_total",
        &labels(&rack_label),
        rack.decode_errors.load(Ordering::Relaxed) as f64,
    );

    write_header(
        &mut out,
        "netwatch_cross_rack_drops_total",
        "datagrams dropped because they named a different rack",
        "counter",
    );
    write_value(
        &mut out,
        "netwatch_cross_rack_drops_total",
        &labels(&rack_label),
        rack.cross_rack_drops.load(Ordering::Relaxed) as f64,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering as AtomicOrdering;

    #[tokio::test]
    async fn renders_rack_health_score() {
        let rack = RackState::new(7);
        *rack.health_score.write().await = 0.42;
        let out = render(&rack).await;
        assert!(out.contains("netwatch_rack_health_score{rack_id=\"7\"} 0.42"));
    }

    #[tokio::test]
    async fn renders_debug_counters() {
        let rack = RackState::new(0);
        rack.decode_errors.fetch_add(3, AtomicOrdering::Relaxed);
        rack.cross_rack_drops.fetch_add(1, AtomicOrdering::Relaxed);
        let out = render(&rack).await;
        assert!(out.contains("netwatch_decode_errors_total{rack_id=\"0\"} 3"));
        assert!(out.contains("netwatch_cross_rack_drops_total{rack_id=\"0\"} 1"));
    }

    #[tokio::test]
    async fn renders_per_server_series() {
        let rack = RackState::new(0);
        let server = rack.server_or_insert(2).await;
        {
            let mut s = server.lock().await;
            s.packets_received = 10;
            s.packets_lost = 1;
            s.last_spectral_error = Some(0.05);
            s.last_snr_db = Some(20.0);
        }
        let out = render(&rack).await;
        assert!(out.contains("netwatch_server_spectral_error{rack_id=\"0\",server_id=\"2\"} 0.05"));
        assert!(out.contains("netwatch_packets_received_total{rack_id=\"0\",server_id=\"2\"} 10"));
    }
}
