//! `/metrics` HTTP endpoint: the datacenter health score plus every rack's
//! last-reported health, republished under this tier's namespace.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use netwatch_common::metrics::{labels, write_header, write_value};

use crate::state::DcState;

pub fn router(dc: Arc<DcState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(dc)
}

async fn metrics_handler(State(dc): State<Arc<DcState>>) -> impl IntoResponse {
    let body = render(&dc).await;
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}

async fn render(dc: &DcState) -> String {
    let mut out = String::new();
    let dc_id = dc.dc_id.to_string();

    write_header(
        &mut out,
        "netwatch_dc_health_score",
        "aggregate health score across fresh racks, in [0, 1]",
        "gauge",
    );
    let (score, _fresh, _stale) = dc.health_rollup().await;
    write_value(
        &mut out,
        "netwatch_dc_health_score",
        &labels(&[("dc_id", dc_id.as_str())]),
        score,
    );

    write_header(
        &mut out,
        "netwatch_rack_health_score",
        "most recently reported health score for a rack, as seen by this DC controller",
        "gauge",
    );
    let reports = dc.reports.read().await;
    for (rack_id, (report, _seen_at)) in reports.iter() {
        let rack_id_str = rack_id.to_string();
        write_value(
            &mut out,
            "netwatch_rack_health_score",
            &labels(&[("rack_id", rack_id_str.as_str())]),
            report.health_score,
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwatch_common::RackReport;

    #[tokio::test]
    async fn renders_dc_and_rack_scores() {
        let dc = DcState::new(3);
        dc.record(RackReport {
            rack_id: 1,
            health_score: 0.75,
            server_count: 2,
            timestamp: 0.0,
        })
        .await;
        let out = render(&dc).await;
        assert!(out.contains("netwatch_dc_health_score{dc_id=\"3\"} 0.75"));
        assert!(out.contains("netwatch_rack_health_score{rack_id=\"1\"} 0.75"));
    }

    #[tokio::test]
    async fn empty_state_reports_full_health() {
        let dc = DcState::new(0);
        let out = render(&dc).await;
        assert!(out.contains("netwatch_dc_health_score{dc_id=\"0\"} 1"));
    }
}
