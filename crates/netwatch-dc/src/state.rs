//! DC Controller in-memory state: the most recent report from each rack,
//! plus when it arrived.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use netwatch_common::RackReport;
use tokio::sync::RwLock;

/// A rack is excluded from the datacenter health rollup once its last
/// report is older than this.
pub const STALENESS_WINDOW: Duration = Duration::from_secs(30);

pub struct DcState {
    pub dc_id: u32,
    pub reports: RwLock<HashMap<u32, (RackReport, Instant)>>,
}

impl DcState {
    pub fn new(dc_id: u32) -> Self {
        DcState {
            dc_id,
            reports: RwLock::new(HashMap::new()),
        }
    }

    pub async fn record(&self, report: RackReport) {
        self.reports
            .write()
            .await
            .insert(report.rack_id, (report, Instant::now()));
    }

    /// Mean health score across racks that reported within
    /// [`STALENESS_WINDOW`]. Returns `(score, fresh_count, stale_count)`;
    /// `score` is `1.0` when no rack is fresh.
    pub async fn health_rollup(&self) -> (f64, usize, usize) {
        let now = Instant::now();
        let reports = self.reports.read().await;
        let mut fresh_scores = Vec::new();
        let mut stale_count = 0;

        for (report, seen_at) in reports.values() {
            if now.duration_since(*seen_at) <= STALENESS_WINDOW {
                fresh_scores.push(report.health_score);
            } else {
                stale_count += 1;
            }
        }

        let score = if fresh_scores.is_empty() {
            1.0
        } else {
            fresh_scores.iter().sum::<f64>() / fresh_scores.len() as f64
        };

        (score, fresh_scores.len(), stale_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(rack_id: u32, score: f64) -> RackReport {
        RackReport {
            rack_id,
            health_score: score,
            server_count: 4,
            timestamp: 0.0,
        }
    }

    #[tokio::test]
    async fn no_reports_yields_full_health() {
        let dc = DcState::new(0);
        let (score, fresh, stale) = dc.health_rollup().await;
        assert_eq!(score, 1.0);
        assert_eq!(fresh, 0);
        assert_eq!(stale, 0);
    }

    #[tokio::test]
    async fn averages_across_fresh_racks() {
        let dc = DcState::new(0);
        dc.record(report(0, 1.0)).await;
        dc.record(report(1, 0.5)).await;
        let (score, fresh, stale) = dc.health_rollup().await;
        assert_eq!(score, 0.75);
        assert_eq!(fresh, 2);
        assert_eq!(stale, 0);
    }

    #[tokio::test]
    async fn stale_rack_is_excluded_and_counted() {
        let dc = DcState::new(0);
        dc.reports.write().await.insert(
            5,
            (report(5, 0.1), Instant::now() - STALENESS_WINDOW - Duration::from_secs(1)),
        );
        let (score, fresh, stale) = dc.health_rollup().await;
        assert_eq!(score, 1.0);
        assert_eq!(fresh, 0);
        assert_eq!(stale, 1);
    }

    #[tokio::test]
    async fn later_report_overwrites_earlier_one_for_same_rack() {
        let dc = DcState::new(0);
        dc.record(report(2, 0.2)).await;
        dc.record(report(2, 0.9)).await;
        let reports = dc.reports.read().await;
        assert_eq!(reports.get(&2).unwrap().0.health_score, 0.9);
    }
}
