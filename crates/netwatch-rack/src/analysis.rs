//! Periodic analysis pass: turns each server's sample buffer into a
//! spectral error and SNR reading, then rolls those up into a rack health
//! score.

use std::time::{Duration, Instant};

use netwatch_dsp::{analyze, MIN_SAMPLES};
use tracing::debug;

use crate::state::RackState;

/// A server is "fresh" for the purposes of the rack health rollup if it has
/// reported within this window.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(30);

/// Run one analysis pass over every known server, updating each server's
/// last spectral error / SNR and the rack's overall health score.
///
/// Returns the number of servers that contributed a fresh reading.
pub async fn run_pass(rack: &RackState, expected_freq: impl Fn(u32) -> f64, sample_rate_hz: f64) -> usize {
    let now = Instant::now();
    let server_ids: Vec<u32> = rack.servers.read().await.keys().copied().collect();

    let mut fresh_errors = Vec::new();

    for server_id in server_ids {
        let server_arc = rack.server_or_insert(server_id).await;
        let mut server = server_arc.lock().await;

        let is_fresh = server
            .last_seen
            .map(|t| now.duration_since(t) <= FRESHNESS_WINDOW)
            .unwrap_or(false);

        if !is_fresh || server.samples.len() < MIN_SAMPLES {
            continue;
        }

        let samples: Vec<f64> = server.samples.iter().copied().collect();
        let freq = expected_freq(server_id);
        let (spectral_error, snr_db) = analyze(&samples, freq, sample_rate_hz);

        server.last_spectral_error = Some(spectral_error);
        server.last_snr_db = Some(snr_db);
        fresh_errors.push(spectral_error);
    }

    let health_score = if fresh_errors.is_empty() {
        debug!(rack_id = rack.rack_id, "no fresh servers this pass, reporting full health");
        1.0
    } else {
        1.0 - (fresh_errors.iter().sum::<f64>() / fresh_errors.len() as f64)
    };

    *rack.health_score.write().await = health_score;
    fresh_errors.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    async fn seed_server(rack: &RackState, server_id: u32, freq: f64, fs: f64, n: usize) {
        let arc = rack.server_or_insert(server_id).await;
        let mut s = arc.lock().await;
        for i in 0..n {
            let t = i as f64 / fs;
            s.push_sample((2.0 * PI * freq * t).sin());
        }
        s.last_seen = Some(Instant::now());
    }

    #[tokio::test]
    async fn clean_sine_yields_low_health_deficit() {
        let rack = RackState::new(0);
        seed_server(&rack, 1, 2.0, 20.0, 256).await;
        let fresh = run_pass(&rack, |_| 2.0, 20.0).await;
        assert_eq!(fresh, 1);
        let score = *rack.health_score.read().await;
        assert!(score > 0.7, "expected high health score, got {score}");
    }

    #[tokio::test]
    async fn no_fresh_servers_reports_full_health() {
        let rack = RackState::new(0);
        let fresh = run_pass(&rack, |_| 2.0, 20.0).await;
        assert_eq!(fresh, 0);
        assert_eq!(*rack.health_score.read().await, 1.0);
    }

    #[tokio::test]
    async fn stale_server_is_excluded_from_rollup() {
        let rack = RackState::new(0);
        let arc = rack.server_or_insert(3).await;
        {
            let mut s = arc.lock().await;
            for i in 0..64 {
                s.push_sample(i as f64);
            }
            s.last_seen = Some(Instant::now() - FRESHNESS_WINDOW - Duration::from_secs(1));
        }
        let fresh = run_pass(&rack, |_| 2.0, 20.0).await;
        assert_eq!(fresh, 0);
    }

    #[tokio::test]
    async fn sparse_buffer_below_min_samples_is_skipped() {
        let rack = RackState::new(0);
        let arc = rack.server_or_insert(4).await;
        {
            let mut s = arc.lock().await;
            s.push_sample(0.1);
            s.last_seen = Some(Instant::now());
        }
        let fresh = run_pass(&rack, |_| 2.0, 20.0).await;
        assert_eq!(fresh, 0);
    }

    #[tokio::test]
    async fn health_score_averages_across_servers() {
        let rack = RackState::new(0);
        seed_server(&rack, 1, 2.0, 20.0, 256).await;
        // Off-frequency server should score a high spectral error.
        let arc = rack.server_or_insert(2).await;
        {
            let mut s = arc.lock().await;
            for i in 0..256 {
                s.push_sample(if i % 2 == 0 { 1.0 } else { -1.0 });
            }
            s.last_seen = Some(Instant::now());
        }
        let _ = run_pass(&rack, |_| 2.0, 20.0).await;
        let score = *rack.health_score.read().await;
        assert!(score < 1.0);
    }
}
