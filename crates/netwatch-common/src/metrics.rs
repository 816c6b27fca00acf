//! Minimal Prometheus text-exposition-format helpers.
//!
//! NetWatch doesn't pull in the `prometheus` crate: each tier only ever
//! renders a handful of gauges, counters and one histogram, and rendering
//! fresh on every scrape keeps the registry implicit rather than a second
//! source of truth to keep in sync with the state map.

use std::fmt::Write as _;

/// Write a `# HELP` / `# TYPE` header pair. Call once per metric name before
/// its value lines.
pub fn write_header(out: &mut String, name: &str, help: &str, metric_type: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {metric_type}");
}

/// Write a single gauge or counter sample line, with optional label set.
///
/// `labels` is a pre-joined `key="value",key="value"` fragment, or empty for
/// an unlabeled series.
pub fn write_value(out: &mut String, name: &str, labels: &str, value: f64) {
    if labels.is_empty() {
        let _ = writeln!(out, "{name} {value}");
    } else {
        let _ = writeln!(out, "{name}{{{labels}}} {value}");
    }
}

/// Build a `key="value",key="value"` label fragment from ordered pairs.
pub fn labels(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_format() {
        let mut out = String::new();
        write_header(&mut out, "netwatch_rack_health_score", "rack health", "gauge");
        assert_eq!(
            out,
            "# HELP netwatch_rack_health_score rack health\n# TYPE netwatch_rack_health_score gauge\n"
        );
    }

    #[test]
    fn value_without_labels() {
        let mut out = String::new();
        write_value(&mut out, "netwatch_dc_health_score", "", 0.87);
        assert_eq!(out, "netwatch_dc_health_score 0.87\n");
    }

    #[test]
    fn value_with_labels() {
        let mut out = String::new();
        write_value(
            &mut out,
            "netwatch_server_spectral_error",
            &labels(&[("rack_id", "1"), ("server_id", "3")]),
            0.05,
        );
        assert_eq!(
            out,
            "netwatch_server_spectral_error{rack_id=\"1\",server_id=\"3\"} 0.05\n"
        );
    }

    #[test]
    fn labels_join_in_order() {
        assert_eq!(labels(&[("a", "1"), ("b", "2")]), "a=\"1\",b=\"2\"");
        assert_eq!(labels(&[]), "");
    }
}
