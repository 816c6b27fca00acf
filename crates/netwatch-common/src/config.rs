//! Shared defaults for values that depend on more than one CLI flag.
//!
//! `clap`'s `env` derive covers plain env-var-with-default fields in each
//! binary's own config struct; the handful of defaults that are *computed*
//! from another field (a rack's listen port derived from its id) live here
//! so all three binaries agree on the formula.

/// Default UDP listen port for a Rack Controller, derived from its rack id.
pub fn default_udp_listen_port(rack_id: u32) -> u16 {
    9999u32.saturating_add(rack_id) as u16
}

/// Default metrics HTTP port for a Rack Controller, derived from its rack id.
pub fn default_rack_metrics_port(rack_id: u32) -> u16 {
    8000u32.saturating_add(rack_id) as u16
}

/// Default metrics HTTP port for the (singleton) DC Controller.
pub const DEFAULT_DC_METRICS_PORT: u16 = 8100;

/// Default TCP port the DC Controller listens on, and the default port
/// every Rack Controller reports to.
pub const DEFAULT_DC_PORT: u16 = 9990;
