//! Spectral health analysis core for NetWatch.
//!
//! Pure functions only — no sockets, no async, no clocks. The Rack
//! Controller calls [`analyze`] against each server's rolling sample
//! buffer and [`classify`] against the resulting spectral error.
//!
//! - [`analysis`] — Hann-windowed real FFT, SNR and spectral-error scoring
//! - [`health`] — threshold-based health classification
//! - [`window`] — window functions

mod analysis;
mod health;
mod window;

pub use analysis::{analyze, MIN_SAMPLES};
pub use health::{classify, HealthClass};
pub use window::hann;
