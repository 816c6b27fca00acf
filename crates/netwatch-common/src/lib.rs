//! Shared plumbing for the three NetWatch binaries: wire encoding, error
//! types, latency histograms, and Prometheus text rendering.
//!
//! Nothing in this crate touches sockets or the clock — it's the part of
//! the stack every tier agrees on.

pub mod cli;
pub mod config;
pub mod error;
pub mod histogram;
pub mod metrics;
pub mod wire;

pub use error::NetWatchError;
pub use histogram::{Histogram, LATENCY_BUCKETS_MS};
pub use wire::{RackReport, SampleDatagram};
