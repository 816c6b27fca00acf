//! Rack Controller in-memory state.
//!
//! One [`RackState`] per process. Servers are discovered on first datagram,
//! so the outer map only needs a write lock at insertion time; everything
//! else touches a per-server [`Mutex`] so one slow analysis pass never
//! blocks ingestion of another server's datagrams.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use netwatch_common::Histogram;
use tokio::sync::{Mutex, RwLock};

/// How many recent wave samples a server keeps for the next analysis pass.
/// Sized to hold at least 2 seconds at the nominal 20 Hz sample rate.
pub const SAMPLE_BUFFER_CAP: usize = 128;

#[derive(Debug)]
pub struct ServerState {
    pub server_id: u32,
    pub samples: VecDeque<f64>,
    pub last_seq: Option<u64>,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub latency_ms: Histogram,
    pub last_spectral_error: Option<f64>,
    pub last_snr_db: Option<f64>,
    pub last_seen: Option<Instant>,
}

impl ServerState {
    pub fn new(server_id: u32) -> Self {
        ServerState {
            server_id,
            samples: VecDeque::with_capacity(SAMPLE_BUFFER_CAP),
            last_seq: None,
            packets_received: 0,
            packets_lost: 0,
            latency_ms: Histogram::latency_ms(),
            last_spectral_error: None,
            last_snr_db: None,
            last_seen: None,
        }
    }

    /// Append a sample, evicting the oldest once the buffer is full.
    pub fn push_sample(&mut self, value: f64) {
        if self.samples.len() == SAMPLE_BUFFER_CAP {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Credit a loss only when a gap is observed (`seq > last_seq + 1`).
    /// Reordered or reset sequence numbers are not losses, and `last_seq`
    /// only ever moves forward: a late-arriving lower `seq` must not erase
    /// the high-water mark, or the next forward gap would be double-counted
    /// against it.
    pub fn account_sequence(&mut self, seq: u64) {
        match self.last_seq {
            Some(last) if seq > last + 1 => {
                self.packets_lost += seq - last - 1;
                self.last_seq = Some(seq);
            }
            Some(last) => {
                self.last_seq = Some(last.max(seq));
            }
            None => {
                self.last_seq = Some(seq);
            }
        }
    }
}

pub type ServerMap = HashMap<u32, Arc<Mutex<ServerState>>>;

#[derive(Debug)]
pub struct RackState {
    pub rack_id: u32,
    pub servers: RwLock<ServerMap>,
    pub health_score: RwLock<f64>,
    pub decode_errors: std::sync::atomic::AtomicU64,
    pub cross_rack_drops: std::sync::atomic::AtomicU64,
}

impl RackState {
    pub fn new(rack_id: u32) -> Self {
        RackState {
            rack_id,
            servers: RwLock::new(HashMap::new()),
            health_score: RwLock::new(1.0),
            decode_errors: std::sync::atomic::AtomicU64::new(0),
            cross_rack_drops: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Fetch the server's state, inserting a fresh entry if this is its
    /// first datagram. Takes the write lock only on the miss path.
    pub async fn server_or_insert(&self, server_id: u32) -> Arc<Mutex<ServerState>> {
        if let Some(s) = self.servers.read().await.get(&server_id) {
            return s.clone();
        }
        let mut servers = self.servers.write().await;
        servers
            .entry(server_id)
            .or_insert_with(|| Arc::new(Mutex::new(ServerState::new(server_id))))
            .clone()
    }
}
