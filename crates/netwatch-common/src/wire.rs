use std::collections::HashMap;
use std::fmt;

use crate::error::NetWatchError;

/// Split a `key=value;key=value` record into a lookup table.
///
/// Shared by [`SampleDatagram`] and [`RackReport`] — both tiers use the same
/// compact textual encoding so the Rack Controller's hot UDP path doesn't
/// need a JSON parser for a five-field record.
fn parse_kv(record: &str) -> HashMap<&str, &str> {
    record
        .trim()
        .split(';')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

fn field<'a>(
    kv: &HashMap<&'a str, &'a str>,
    key: &str,
    record: &str,
) -> Result<&'a str, NetWatchError> {
    kv.get(key)
        .copied()
        .ok_or_else(|| NetWatchError::Decode(format!("missing field `{key}` in `{record}`")))
}

fn parse_field<T: std::str::FromStr>(
    kv: &HashMap<&str, &str>,
    key: &str,
    record: &str,
) -> Result<T, NetWatchError> {
    field(kv, key, record)?
        .parse::<T>()
        .map_err(|_| NetWatchError::Decode(format!("invalid `{key}` in `{record}`")))
}

/// One datagram emitted by a Server Agent and consumed by a Rack Controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleDatagram {
    pub rack_id: u32,
    pub server_id: u32,
    pub seq: u64,
    pub sent_ts: f64,
    pub wave_sample: f64,
}

impl SampleDatagram {
    pub fn encode(&self) -> String {
        format!(
            "rack_id={};server_id={};seq={};sent_ts={};wave_sample={}",
            self.rack_id, self.server_id, self.seq, self.sent_ts, self.wave_sample
        )
    }

    pub fn decode(record: &str) -> Result<Self, NetWatchError> {
        let kv = parse_kv(record);
        Ok(SampleDatagram {
            rack_id: parse_field(&kv, "rack_id", record)?,
            server_id: parse_field(&kv, "server_id", record)?,
            seq: parse_field(&kv, "seq", record)?,
            sent_ts: parse_field(&kv, "sent_ts", record)?,
            wave_sample: parse_field(&kv, "wave_sample", record)?,
        })
    }
}

impl fmt::Display for SampleDatagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// One rack-health summary sent by a Rack Controller to the DC Controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RackReport {
    pub rack_id: u32,
    pub health_score: f64,
    pub server_count: u32,
    pub timestamp: f64,
}

impl RackReport {
    /// Encode as a single `\n`-terminated line, per the line-oriented TCP
    /// framing described in the external interface spec.
    pub fn encode_line(&self) -> String {
        format!(
            "rack_id={};health_score={};server_count={};timestamp={}\n",
            self.rack_id, self.health_score, self.server_count, self.timestamp
        )
    }

    pub fn decode(record: &str) -> Result<Self, NetWatchError> {
        let kv = parse_kv(record);
        Ok(RackReport {
            rack_id: parse_field(&kv, "rack_id", record)?,
            health_score: parse_field(&kv, "health_score", record)?,
            server_count: parse_field(&kv, "server_count", record)?,
            timestamp: parse_field(&kv, "timestamp", record)?,
        })
    }
}
