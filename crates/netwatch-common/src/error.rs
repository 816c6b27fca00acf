use thiserror::Error;

/// Failure modes shared across the three NetWatch binaries.
#[derive(Debug, Error)]
pub enum NetWatchError {
    #[error("malformed record: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("datagram for rack {got}, this controller serves rack {expected}")]
    CrossRackDatagram { got: u32, expected: u32 },
}
