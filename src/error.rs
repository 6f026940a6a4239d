// src/error.rs
// Error types shared across the arena server

use thiserror::Error;

/// A client sent something the server cannot accept in its current state.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error("frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },
    #[error("connection closed in the middle of a frame")]
    TruncatedFrame,
    #[error("unexpected '{kind}' while {state}")]
    UnexpectedMessage { kind: &'static str, state: &'static str },
    #[error("invalid display name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive contents could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid result entry: {0}")]
    InvalidEntry(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArbiterError {
    #[error("session is not enrolled in this round")]
    NotEnrolled,
    #[error("session already reported its tally")]
    AlreadyFinished,
    #[error("round is already resolved")]
    RoundClosed,
    #[error("round was dropped before a verdict was reached")]
    Abandoned,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session is already waiting for a round")]
    AlreadyWaiting,
    #[error("waiting pool dropped the seat")]
    Dissolved,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Failures while bringing the server up
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}

/// Everything that can end a client session. Archive failures are absent on
/// purpose: they are logged where they happen and the session carries on.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("round arbitration failed: {0}")]
    Arbiter(#[from] ArbiterError),
    #[error("matchmaking failed: {0}")]
    Registry(#[from] RegistryError),
}

impl SessionError {
    /// Transport failures are expected churn; everything else is worth a louder log line.
    pub fn is_transport(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}
