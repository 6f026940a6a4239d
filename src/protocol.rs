// src/protocol.rs
// Wire messages between players and the arena, one JSON object per line.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::arbiter::Outcome;
use crate::archive::ResultEntry;
use crate::defs::{Cells, MAX_FRAME_BYTES};
use crate::error::{ProtocolError, SessionError};
use crate::piece::Piece;

/// Messages a player sends to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientMessage {
    Name {
        name: String,
    },
    Begin,
    Figure,
    End {
        moves_done: u32,
        elapsed_seconds: u64,
        end_time: DateTime<Utc>,
    },
    LivenessQuery,
    Top,
    Exit,
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Name { .. } => "name",
            ClientMessage::Begin => "begin",
            ClientMessage::Figure => "figure",
            ClientMessage::End { .. } => "end",
            ClientMessage::LivenessQuery => "liveness-query",
            ClientMessage::Top => "top",
            ClientMessage::Exit => "exit",
        }
    }
}

/// Messages the server sends back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerMessage {
    BeginAck {
        opponent: Option<String>,
        time_limit_seconds: u64,
    },
    FigureData {
        index: u64,
        cells: Cells,
    },
    Result {
        outcome: Outcome,
    },
    LivenessReply {
        value: bool,
    },
    TopData {
        entries: Vec<ResultEntry>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::BeginAck { .. } => "begin-ack",
            ServerMessage::FigureData { .. } => "figure-data",
            ServerMessage::Result { .. } => "result",
            ServerMessage::LivenessReply { .. } => "liveness-reply",
            ServerMessage::TopData { .. } => "top-data",
        }
    }

    pub fn figure(piece: &Piece) -> Self {
        ServerMessage::FigureData {
            index: piece.index(),
            cells: *piece.cells(),
        }
    }
}

/// Reads newline-delimited JSON frames.
///
/// `read` can be dropped at any await point (for example as a losing
/// `tokio::select!` branch): bytes of a partially received frame stay in the
/// reader and the next call picks up where the last one stopped.
pub struct MessageReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, MAX_FRAME_BYTES)
    }

    pub fn with_limit(inner: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            limit,
        }
    }

    /// Next frame, or `None` once the peer closed the connection between frames
    pub async fn read<M: DeserializeOwned>(&mut self) -> Result<Option<M>, SessionError> {
        loop {
            // one byte of headroom for the terminating newline
            let budget = (self.limit + 1).saturating_sub(self.pending.len()) as u64;
            let read = (&mut self.inner)
                .take(budget)
                .read_until(b'\n', &mut self.pending)
                .await?;

            if self.pending.last() == Some(&b'\n') {
                let frame = std::mem::take(&mut self.pending);
                let line = frame.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                let message = serde_json::from_slice(line).map_err(ProtocolError::from)?;
                return Ok(Some(message));
            }

            if self.pending.len() > self.limit {
                return Err(ProtocolError::FrameTooLong { limit: self.limit }.into());
            }

            if read == 0 {
                if self.pending.trim_ascii().is_empty() {
                    self.pending.clear();
                    return Ok(None);
                }
                return Err(ProtocolError::TruncatedFrame.into());
            }
        }
    }
}

/// Writes one JSON frame per message and flushes it
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn send<M: Serialize>(&mut self, message: &M) -> Result<(), SessionError> {
        let mut frame = serde_json::to_vec(message).map_err(ProtocolError::from)?;
        frame.push(b'\n');
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
