// src/client.rs
// Async client for the arena protocol, used by the bot and by the tests.

use std::io;

use chrono::{DateTime, Utc};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::arbiter::Outcome;
use crate::archive::ResultEntry;
use crate::error::{ProtocolError, SessionError};
use crate::piece::Piece;
use crate::protocol::{ClientMessage, MessageReader, MessageWriter, ServerMessage};

/// What the server told us when a round started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub opponent: Option<String>,
    pub time_limit_seconds: u64,
}

pub struct ArenaClient {
    name: String,
    reader: MessageReader<OwnedReadHalf>,
    writer: MessageWriter<OwnedWriteHalf>,
}

impl ArenaClient {
    /// Connect and introduce ourselves under `name`
    pub async fn connect<A: ToSocketAddrs>(addr: A, name: &str) -> Result<Self, SessionError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            name: name.to_string(),
            reader: MessageReader::new(read_half),
            writer: MessageWriter::new(write_half),
        };
        client.send(&ClientMessage::Name { name: name.to_string() }).await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), SessionError> {
        self.writer.send(message).await
    }

    /// Next message from the server; a closed connection is an error here
    pub async fn receive(&mut self) -> Result<ServerMessage, SessionError> {
        match self.reader.read().await? {
            Some(message) => Ok(message),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "server closed the connection").into()),
        }
    }

    /// Ask for a round and wait until the server seats us
    pub async fn begin(&mut self) -> Result<RoundStart, SessionError> {
        self.send(&ClientMessage::Begin).await?;
        self.wait_round_start().await
    }

    pub async fn wait_round_start(&mut self) -> Result<RoundStart, SessionError> {
        match self.receive().await? {
            ServerMessage::BeginAck { opponent, time_limit_seconds } => Ok(RoundStart {
                opponent,
                time_limit_seconds,
            }),
            other => Err(unexpected(other, "expecting 'begin-ack'")),
        }
    }

    pub async fn figure(&mut self) -> Result<Piece, SessionError> {
        self.send(&ClientMessage::Figure).await?;
        match self.receive().await? {
            ServerMessage::FigureData { index, cells } => Ok(Piece::new(index, cells)),
            other => Err(unexpected(other, "expecting 'figure-data'")),
        }
    }

    /// Report the tally stamped with the current time and wait for the verdict
    pub async fn end(&mut self, moves_done: u32, elapsed_seconds: u64) -> Result<Outcome, SessionError> {
        self.end_at(moves_done, elapsed_seconds, Utc::now()).await
    }

    pub async fn end_at(
        &mut self,
        moves_done: u32,
        elapsed_seconds: u64,
        end_time: DateTime<Utc>,
    ) -> Result<Outcome, SessionError> {
        self.send(&ClientMessage::End { moves_done, elapsed_seconds, end_time }).await?;
        self.wait_outcome().await
    }

    pub async fn wait_outcome(&mut self) -> Result<Outcome, SessionError> {
        match self.receive().await? {
            ServerMessage::Result { outcome } => Ok(outcome),
            other => Err(unexpected(other, "expecting 'result'")),
        }
    }

    /// True once after the opponent dropped out of the current round
    pub async fn opponent_vanished(&mut self) -> Result<bool, SessionError> {
        self.send(&ClientMessage::LivenessQuery).await?;
        match self.receive().await? {
            ServerMessage::LivenessReply { value } => Ok(value),
            other => Err(unexpected(other, "expecting 'liveness-reply'")),
        }
    }

    pub async fn top(&mut self) -> Result<Vec<ResultEntry>, SessionError> {
        self.send(&ClientMessage::Top).await?;
        match self.receive().await? {
            ServerMessage::TopData { entries } => Ok(entries),
            other => Err(unexpected(other, "expecting 'top-data'")),
        }
    }

    /// Leave cleanly; the server closes the connection afterwards
    pub async fn exit(mut self) -> Result<(), SessionError> {
        self.send(&ClientMessage::Exit).await?;
        self.writer.shutdown().await
    }
}

fn unexpected(message: ServerMessage, state: &'static str) -> SessionError {
    ProtocolError::UnexpectedMessage { kind: message.kind(), state }.into()
}
