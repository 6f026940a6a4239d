// src/session.rs
// Per-connection player state. A session is owned by exactly one dispatcher
// task; nothing else reads or advances its piece cursor.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::defs::{MAX_LOGIN_LENGTH, MIN_LOGIN_LENGTH};
use crate::error::ProtocolError;
use crate::piece::Piece;
use crate::piece_source::PieceSource;
use crate::room::Room;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// Allocate a process-unique session id
    pub fn next() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a player reports when its round ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub moves_done: u32,
    pub elapsed_seconds: u64,
}

pub struct PlayerSession {
    id: SessionId,
    name: Option<String>,
    next_piece_index: u64,
    round_moves_done: Option<u32>,
    round_elapsed_seconds: Option<u64>,
    unexpectedly_disconnected: bool,
    room: Option<Arc<Room>>,
}

impl PlayerSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            name: None,
            next_piece_index: 0,
            round_moves_done: None,
            round_elapsed_seconds: None,
            unexpectedly_disconnected: false,
            room: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the display name after validating it
    pub fn set_name(&mut self, name: &str) -> Result<(), ProtocolError> {
        self.name = Some(validate_name(name)?);
        Ok(())
    }

    pub fn next_piece_index(&self) -> u64 {
        self.next_piece_index
    }

    /// Hand out the piece under the cursor and advance it by one
    pub fn take_next_piece(&mut self, source: &PieceSource) -> Arc<Piece> {
        let piece = source.take(self.next_piece_index);
        self.next_piece_index += 1;
        piece
    }

    /// Attach the session to a freshly formed room. The cursor jumps forward to
    /// the room's first piece so both players draw the same sequence.
    pub fn enter_round(&mut self, room: Arc<Room>) {
        self.next_piece_index = self.next_piece_index.max(room.first_piece_index());
        self.round_moves_done = None;
        self.round_elapsed_seconds = None;
        self.room = Some(room);
    }

    pub fn room(&self) -> Option<&Arc<Room>> {
        self.room.as_ref()
    }

    pub fn in_round(&self) -> bool {
        self.room.is_some()
    }

    pub fn has_finished_round(&self) -> bool {
        self.round_moves_done.is_some()
    }

    /// Record the final tally; only the first report of a round sticks
    pub fn record_tally(&mut self, tally: Tally) -> bool {
        if self.round_moves_done.is_some() {
            return false;
        }
        self.round_moves_done = Some(tally.moves_done);
        self.round_elapsed_seconds = Some(tally.elapsed_seconds);
        true
    }

    pub fn round_moves_done(&self) -> Option<u32> {
        self.round_moves_done
    }

    pub fn round_elapsed_seconds(&self) -> Option<u64> {
        self.round_elapsed_seconds
    }

    /// Detach the session from its room. Returns the room only once, however
    /// many times it is called, so teardown runs its cleanup exactly once.
    pub fn leave_round(&mut self) -> Option<Arc<Room>> {
        self.room.take()
    }

    /// Teardown path for a connection that dropped without exiting. Flags the
    /// session once and reports the disappearance to its room's arbiter.
    /// Returns the room when this counted as a mid-round forfeit.
    pub fn mark_unexpectedly_disconnected(&mut self) -> Option<Arc<Room>> {
        if self.unexpectedly_disconnected {
            return None;
        }
        self.unexpectedly_disconnected = true;
        let room = self.leave_round()?;
        room.report_disconnect(self.id).then_some(room)
    }

    #[cfg(test)]
    pub fn unexpectedly_disconnected(&self) -> bool {
        self.unexpectedly_disconnected
    }
}

/// Trim and bound-check a display name
pub fn validate_name(name: &str) -> Result<String, ProtocolError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length < MIN_LOGIN_LENGTH || length > MAX_LOGIN_LENGTH {
        return Err(ProtocolError::InvalidName(format!(
            "length must be between {MIN_LOGIN_LENGTH} and {MAX_LOGIN_LENGTH} characters, got {length}"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ProtocolError::InvalidName("control characters are not allowed".to_string()));
    }
    Ok(trimmed.to_string())
}
