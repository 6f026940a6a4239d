// src/room.rs
// A room is the group of sessions playing one round together. It is formed by
// the match registry once enough players are waiting, owns the round's
// arbiter and is dropped when its last member lets go of it.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arbiter::{Outcome, RoundArbiter, WinnerState};
use crate::error::ArbiterError;
use crate::session::{SessionId, Tally};

/// How many players a room seats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RoomCapacity {
    Solo = 1,
    Duel = 2,
}

impl RoomCapacity {
    pub fn seats(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for RoomCapacity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(RoomCapacity::Solo),
            2 => Ok(RoomCapacity::Duel),
            other => Err(format!("room capacity must be 1 or 2, got {other}")),
        }
    }
}

impl From<RoomCapacity> for u8 {
    fn from(capacity: RoomCapacity) -> Self {
        capacity as u8
    }
}

impl fmt::Display for RoomCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seats())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: SessionId,
    pub name: String,
}

pub struct Room {
    id: String,
    created_at: SystemTime,
    capacity: RoomCapacity,
    time_limit_seconds: u64,
    first_piece_index: u64,
    members: Vec<Member>,
    arbiter: RoundArbiter,
    // members still owed a "your opponent vanished" liveness answer
    vanished_notices: Mutex<HashSet<SessionId>>,
}

impl Room {
    pub fn new(
        capacity: RoomCapacity,
        time_limit_seconds: u64,
        first_piece_index: u64,
        members: Vec<Member>,
    ) -> Self {
        let mut rng = rand::rng();
        let id = format!("room_{:08x}", rng.random::<u32>());
        let arbiter = RoundArbiter::new(capacity, members.iter().map(|m| m.id).collect());

        Self {
            id,
            created_at: SystemTime::now(),
            capacity,
            time_limit_seconds,
            first_piece_index,
            members,
            arbiter,
            vanished_notices: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> RoomCapacity {
        self.capacity
    }

    pub fn time_limit_seconds(&self) -> u64 {
        self.time_limit_seconds
    }

    pub fn first_piece_index(&self) -> u64 {
        self.first_piece_index
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    #[cfg(test)]
    pub fn is_member(&self, session: SessionId) -> bool {
        self.members.iter().any(|m| m.id == session)
    }

    /// Name of the first other member in join order, `None` when playing alone
    pub fn opponent_of(&self, session: SessionId) -> Option<&str> {
        self.members
            .iter()
            .find(|m| m.id != session)
            .map(|m| m.name.as_str())
    }

    pub fn winner_state(&self) -> WinnerState {
        self.arbiter.winner_state()
    }

    pub fn unexpected_end(&self) -> bool {
        self.arbiter.unexpected_end()
    }

    pub async fn finish(&self, session: SessionId, tally: Tally) -> Result<Outcome, ArbiterError> {
        self.arbiter.finish(session, tally).await
    }

    /// Teardown path for a member whose connection dropped. When it counts as
    /// a mid-round disappearance, every other member gets one liveness notice.
    pub fn report_disconnect(&self, session: SessionId) -> bool {
        if !self.arbiter.report_disconnect(session) {
            return false;
        }
        let mut notices = self.notices();
        for member in self.members.iter().filter(|m| m.id != session) {
            notices.insert(member.id);
        }
        true
    }

    pub fn withdraw(&self, session: SessionId) {
        self.arbiter.withdraw(session);
    }

    /// Answer a liveness poll: true exactly once per opponent disappearance
    pub fn take_vanished_notice(&self, session: SessionId) -> bool {
        self.notices().remove(&session)
    }

    fn notices(&self) -> MutexGuard<'_, HashSet<SessionId>> {
        self.vanished_notices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn created_at_string(&self) -> String {
        let created_at: DateTime<Utc> = self.created_at.into();
        created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    /// Room information as a formatted string for logging
    pub fn room_info(&self) -> String {
        let names: Vec<&str> = self.members.iter().map(|m| m.name.as_str()).collect();
        format!(
            "Room[id={}, created={}, capacity={}, players={:?}, first_piece={}, time_limit={}s]",
            self.id,
            self.created_at_string(),
            self.capacity,
            names,
            self.first_piece_index,
            self.time_limit_seconds
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64, name: &str) -> Member {
        Member { id: SessionId(id), name: name.to_string() }
    }

    fn duel_room() -> Room {
        Room::new(RoomCapacity::Duel, 90, 15, vec![member(1, "ann"), member(2, "bob")])
    }

    #[test]
    fn test_capacity_conversion() {
        assert_eq!(RoomCapacity::try_from(1), Ok(RoomCapacity::Solo));
        assert_eq!(RoomCapacity::try_from(2), Ok(RoomCapacity::Duel));
        assert!(RoomCapacity::try_from(0).is_err());
        assert!(RoomCapacity::try_from(3).is_err());
        assert_eq!(RoomCapacity::Duel.seats(), 2);
        assert_eq!(u8::from(RoomCapacity::Solo), 1);
    }

    #[test]
    fn test_room_creation() {
        let room = duel_room();
        assert!(room.id().starts_with("room_"));
        assert_eq!(room.id().len(), 13);
        assert_eq!(room.first_piece_index(), 15);
        assert_eq!(room.time_limit_seconds(), 90);
        assert_eq!(room.winner_state(), WinnerState::Undetermined);
        assert!(room.is_member(SessionId(2)));
        assert!(!room.is_member(SessionId(3)));
        assert!(room.created_at_string().contains("UTC"));
    }

    #[test]
    fn test_opponent_naming() {
        let room = duel_room();
        assert_eq!(room.opponent_of(SessionId(1)), Some("bob"));
        assert_eq!(room.opponent_of(SessionId(2)), Some("ann"));

        let solo = Room::new(RoomCapacity::Solo, 60, 0, vec![member(9, "zed")]);
        assert_eq!(solo.opponent_of(SessionId(9)), None);
    }

    #[test]
    fn test_vanished_notice_delivered_once() {
        let room = duel_room();
        assert!(!room.take_vanished_notice(SessionId(1)));

        assert!(room.report_disconnect(SessionId(2)));
        assert!(room.unexpected_end());
        assert!(room.take_vanished_notice(SessionId(1)));
        assert!(!room.take_vanished_notice(SessionId(1)));
        // the one who vanished is never told about itself
        assert!(!room.take_vanished_notice(SessionId(2)));
    }

    #[test]
    fn test_clean_withdraw_sends_no_notice() {
        let room = duel_room();
        room.withdraw(SessionId(2));
        assert!(!room.unexpected_end());
        assert!(!room.take_vanished_notice(SessionId(1)));
    }

    #[tokio::test]
    async fn test_liveness_poll_does_not_consume_arbiter_flag() {
        let room = duel_room();
        room.report_disconnect(SessionId(2));
        assert!(room.take_vanished_notice(SessionId(1)));
        assert!(room.unexpected_end());

        let outcome = room
            .finish(SessionId(1), Tally { moves_done: 0, elapsed_seconds: 3 })
            .await;
        assert_eq!(outcome, Ok(Outcome::Won));
        assert!(!room.unexpected_end());
    }

    #[test]
    fn test_room_info() {
        let room = duel_room();
        let info = room.room_info();
        assert!(info.contains("Room[id=room_"));
        assert!(info.contains("capacity=2"));
        assert!(info.contains("\"ann\""));
        assert!(info.contains("first_piece=15"));
    }
}
