// src/registry.rs
// Matchmaking: sessions that sent "begin" wait here until enough players are
// present to seat a room, or until they cancel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::oneshot;

use crate::error::RegistryError;
use crate::logging::log_info;
use crate::piece_source::PieceSource;
use crate::room::{Member, Room, RoomCapacity};
use crate::session::SessionId;

struct Candidate {
    member: Member,
    seat: oneshot::Sender<Arc<Room>>,
}

/// Waiting pool and bookkeeping of the rooms it has formed
pub struct MatchRegistry {
    capacity: RoomCapacity,
    round_seconds: u64,
    pieces: Arc<PieceSource>,
    forming: Mutex<Vec<Candidate>>,
    rooms: Mutex<Vec<Weak<Room>>>,
}

impl MatchRegistry {
    pub fn new(capacity: RoomCapacity, round_seconds: u64, pieces: Arc<PieceSource>) -> Self {
        Self {
            capacity,
            round_seconds,
            pieces,
            forming: Mutex::new(Vec::new()),
            rooms: Mutex::new(Vec::new()),
        }
    }

    pub fn capacity(&self) -> RoomCapacity {
        self.capacity
    }

    pub fn round_seconds(&self) -> u64 {
        self.round_seconds
    }

    fn forming(&self) -> MutexGuard<'_, Vec<Candidate>> {
        self.forming.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter the waiting pool. The returned ticket resolves once a room with
    /// this session in it has been seated. When this join fills the pool the
    /// room is formed right here and every waiter is released at once.
    pub fn join(self: &Arc<Self>, session: SessionId, name: &str) -> Result<Ticket, RegistryError> {
        let (seat, receiver) = oneshot::channel();
        let mut forming = self.forming();
        // tickets dropped without cancelling leave closed seats behind
        forming.retain(|candidate| !candidate.seat.is_closed());
        if forming.iter().any(|candidate| candidate.member.id == session) {
            return Err(RegistryError::AlreadyWaiting);
        }
        forming.push(Candidate {
            member: Member { id: session, name: name.to_string() },
            seat,
        });

        if forming.len() >= self.capacity.seats() {
            let seated: Vec<Candidate> = forming.drain(..self.capacity.seats()).collect();
            self.seat_room(seated);
        }

        Ok(Ticket {
            session,
            registry: Arc::clone(self),
            receiver,
            settled: false,
        })
    }

    fn seat_room(&self, seated: Vec<Candidate>) {
        let members = seated.iter().map(|candidate| candidate.member.clone()).collect();
        let room = Arc::new(Room::new(
            self.capacity,
            self.round_seconds,
            self.pieces.len(),
            members,
        ));
        log_info(&format!("Seated {}", room.room_info()));

        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.retain(|entry| entry.strong_count() > 0);
        rooms.push(Arc::downgrade(&room));
        drop(rooms);
        for candidate in seated {
            // a closed seat is handled by that ticket's own drop
            let _ = candidate.seat.send(Arc::clone(&room));
        }
    }

    /// Remove a session from the waiting pool. Returns false when it was not
    /// waiting, which includes having just been seated.
    pub fn cancel(&self, session: SessionId) -> bool {
        let mut forming = self.forming();
        let before = forming.len();
        forming.retain(|candidate| candidate.member.id != session);
        forming.len() != before
    }

    pub fn waiting_count(&self) -> usize {
        let mut forming = self.forming();
        forming.retain(|candidate| !candidate.seat.is_closed());
        forming.len()
    }

    /// Rooms that still have at least one member holding on to them
    pub fn active_rooms(&self) -> Vec<Arc<Room>> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.retain(|room| room.strong_count() > 0);
        rooms.iter().filter_map(Weak::upgrade).collect()
    }
}

/// A pending seat in the registry
pub struct Ticket {
    session: SessionId,
    registry: Arc<MatchRegistry>,
    receiver: oneshot::Receiver<Arc<Room>>,
    settled: bool,
}

impl Ticket {
    /// Wait until the room is seated. Safe to race against other events in
    /// `tokio::select!`; a lost race leaves the ticket intact.
    pub async fn seated(&mut self) -> Result<Arc<Room>, RegistryError> {
        let result = (&mut self.receiver).await;
        self.settled = true;
        result.map_err(|_| RegistryError::Dissolved)
    }

    /// Give up waiting. If the room was seated in the meantime it is returned
    /// and the caller is a member of it after all.
    pub fn cancel(mut self) -> Option<Arc<Room>> {
        self.settled = true;
        if self.registry.cancel(self.session) {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.settled || self.registry.cancel(self.session) {
            return;
        }
        // seated just before being dropped: leave the room as a disconnect
        if let Ok(room) = self.receiver.try_recv() {
            room.report_disconnect(self.session);
        }
    }
}
