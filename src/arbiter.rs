// src/arbiter.rs
// Round arbitration: collects each player's final tally and decides the winner,
// including the forfeit path when an opponent drops in the middle of the round.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::ArbiterError;
use crate::room::RoomCapacity;
use crate::session::{SessionId, Tally};

/// Verdict delivered to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "WON")]
    Won,
    #[serde(rename = "LOSE")]
    Lose,
}

impl Outcome {
    fn for_session(winner: SessionId, session: SessionId) -> Self {
        if winner == session { Outcome::Won } else { Outcome::Lose }
    }
}

/// Winner determination progress. Moves forward only; a new round gets a new arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinnerState {
    Undetermined,
    PendingFirstFinisher,
    Resolved(SessionId),
}

// Why a parked first finisher was woken up
#[derive(Debug)]
enum Wake {
    Resolved(SessionId),
    OpponentVanished,
}

struct ArbiterState {
    winner: WinnerState,
    enrolled: Vec<SessionId>,
    tallies: HashMap<SessionId, Tally>,
    finish_order: Vec<SessionId>,
    unexpected_end: bool,
    waiter: Option<(SessionId, oneshot::Sender<Wake>)>,
}

impl ArbiterState {
    fn all_enrolled_finished(&self) -> bool {
        self.enrolled.iter().all(|id| self.tallies.contains_key(id))
    }

    /// Highest moves wins, fewer seconds breaks ties, and a residual tie goes
    /// to whoever finished first.
    fn decide(&self) -> Option<SessionId> {
        let mut best: Option<(SessionId, Tally)> = None;
        for id in &self.finish_order {
            if !self.enrolled.contains(id) {
                continue;
            }
            let Some(&tally) = self.tallies.get(id) else { continue };
            let better = match best {
                None => true,
                Some((_, leader)) => {
                    tally.moves_done > leader.moves_done
                        || (tally.moves_done == leader.moves_done
                            && tally.elapsed_seconds < leader.elapsed_seconds)
                }
            };
            if better {
                best = Some((*id, tally));
            }
        }
        best.map(|(id, _)| id)
    }

    fn resolve(&mut self, winner: SessionId) {
        self.winner = WinnerState::Resolved(winner);
        if let Some((_, waiter)) = self.waiter.take() {
            // a dropped receiver means the waiter's task is gone; nothing to deliver
            let _ = waiter.send(Wake::Resolved(winner));
        }
    }
}

pub struct RoundArbiter {
    capacity: RoomCapacity,
    state: Mutex<ArbiterState>,
}

impl RoundArbiter {
    pub fn new(capacity: RoomCapacity, enrolled: Vec<SessionId>) -> Self {
        Self {
            capacity,
            state: Mutex::new(ArbiterState {
                winner: WinnerState::Undetermined,
                enrolled,
                tallies: HashMap::new(),
                finish_order: Vec::new(),
                unexpected_end: false,
                waiter: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn winner_state(&self) -> WinnerState {
        self.lock().winner
    }

    pub fn unexpected_end(&self) -> bool {
        self.lock().unexpected_end
    }

    #[cfg(test)]
    pub fn tally_of(&self, session: SessionId) -> Option<Tally> {
        self.lock().tallies.get(&session).copied()
    }

    /// Submit a player's final tally and wait for the verdict.
    ///
    /// The first of two finishers is parked until the second one reports or
    /// the opponent disconnects; the second finisher computes the winner and
    /// wakes the first. Solo rounds resolve immediately.
    pub async fn finish(&self, session: SessionId, tally: Tally) -> Result<Outcome, ArbiterError> {
        let parked = {
            let mut state = self.lock();
            if !state.enrolled.contains(&session) {
                return Err(ArbiterError::NotEnrolled);
            }
            if state.tallies.contains_key(&session) {
                return Err(ArbiterError::AlreadyFinished);
            }
            if let WinnerState::Resolved(_) = state.winner {
                return Err(ArbiterError::RoundClosed);
            }
            state.tallies.insert(session, tally);
            state.finish_order.push(session);

            if self.capacity == RoomCapacity::Solo {
                state.resolve(session);
                return Ok(Outcome::Won);
            }

            match state.winner {
                WinnerState::Undetermined => {
                    if state.unexpected_end {
                        // opponent already vanished during play
                        state.unexpected_end = false;
                        state.resolve(session);
                        return Ok(Outcome::Won);
                    }
                    if state.all_enrolled_finished() {
                        // opponent withdrew cleanly before reporting
                        state.resolve(session);
                        return Ok(Outcome::Won);
                    }
                    state.winner = WinnerState::PendingFirstFinisher;
                    let (tx, rx) = oneshot::channel();
                    state.waiter = Some((session, tx));
                    rx
                }
                WinnerState::PendingFirstFinisher => {
                    let winner = state.decide().unwrap_or(session);
                    state.resolve(winner);
                    return Ok(Outcome::for_session(winner, session));
                }
                WinnerState::Resolved(_) => return Err(ArbiterError::RoundClosed),
            }
        };

        match parked.await {
            Ok(Wake::Resolved(winner)) => Ok(Outcome::for_session(winner, session)),
            Ok(Wake::OpponentVanished) => {
                let mut state = self.lock();
                state.unexpected_end = false;
                state.winner = WinnerState::Resolved(session);
                Ok(Outcome::Won)
            }
            Err(_) => Err(ArbiterError::Abandoned),
        }
    }

    /// A member's connection dropped without a clean exit. Raises the
    /// unexpected-end flag when the member had not yet reported its tally and
    /// the round is still open, waking a parked first finisher. Returns
    /// whether the flag was raised.
    pub fn report_disconnect(&self, session: SessionId) -> bool {
        if self.capacity == RoomCapacity::Solo {
            return false;
        }
        let mut state = self.lock();
        if !state.enrolled.contains(&session) || state.tallies.contains_key(&session) {
            return false;
        }
        if let WinnerState::Resolved(_) = state.winner {
            return false;
        }
        state.unexpected_end = true;
        if let Some((_, waiter)) = state.waiter.take() {
            let _ = waiter.send(Wake::OpponentVanished);
        }
        true
    }

    /// A member left cleanly. It drops out of the comparison without raising
    /// the unexpected-end flag; a parked first finisher is released if every
    /// remaining member has now reported.
    pub fn withdraw(&self, session: SessionId) {
        let mut state = self.lock();
        if let WinnerState::Resolved(_) = state.winner {
            return;
        }
        if state.tallies.contains_key(&session) {
            return;
        }
        state.enrolled.retain(|id| *id != session);
        if state.winner == WinnerState::PendingFirstFinisher && state.all_enrolled_finished() {
            if let Some(winner) = state.decide() {
                state.resolve(winner);
            }
        }
    }
}
