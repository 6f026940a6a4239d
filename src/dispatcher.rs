// src/dispatcher.rs
// Per-connection worker: handshake, command routing and teardown.
//
// Each accepted connection runs `serve_connection` in its own task. The task
// owns its PlayerSession outright; shared state is reached only through the
// registry, the piece source, the room and the archive.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use crate::archive::{ResultArchive, ResultEntry};
use crate::config::ServerConfig;
use crate::error::{ProtocolError, RegistryError, SessionError};
use crate::logging::{LogLevel, log_error, log_session};
use crate::piece_source::PieceSource;
use crate::protocol::{ClientMessage, MessageReader, MessageWriter, ServerMessage};
use crate::registry::MatchRegistry;
use crate::room::{Room, RoomCapacity};
use crate::session::{PlayerSession, SessionId, Tally};

/// Everything the connection workers share
pub struct ArenaState {
    pub registry: Arc<MatchRegistry>,
    pub pieces: Arc<PieceSource>,
    pub archive: Arc<dyn ResultArchive>,
    pub top_count: usize,
    connections: AtomicUsize,
}

impl ArenaState {
    pub fn new(config: &ServerConfig, archive: Arc<dyn ResultArchive>) -> Self {
        Self::with_rules(config.players, config.round_seconds, config.top_count, archive)
    }

    pub fn with_rules(
        capacity: RoomCapacity,
        round_seconds: u64,
        top_count: usize,
        archive: Arc<dyn ResultArchive>,
    ) -> Self {
        let pieces = Arc::new(PieceSource::new());
        Self {
            registry: Arc::new(MatchRegistry::new(capacity, round_seconds, Arc::clone(&pieces))),
            pieces,
            archive,
            top_count,
            connections: AtomicUsize::new(0),
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Reserve a connection slot, or `None` when `max` are already in use
    pub fn try_admit(self: &Arc<Self>, max: usize) -> Option<ConnectionSlot> {
        self.connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| (live < max).then_some(live + 1))
            .ok()
            .map(|_| ConnectionSlot { state: Arc::clone(self) })
    }

    /// Leaderboard lookup off the async threads. Failures are logged and
    /// answered with an empty board.
    pub async fn leaderboard(&self) -> Vec<ResultEntry> {
        let archive = Arc::clone(&self.archive);
        let count = self.top_count;
        match tokio::task::spawn_blocking(move || archive.top_results(count)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                log_error(&format!("Leaderboard unavailable: {e}"));
                Vec::new()
            }
            Err(e) => {
                log_error(&format!("Leaderboard lookup panicked: {e}"));
                Vec::new()
            }
        }
    }

    async fn archive_result(&self, entry: ResultEntry) {
        let archive = Arc::clone(&self.archive);
        match tokio::task::spawn_blocking(move || archive.record_result(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log_error(&format!("Result not archived: {e}")),
            Err(e) => log_error(&format!("Archive write panicked: {e}")),
        }
    }
}

/// A live connection counted against the cap; released on drop
pub struct ConnectionSlot {
    state: Arc<ArenaState>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.state.connections.fetch_sub(1, Ordering::AcqRel);
    }
}

enum Flow {
    Continue,
    Exit,
    Closed,
}

// What ended a wait in the registry
enum Wait {
    Seated(Result<Arc<Room>, RegistryError>),
    Interrupted(Result<Option<ClientMessage>, SessionError>),
}

struct Connection<S> {
    state: Arc<ArenaState>,
    session: PlayerSession,
    reader: MessageReader<ReadHalf<S>>,
    writer: MessageWriter<WriteHalf<S>>,
    // a message that arrived while waiting for a room, handled next
    deferred: Option<ClientMessage>,
    exited: bool,
}

/// Serve one player until it exits, disconnects or breaks the protocol
pub async fn serve_connection<S>(state: Arc<ArenaState>, stream: S, peer: Option<SocketAddr>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut connection = Connection {
        state,
        session: PlayerSession::new(SessionId::next()),
        reader: MessageReader::new(read_half),
        writer: MessageWriter::new(write_half),
        deferred: None,
        exited: false,
    };
    connection.log(LogLevel::Debug, &match peer {
        Some(peer) => format!("connected from {peer}"),
        None => "connected".to_string(),
    });

    let result = connection.run().await;
    connection.teardown(result).await;
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    fn id(&self) -> SessionId {
        self.session.id()
    }

    fn log(&self, level: LogLevel, message: &str) {
        log_session(level, self.session.id(), self.session.name(), message);
    }

    async fn next_message(&mut self) -> Result<Option<ClientMessage>, SessionError> {
        if let Some(message) = self.deferred.take() {
            return Ok(Some(message));
        }
        self.reader.read().await
    }

    async fn run(&mut self) -> Result<(), SessionError> {
        // the first frame must name the player
        match self.reader.read::<ClientMessage>().await? {
            None => return Ok(()),
            Some(ClientMessage::Name { name }) => {
                self.session.set_name(&name)?;
                self.log(LogLevel::Info, "joined the arena");
            }
            Some(other) => {
                return Err(ProtocolError::UnexpectedMessage {
                    kind: other.kind(),
                    state: "waiting for a name",
                }
                .into());
            }
        }

        while let Some(message) = self.next_message().await? {
            match self.handle(message).await? {
                Flow::Continue => {}
                Flow::Exit => {
                    self.exited = true;
                    break;
                }
                Flow::Closed => break,
            }
        }
        Ok(())
    }

    async fn handle(&mut self, message: ClientMessage) -> Result<Flow, SessionError> {
        self.log(LogLevel::Debug, &format!("received '{}'", message.kind()));
        match message {
            ClientMessage::Name { name } => {
                self.require_idle("name")?;
                self.session.set_name(&name)?;
                self.log(LogLevel::Info, "renamed");
                Ok(Flow::Continue)
            }
            ClientMessage::Begin => self.begin().await,
            ClientMessage::Figure => {
                self.require_playing("figure")?;
                let piece = self.session.take_next_piece(&self.state.pieces);
                self.writer.send(&ServerMessage::figure(&piece)).await?;
                Ok(Flow::Continue)
            }
            ClientMessage::End { moves_done, elapsed_seconds, end_time } => {
                self.end_round(Tally { moves_done, elapsed_seconds }, end_time).await?;
                Ok(Flow::Continue)
            }
            ClientMessage::LivenessQuery => {
                let id = self.id();
                let value = self
                    .session
                    .room()
                    .is_some_and(|room| room.take_vanished_notice(id));
                if value {
                    self.log(LogLevel::Info, "told the opponent has vanished");
                }
                self.writer.send(&ServerMessage::LivenessReply { value }).await?;
                Ok(Flow::Continue)
            }
            ClientMessage::Top => {
                let entries = self.state.leaderboard().await;
                self.writer.send(&ServerMessage::TopData { entries }).await?;
                Ok(Flow::Continue)
            }
            ClientMessage::Exit => {
                if let Some(room) = self.session.leave_round() {
                    room.withdraw(self.id());
                    self.log(LogLevel::Info, &format!("left {} cleanly", room.id()));
                }
                Ok(Flow::Exit)
            }
        }
    }

    fn require_idle(&self, kind: &'static str) -> Result<(), ProtocolError> {
        if self.session.in_round() {
            return Err(ProtocolError::UnexpectedMessage { kind, state: "playing a round" });
        }
        Ok(())
    }

    fn require_playing(&self, kind: &'static str) -> Result<(), ProtocolError> {
        if !self.session.in_round() {
            return Err(ProtocolError::UnexpectedMessage { kind, state: "not in a round" });
        }
        if self.session.has_finished_round() {
            return Err(ProtocolError::UnexpectedMessage { kind, state: "waiting for the verdict" });
        }
        Ok(())
    }

    /// Wait in the registry until a room is seated. Any message from the
    /// player cancels the wait and is then handled as usual.
    async fn begin(&mut self) -> Result<Flow, SessionError> {
        self.require_idle("begin")?;
        let name = self.session.name().unwrap_or_default().to_string();
        let mut ticket = self.state.registry.join(self.id(), &name)?;
        self.log(LogLevel::Debug, "waiting for a room");

        let wait = tokio::select! {
            seated = ticket.seated() => Wait::Seated(seated),
            next = self.reader.read::<ClientMessage>() => Wait::Interrupted(next),
        };

        match wait {
            Wait::Seated(seated) => {
                drop(ticket);
                self.start_round(seated?).await?;
                Ok(Flow::Continue)
            }
            Wait::Interrupted(next) => {
                // the room may have formed in the same instant
                if let Some(room) = ticket.cancel() {
                    self.start_round(room).await?;
                } else {
                    self.log(LogLevel::Debug, "stopped waiting for a room");
                }
                match next? {
                    Some(message) => {
                        self.deferred = Some(message);
                        Ok(Flow::Continue)
                    }
                    None => Ok(Flow::Closed),
                }
            }
        }
    }

    async fn start_round(&mut self, room: Arc<Room>) -> Result<(), SessionError> {
        let opponent = room.opponent_of(self.id()).map(str::to_string);
        let time_limit_seconds = room.time_limit_seconds();
        self.log(
            LogLevel::Info,
            &format!(
                "entered {} against {}",
                room.id(),
                opponent.as_deref().unwrap_or("nobody")
            ),
        );
        self.session.enter_round(room);
        self.writer
            .send(&ServerMessage::BeginAck { opponent, time_limit_seconds })
            .await
    }

    async fn end_round(&mut self, tally: Tally, end_time: DateTime<Utc>) -> Result<(), SessionError> {
        self.require_playing("end")?;
        let Some(room) = self.session.room().cloned() else {
            return Err(ProtocolError::UnexpectedMessage { kind: "end", state: "not in a round" }.into());
        };
        self.session.record_tally(tally);

        let login = self.session.name().unwrap_or_default();
        let entry = ResultEntry::new(login, end_time, tally.moves_done, tally.elapsed_seconds);
        self.state.archive_result(entry).await;

        let outcome = room.finish(self.id(), tally).await?;
        self.log(
            LogLevel::Info,
            &format!(
                "finished {} with {} moves in {}s: {:?}",
                room.id(),
                tally.moves_done,
                tally.elapsed_seconds,
                outcome
            ),
        );
        self.session.leave_round();
        self.writer.send(&ServerMessage::Result { outcome }).await
    }

    /// Runs once per connection, whatever ended it
    async fn teardown(&mut self, result: Result<(), SessionError>) {
        let id = self.id();
        if self.exited {
            if let Some(room) = self.session.leave_round() {
                room.withdraw(id);
            }
        } else if let Some(room) = self.session.mark_unexpectedly_disconnected() {
            self.log(LogLevel::Warning, &format!("vanished in the middle of {}", room.id()));
        }
        self.state.registry.cancel(id);

        match result {
            Ok(()) if self.exited => self.log(LogLevel::Info, "exited"),
            Ok(()) => self.log(LogLevel::Info, "disconnected"),
            Err(e) if e.is_transport() => self.log(LogLevel::Info, &format!("connection lost: {e}")),
            Err(e @ SessionError::Protocol(_)) => {
                self.log(LogLevel::Warning, &format!("{e}, closing the connection"))
            }
            Err(e) => self.log(LogLevel::Error, &format!("{e}, closing the connection")),
        }
        // the peer may already be gone
        let _ = self.writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::Outcome;
    use crate::archive::MemoryArchive;
    use crate::error::ArchiveError;
    use chrono::TimeZone;
    use std::time::Duration;
    use tokio::io::{DuplexStream, duplex, split};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    struct Player {
        reader: MessageReader<ReadHalf<DuplexStream>>,
        writer: MessageWriter<WriteHalf<DuplexStream>>,
        task: JoinHandle<()>,
    }

    impl Player {
        fn connect(state: &Arc<ArenaState>) -> Self {
            let (client, server) = duplex(16 * 1024);
            let task = tokio::spawn(serve_connection(Arc::clone(state), server, None));
            let (read_half, write_half) = split(client);
            Self {
                reader: MessageReader::new(read_half),
                writer: MessageWriter::new(write_half),
                task,
            }
        }

        async fn named(state: &Arc<ArenaState>, name: &str) -> Self {
            let mut player = Self::connect(state);
            player.send(ClientMessage::Name { name: name.to_string() }).await;
            player
        }

        async fn send(&mut self, message: ClientMessage) {
            self.writer.send(&message).await.unwrap();
        }

        async fn recv(&mut self) -> ServerMessage {
            timeout(Duration::from_secs(2), self.reader.read())
                .await
                .expect("server answered in time")
                .unwrap()
                .expect("connection still open")
        }

        async fn begin(&mut self) {
            self.send(ClientMessage::Begin).await;
        }

        async fn end(&mut self, moves_done: u32, elapsed_seconds: u64) {
            let end_time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
            self.send(ClientMessage::End { moves_done, elapsed_seconds, end_time }).await;
        }

        async fn outcome(&mut self) -> Outcome {
            match self.recv().await {
                ServerMessage::Result { outcome } => outcome,
                other => panic!("expected a result, got {other:?}"),
            }
        }

        async fn liveness(&mut self) -> bool {
            self.send(ClientMessage::LivenessQuery).await;
            match self.recv().await {
                ServerMessage::LivenessReply { value } => value,
                other => panic!("expected a liveness reply, got {other:?}"),
            }
        }

        /// Drop the connection without saying goodbye and wait for the server side to notice
        async fn vanish(self) {
            let Player { reader, writer, task } = self;
            drop(reader);
            drop(writer);
            timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        }

        async fn closed_by_server(&mut self) -> bool {
            matches!(
                timeout(Duration::from_secs(2), self.reader.read::<ServerMessage>()).await,
                Ok(Ok(None)) | Ok(Err(_))
            )
        }
    }

    fn arena(capacity: RoomCapacity) -> (Arc<ArenaState>, Arc<MemoryArchive>) {
        let archive = Arc::new(MemoryArchive::new());
        let state = Arc::new(ArenaState::with_rules(capacity, 60, 10, archive.clone()));
        (state, archive)
    }

    /// An archive whose storage is gone
    struct UnavailableArchive;

    impl ResultArchive for UnavailableArchive {
        fn record_result(&self, _entry: &ResultEntry) -> Result<(), ArchiveError> {
            Err(ArchiveError::Io(std::io::Error::other("disk unplugged")))
        }

        fn top_results(&self, _n: usize) -> Result<Vec<ResultEntry>, ArchiveError> {
            Err(ArchiveError::Io(std::io::Error::other("disk unplugged")))
        }
    }

    async fn duel(state: &Arc<ArenaState>) -> (Player, Player) {
        let mut ann = Player::named(state, "ann").await;
        let mut bob = Player::named(state, "bob").await;
        ann.begin().await;
        bob.begin().await;
        for player in [&mut ann, &mut bob] {
            assert!(matches!(player.recv().await, ServerMessage::BeginAck { .. }));
        }
        (ann, bob)
    }

    #[tokio::test]
    async fn test_solo_round() {
        let (state, archive) = arena(RoomCapacity::Solo);
        let mut ann = Player::named(&state, "ann").await;

        ann.begin().await;
        assert_eq!(
            ann.recv().await,
            ServerMessage::BeginAck { opponent: None, time_limit_seconds: 60 }
        );

        for expected in 0..3u64 {
            ann.send(ClientMessage::Figure).await;
            match ann.recv().await {
                ServerMessage::FigureData { index, .. } => assert_eq!(index, expected),
                other => panic!("expected a figure, got {other:?}"),
            }
        }

        ann.end(3, 20).await;
        assert_eq!(ann.outcome().await, Outcome::Won);
        assert_eq!(archive.len(), 1);

        ann.send(ClientMessage::Top).await;
        match ann.recv().await {
            ServerMessage::TopData { entries } => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].login, "ann");
                assert_eq!(entries[0].moves_done, 3);
            }
            other => panic!("expected the leaderboard, got {other:?}"),
        }

        ann.send(ClientMessage::Exit).await;
        assert!(ann.closed_by_server().await);
    }

    #[tokio::test]
    async fn test_more_moves_beats_faster_time() {
        let (state, archive) = arena(RoomCapacity::Duel);
        let (mut ann, mut bob) = duel(&state).await;

        ann.end(10, 50).await;
        bob.end(8, 10).await;
        assert_eq!(ann.outcome().await, Outcome::Won);
        assert_eq!(bob.outcome().await, Outcome::Lose);
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_equal_moves_faster_time_wins() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, mut bob) = duel(&state).await;

        bob.end(5, 45).await;
        ann.end(5, 30).await;
        assert_eq!(ann.outcome().await, Outcome::Won);
        assert_eq!(bob.outcome().await, Outcome::Lose);
    }

    #[tokio::test]
    async fn test_players_receive_the_same_pieces() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, mut bob) = duel(&state).await;

        for _ in 0..7 {
            ann.send(ClientMessage::Figure).await;
            bob.send(ClientMessage::Figure).await;
            assert_eq!(ann.recv().await, bob.recv().await);
        }
    }

    #[tokio::test]
    async fn test_opponent_names_are_exchanged() {
        let (state, _) = arena(RoomCapacity::Duel);
        let mut ann = Player::named(&state, "ann").await;
        let mut bob = Player::named(&state, "bob").await;
        ann.begin().await;
        bob.begin().await;
        assert_eq!(
            ann.recv().await,
            ServerMessage::BeginAck { opponent: Some("bob".to_string()), time_limit_seconds: 60 }
        );
        assert_eq!(
            bob.recv().await,
            ServerMessage::BeginAck { opponent: Some("ann".to_string()), time_limit_seconds: 60 }
        );
    }

    #[tokio::test]
    async fn test_first_finisher_wins_when_opponent_vanishes() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, bob) = duel(&state).await;

        ann.end(1, 5).await;
        // ann is parked until bob reports or disappears
        assert!(timeout(Duration::from_millis(50), ann.reader.read::<ServerMessage>()).await.is_err());
        bob.vanish().await;
        assert_eq!(ann.outcome().await, Outcome::Won);
    }

    #[tokio::test]
    async fn test_liveness_reports_vanished_opponent_once() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, bob) = duel(&state).await;

        assert!(!ann.liveness().await);
        bob.vanish().await;
        assert!(ann.liveness().await);
        assert!(!ann.liveness().await);

        // the survivor still collects its forfeit win
        ann.end(0, 12).await;
        assert_eq!(ann.outcome().await, Outcome::Won);
    }

    #[tokio::test]
    async fn test_clean_exit_is_not_a_forfeit() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, mut bob) = duel(&state).await;

        bob.send(ClientMessage::Exit).await;
        assert!(bob.closed_by_server().await);
        timeout(Duration::from_secs(2), bob.task).await.unwrap().unwrap();

        assert!(!ann.liveness().await);
        ann.end(2, 30).await;
        assert_eq!(ann.outcome().await, Outcome::Won);
    }

    #[tokio::test]
    async fn test_waiting_player_can_do_something_else() {
        let (state, _) = arena(RoomCapacity::Duel);
        let mut ann = Player::named(&state, "ann").await;

        ann.begin().await;
        ann.send(ClientMessage::Top).await;
        assert!(matches!(ann.recv().await, ServerMessage::TopData { .. }));
        assert_eq!(state.registry.waiting_count(), 0);

        // bob alone must not be released by ann's earlier wait
        let mut bob = Player::named(&state, "bob").await;
        bob.begin().await;
        assert!(timeout(Duration::from_millis(50), bob.reader.read::<ServerMessage>()).await.is_err());
        assert_eq!(state.registry.waiting_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_while_waiting_releases_nobody() {
        let (state, _) = arena(RoomCapacity::Duel);
        let mut ann = Player::named(&state, "ann").await;
        ann.begin().await;
        ann.vanish().await;
        assert_eq!(state.registry.waiting_count(), 0);

        let mut bob = Player::named(&state, "bob").await;
        bob.begin().await;
        assert!(timeout(Duration::from_millis(50), bob.reader.read::<ServerMessage>()).await.is_err());

        let mut carl = Player::named(&state, "carl").await;
        carl.begin().await;
        assert_eq!(
            carl.recv().await,
            ServerMessage::BeginAck { opponent: Some("bob".to_string()), time_limit_seconds: 60 }
        );
    }

    #[tokio::test]
    async fn test_piece_request_outside_round_closes_connection() {
        let (state, _) = arena(RoomCapacity::Solo);
        let mut ann = Player::named(&state, "ann").await;
        ann.send(ClientMessage::Figure).await;
        assert!(ann.closed_by_server().await);
    }

    #[tokio::test]
    async fn test_name_is_required_first() {
        let (state, _) = arena(RoomCapacity::Solo);
        let mut anon = Player::connect(&state);
        anon.begin().await;
        assert!(anon.closed_by_server().await);
        assert_eq!(state.registry.waiting_count(), 0);
    }

    #[tokio::test]
    async fn test_rename_during_round_is_rejected() {
        let (state, _) = arena(RoomCapacity::Solo);
        let mut ann = Player::named(&state, "ann").await;
        ann.begin().await;
        ann.recv().await;
        ann.send(ClientMessage::Name { name: "zed".to_string() }).await;
        assert!(ann.closed_by_server().await);
    }

    #[tokio::test]
    async fn test_consecutive_rounds_on_one_connection() {
        let (state, archive) = arena(RoomCapacity::Solo);
        let mut ann = Player::named(&state, "ann").await;
        let mut last_index = None;

        for round in 0..2u32 {
            ann.begin().await;
            ann.recv().await;
            ann.send(ClientMessage::Figure).await;
            if let ServerMessage::FigureData { index, .. } = ann.recv().await {
                assert!(last_index.is_none_or(|last| index > last));
                last_index = Some(index);
            }
            ann.end(round, 15).await;
            assert_eq!(ann.outcome().await, Outcome::Won);
        }
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_slots() {
        let (state, _) = arena(RoomCapacity::Solo);
        let first = state.try_admit(2).unwrap();
        let _second = state.try_admit(2).unwrap();
        assert!(state.try_admit(2).is_none());
        assert_eq!(state.connections(), 2);
        drop(first);
        assert_eq!(state.connections(), 1);
        assert!(state.try_admit(2).is_some());
    }

    #[tokio::test]
    async fn test_verdict_delivered_when_archive_fails() {
        let state = Arc::new(ArenaState::with_rules(RoomCapacity::Duel, 60, 10, Arc::new(UnavailableArchive)));
        let (mut ann, mut bob) = duel(&state).await;

        ann.end(4, 40).await;
        bob.end(6, 50).await;
        assert_eq!(ann.outcome().await, Outcome::Lose);
        assert_eq!(bob.outcome().await, Outcome::Won);

        ann.send(ClientMessage::Top).await;
        assert_eq!(ann.recv().await, ServerMessage::TopData { entries: Vec::new() });

        // the session survives the failure and can keep playing
        assert!(!ann.liveness().await);
    }

    #[tokio::test]
    async fn test_malformed_frame_mid_round_forfeits_to_parked_opponent() {
        let (state, _) = arena(RoomCapacity::Duel);
        let (mut ann, mut bob) = duel(&state).await;

        ann.end(1, 20).await;
        assert!(timeout(Duration::from_millis(50), ann.reader.read::<ServerMessage>()).await.is_err());

        bob.writer
            .send(&serde_json::json!({ "kind": "end", "moves_done": "plenty" }))
            .await
            .unwrap();
        assert!(bob.closed_by_server().await);
        assert_eq!(ann.outcome().await, Outcome::Won);
    }
}
