// tests/round_flow.rs
// End-to-end rounds against a real arena server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use jigsaw_arena::arbiter::Outcome;
use jigsaw_arena::archive::{MemoryArchive, ResultArchive};
use jigsaw_arena::client::{ArenaClient, RoundStart};
use jigsaw_arena::config::ServerConfig;
use jigsaw_arena::protocol::ClientMessage;
use jigsaw_arena::room::RoomCapacity;
use jigsaw_arena::server::{ServerHandle, start_server};
use jigsaw_arena::status::{StatusResponse, TopResponse};
use tokio::time::timeout;

const PATIENCE: Duration = Duration::from_secs(5);

async fn arena(players: RoomCapacity) -> (ServerHandle, Arc<MemoryArchive>) {
    let archive = Arc::new(MemoryArchive::new());
    let config = ServerConfig {
        port: 0,
        status_port: Some(0),
        players,
        round_seconds: 30,
        ..ServerConfig::default()
    };
    let server = start_server(config, archive.clone()).await.unwrap();
    (server, archive)
}

async fn player(server: &ServerHandle, name: &str) -> ArenaClient {
    ArenaClient::connect(server.local_addr(), name).await.unwrap()
}

async fn fetch_status(server: &ServerHandle) -> StatusResponse {
    let url = format!("http://{}/status", server.status_addr().unwrap());
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn test_duel_round_end_to_end() {
    let (server, archive) = arena(RoomCapacity::Duel).await;
    let mut ann = player(&server, "ann").await;
    let mut bob = player(&server, "bob").await;

    let (ann_start, bob_start) = timeout(PATIENCE, async { tokio::join!(ann.begin(), bob.begin()) })
        .await
        .unwrap();
    assert_eq!(
        ann_start.unwrap(),
        RoundStart { opponent: Some("bob".to_string()), time_limit_seconds: 30 }
    );
    assert_eq!(bob_start.unwrap().opponent.as_deref(), Some("ann"));

    for expected in 0..6u64 {
        let ann_piece = ann.figure().await.unwrap();
        let bob_piece = bob.figure().await.unwrap();
        assert_eq!(ann_piece.index(), expected);
        assert_eq!(ann_piece, bob_piece);
    }

    let (ann_outcome, bob_outcome) = timeout(PATIENCE, async { tokio::join!(ann.end(10, 50), bob.end(8, 10)) })
        .await
        .unwrap();
    assert_eq!(ann_outcome.unwrap(), Outcome::Won);
    assert_eq!(bob_outcome.unwrap(), Outcome::Lose);

    let top = ann.top().await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].login, "ann");
    assert_eq!(top[1].login, "bob");
    assert_eq!(archive.top_results(10).unwrap(), top);

    ann.exit().await.unwrap();
    bob.exit().await.unwrap();
    server.shutdown();
    timeout(PATIENCE, server.stopped()).await.unwrap();
}

#[tokio::test]
async fn test_vanished_opponent_forfeits() {
    let (server, _) = arena(RoomCapacity::Duel).await;
    let mut ann = player(&server, "ann").await;
    let mut bob = player(&server, "bob").await;
    timeout(PATIENCE, async { tokio::join!(ann.begin(), bob.begin()) })
        .await
        .unwrap();

    bob.figure().await.unwrap();
    drop(bob);

    let outcome = timeout(PATIENCE, ann.end(0, 12)).await.unwrap().unwrap();
    assert_eq!(outcome, Outcome::Won);
}

#[tokio::test]
async fn test_solo_round_has_no_opponent() {
    let (server, archive) = arena(RoomCapacity::Solo).await;
    let mut zed = player(&server, "zed").await;

    let start = timeout(PATIENCE, zed.begin()).await.unwrap().unwrap();
    assert_eq!(start.opponent, None);
    zed.figure().await.unwrap();
    assert!(!zed.opponent_vanished().await.unwrap());
    assert_eq!(zed.end(1, 11).await.unwrap(), Outcome::Won);
    assert_eq!(archive.len(), 1);
    zed.exit().await.unwrap();
}

#[tokio::test]
async fn test_waiting_can_be_abandoned_by_another_command() {
    let (server, _) = arena(RoomCapacity::Duel).await;
    let mut ann = player(&server, "ann").await;

    ann.send(&ClientMessage::Begin).await.unwrap();
    assert!(ann.top().await.unwrap().is_empty());
    assert_eq!(fetch_status(&server).await.waiting, 0);

    // a later pair still forms normally
    let mut bob = player(&server, "bob").await;
    let mut carl = player(&server, "carl").await;
    let (bob_start, _) = timeout(PATIENCE, async { tokio::join!(bob.begin(), carl.begin()) })
        .await
        .unwrap();
    assert_eq!(bob_start.unwrap().opponent.as_deref(), Some("carl"));
}

#[tokio::test]
async fn test_status_endpoint() {
    let (server, _) = arena(RoomCapacity::Duel).await;
    let mut ann = player(&server, "ann").await;
    ann.send(&ClientMessage::Begin).await.unwrap();

    let mut status = fetch_status(&server).await;
    for _ in 0..50 {
        if status.waiting == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = fetch_status(&server).await;
    }
    assert_eq!(status.waiting, 1);
    assert_eq!(status.connections, 1);
    assert_eq!(status.capacity, RoomCapacity::Duel);
    assert_eq!(status.round_seconds, 30);

    let mut bob = player(&server, "bob").await;
    bob.begin().await.unwrap();
    ann.wait_round_start().await.unwrap();
    bob.figure().await.unwrap();

    let status = fetch_status(&server).await;
    assert_eq!(status.active_rooms, 1);
    assert_eq!(status.pieces, 5);
    assert_eq!(status.rooms[0].players, vec!["ann", "bob"]);

    let base = format!("http://{}", server.status_addr().unwrap());
    let top: TopResponse = reqwest::get(format!("{base}/top")).await.unwrap().json().await.unwrap();
    assert!(top.entries.is_empty());

    let missing = reqwest::get(format!("{base}/nothing-here")).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}
