//! WebSocket integration tests for the live bracket feed.
//!
//! Serves the router on a loopback port backed by the in-memory store and
//! connects a real WebSocket client, since upgrades cannot go through `oneshot()`.

use bk_server::api::{AppState, create_router};
use bracketeer::auth::AuthManager;
use bracketeer::bracket::{BracketEvent, BracketEvents, BracketFormat, BracketManager};
use bracketeer::db::MemoryStore;
use futures_util::StreamExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper to serve a fresh router; returns its address and bracket manager
async fn spawn_server(event_capacity: usize) -> (SocketAddr, Arc<BracketManager>) {
    let store = Arc::new(MemoryStore::new());
    let bracket_manager = Arc::new(BracketManager::in_memory(
        store.clone(),
        BracketEvents::new(event_capacity),
    ));

    let state = AppState {
        auth_manager: Arc::new(AuthManager::new(
            store,
            "test_pepper_for_testing_only".to_string(),
            "test_secret_key_for_testing_only_0123456789".to_string(),
        )),
        bracket_manager: bracket_manager.clone(),
        pool: None,
        metrics: None,
        default_format: BracketFormat::Single,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    (addr, bracket_manager)
}

async fn connect(addr: SocketAddr, tournament_id: i64) -> Client {
    let url = format!("ws://{}/ws/tournaments/{}", addr, tournament_id);
    let (client, _) = connect_async(url).await.unwrap();
    client
}

/// Next text frame as JSON, failing after a few seconds of silence
async fn next_json(client: &mut Client) -> Value {
    let message = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a message")
        .expect("stream ended")
        .unwrap();
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_unknown_tournament_is_not_upgraded() {
    let (addr, _) = spawn_server(16).await;

    let url = format!("ws://{}/ws/tournaments/999", addr);
    match connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status().as_u16(), 404),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("upgrade should be refused"),
    }
}

#[tokio::test]
async fn test_feed_forwards_only_its_tournament() {
    let (addr, manager) = spawn_server(16).await;
    let watched = manager.create_tournament("Watched").await.unwrap();
    let other = manager.create_tournament("Other").await.unwrap();

    let mut client = connect(addr, watched.id).await;
    let subscribed = next_json(&mut client).await;
    assert_eq!(subscribed["type"], "subscribed");
    assert_eq!(subscribed["tournament_id"], watched.id);

    manager.add_team(other.id, "Elsewhere", None).await.unwrap();
    manager.add_team(watched.id, "A", None).await.unwrap();
    manager.add_team(watched.id, "B", None).await.unwrap();
    manager
        .start_bracket(watched.id, BracketFormat::Single)
        .await
        .unwrap();

    let first = next_json(&mut client).await;
    assert_eq!(first["type"], "roster_changed");
    assert_eq!(first["tournament_id"], watched.id);
    assert_eq!(next_json(&mut client).await["type"], "roster_changed");

    let built = next_json(&mut client).await;
    assert_eq!(built["type"], "bracket_built");
    assert_eq!(built["format"], "single");
    assert_eq!(built["match_count"], 1);
}

#[tokio::test]
async fn test_slow_client_gets_lag_notice() {
    let (addr, manager) = spawn_server(2).await;
    let tournament = manager.create_tournament("Busy").await.unwrap();

    let mut client = connect(addr, tournament.id).await;
    assert_eq!(next_json(&mut client).await["type"], "subscribed");

    // Published without yielding, so the server cannot drain in between
    for _ in 0..10 {
        manager.events().publish(BracketEvent::RosterChanged {
            tournament_id: tournament.id,
        });
    }

    let lagged = next_json(&mut client).await;
    assert_eq!(lagged["type"], "lagged");
    assert_eq!(lagged["skipped"], 8);

    // The retained tail still arrives
    assert_eq!(next_json(&mut client).await["type"], "roster_changed");
    assert_eq!(next_json(&mut client).await["type"], "roster_changed");
}
