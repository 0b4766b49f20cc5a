//! WebSocket feed of bracket events.
//!
//! Clients connect to `GET /ws/tournaments/{id}` and receive one JSON message
//! per [`BracketEvent`] of that tournament. The feed is read-only; clients
//! refetch `/api/v1/tournaments/{id}/bracket` when an event arrives.
//!
//! A client that falls too far behind gets `{"type":"lagged","skipped":n}`
//! and should refetch the whole bracket.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws/tournaments/1');
//! ws.onmessage = (event) => {
//!   const data = JSON.parse(event.data);
//!   if (data.type === 'result_reported') refreshBracket();
//! };
//! ```

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bracketeer::bracket::{BracketEvent, TournamentId};
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{AppState, bracket_error};
use crate::metrics;

/// Control messages sent alongside events
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlMessage {
    Subscribed { tournament_id: TournamentId },
    Lagged { skipped: u64 },
}

/// Upgrade to a WebSocket subscription for one tournament.
///
/// Returns `404 Not Found` for unknown tournaments instead of upgrading.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(tournament_id): Path<TournamentId>,
    State(state): State<AppState>,
) -> Response {
    if let Err(e) = state.bracket_manager.get_tournament(tournament_id).await {
        return bracket_error(e).into_response();
    }

    // Subscribe before the upgrade so nothing published in between is missed
    let events = state.bracket_manager.events().subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, tournament_id, events))
}

async fn send_json<T: Serialize>(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    value: &T,
) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize websocket message: {}", e);
            return true;
        }
    };

    if sender.send(Message::Text(json.into())).await.is_err() {
        return false;
    }
    metrics::websocket_messages_sent();
    true
}

/// Forward matching events until either side goes away.
async fn handle_socket(
    socket: WebSocket,
    tournament_id: TournamentId,
    mut events: broadcast::Receiver<BracketEvent>,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("WebSocket subscribed: tournament={}", tournament_id);
    metrics::websocket_connections_total();
    metrics::websocket_connections_active(1.0);

    if send_json(&mut sender, &ControlMessage::Subscribed { tournament_id }).await {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) if event.tournament_id() == tournament_id => {
                        if !send_json(&mut sender, &event).await {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "WebSocket for tournament {} lagged, skipped {} event(s)",
                            tournament_id, skipped
                        );
                        if !send_json(&mut sender, &ControlMessage::Lagged { skipped }).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                },
            }
        }
    }

    metrics::websocket_connections_active(-1.0);
    info!("WebSocket disconnected: tournament={}", tournament_id);
}
