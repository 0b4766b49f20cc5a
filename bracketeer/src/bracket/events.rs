//! Fire-and-forget change notifications.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::models::{BracketFormat, MatchId, TeamId, TournamentId};

/// Default channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something observable changed in a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BracketEvent {
    BracketBuilt {
        tournament_id: TournamentId,
        format: BracketFormat,
        match_count: usize,
    },
    ResultReported {
        tournament_id: TournamentId,
        match_id: MatchId,
        winner: TeamId,
        champion: Option<TeamId>,
    },
    BracketReset {
        tournament_id: TournamentId,
    },
    RosterChanged {
        tournament_id: TournamentId,
    },
}

impl BracketEvent {
    pub fn tournament_id(&self) -> TournamentId {
        match self {
            BracketEvent::BracketBuilt { tournament_id, .. }
            | BracketEvent::ResultReported { tournament_id, .. }
            | BracketEvent::BracketReset { tournament_id }
            | BracketEvent::RosterChanged { tournament_id } => *tournament_id,
        }
    }
}

/// Broadcast hub for [`BracketEvent`]s
#[derive(Clone)]
pub struct BracketEvents {
    tx: broadcast::Sender<BracketEvent>,
}

impl BracketEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BracketEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: BracketEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            log::trace!("No subscribers for {:?}", event);
        }
    }
}

impl Default for BracketEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let events = BracketEvents::default();
        events.publish(BracketEvent::BracketReset { tournament_id: 1 });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let events = BracketEvents::new(8);
        let mut rx = events.subscribe();
        events.publish(BracketEvent::RosterChanged { tournament_id: 3 });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.tournament_id(), 3);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(BracketEvent::BracketBuilt {
            tournament_id: 1,
            format: BracketFormat::Double,
            match_count: 6,
        })
        .unwrap();
        assert_eq!(json["type"], "bracket_built");
        assert_eq!(json["format"], "double");
    }
}
