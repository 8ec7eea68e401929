use serde::{Deserialize, Serialize};

use crate::domain::entities::{ChatMessage, PartyStatus};
use crate::domain::value_objects::PlaybackState;

/// Why the participant list changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Joined,
    Rejoined,
    Left,
    /// Stale participant heartbeating again
    Revived,
    Reaped,
}

/// Message published on a party's channel.
///
/// Delivery is at-least-once and may be reordered; consumers apply
/// `PartyUpdated` monotonically by `playback.updated_at` and re-fetch the
/// session on `ParticipantsChanged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PartyEvent {
    #[serde(rename_all = "camelCase")]
    PartyUpdated {
        party_id: String,
        status: PartyStatus,
        playback: PlaybackState,
    },
    #[serde(rename_all = "camelCase")]
    ParticipantsChanged {
        party_id: String,
        user_id: String,
        action: ParticipantAction,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage { party_id: String, message: ChatMessage },
}

impl PartyEvent {
    pub fn party_id(&self) -> &str {
        match self {
            PartyEvent::PartyUpdated { party_id, .. }
            | PartyEvent::ParticipantsChanged { party_id, .. }
            | PartyEvent::ChatMessage { party_id, .. } => party_id,
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            PartyEvent::PartyUpdated { .. } => "partyUpdated",
            PartyEvent::ParticipantsChanged { .. } => "participantsChanged",
            PartyEvent::ChatMessage { .. } => "chatMessage",
        }
    }

    /// Whether this is the last event a party will ever publish
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PartyEvent::PartyUpdated {
                status: PartyStatus::Ended,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_updated_wire_format() {
        let event = PartyEvent::PartyUpdated {
            party_id: "p1".into(),
            status: PartyStatus::Active,
            playback: PlaybackState::new(42.3, true, 1_700_000_000_000),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "partyUpdated");
        assert_eq!(json["partyId"], "p1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["playback"]["position"], 42.3);
        assert_eq!(json["playback"]["isPlaying"], true);
        assert_eq!(json["playback"]["updatedAt"], 1_700_000_000_000i64);
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_ended_update_is_terminal() {
        let event = PartyEvent::PartyUpdated {
            party_id: "p1".into(),
            status: PartyStatus::Ended,
            playback: PlaybackState::new(0.0, false, 1),
        };
        assert!(event.is_terminal());
        assert_eq!(event.event_name(), "partyUpdated");
    }

    #[test]
    fn test_participants_changed_round_trips() {
        let event = PartyEvent::ParticipantsChanged {
            party_id: "p1".into(),
            user_id: "u1".into(),
            action: ParticipantAction::Rejoined,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"action\":\"rejoined\""));
        let back: PartyEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
