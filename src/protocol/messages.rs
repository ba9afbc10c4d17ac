//! Protocol messages for client-server communication.
//!
//! All messages are serialized as JSON over WebSocket, tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ActionError;
use crate::models::{Card, CardInput};
use crate::server::Phase;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join (or create) a room under a display name.
    ///
    /// `resume_token` (from an earlier `Joined`) takes back a participant
    /// whose connection dropped less than a grace period ago. An unknown
    /// token joins as a new participant.
    Join {
        room_id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resume_token: Option<Uuid>,
    },

    /// Cast or replace this participant's vote.
    Vote { value: CardInput },

    /// Flip all cards.
    Reveal,

    /// Clear all votes and start a new round.
    Reset,

    /// Leave the room immediately.
    Leave,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Connection accepted, waiting for Join message.
    ConnectionAck,

    /// Join accepted. Sent only to the joining connection; the resume
    /// token never appears in snapshots.
    Joined {
        room_id: String,
        participant_id: Uuid,
        resume_token: Uuid,
        resumed: bool,
    },

    /// Your own current card. Sent only to the voter, after each accepted
    /// vote and on resume.
    VoteAccepted { value: String },

    /// Full observable state of a room, sent after every accepted mutation.
    RoomSnapshot(RoomSnapshot),

    /// The last action from this connection was rejected.
    ActionError { code: String, reason: String },

    /// Server is shutting down.
    ServerClosing,
}

impl From<&ActionError> for ServerMessage {
    fn from(err: &ActionError) -> Self {
        ServerMessage::ActionError {
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Observable room state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub phase: Phase,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantView>,
}

impl RoomSnapshot {
    /// Look up a participant by display name.
    pub fn participant(&self, name: &str) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| p.name == name)
    }
}

/// One participant as seen by everyone in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: Uuid,
    pub name: String,
    pub has_voted: bool,
    /// Only populated once the round is revealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<String>,
    pub connected: bool,
}

impl ParticipantView {
    pub fn card(&self) -> Option<Card> {
        self.vote.as_deref().and_then(|v| Card::parse(v).ok())
    }
}

/// Display name constraints.
pub const NAME_MAX_LENGTH: usize = 32;

/// Room identifier constraints.
pub const ROOM_ID_MAX_LENGTH: usize = 64;

/// Default server port.
pub const DEFAULT_PORT: u16 = 8712;

/// Validates a display name and returns it trimmed.
pub fn validate_name(name: &str) -> Result<String, ActionError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ActionError::InvalidName("name cannot be empty".to_string()));
    }

    if trimmed.chars().count() > NAME_MAX_LENGTH {
        return Err(ActionError::InvalidName(format!(
            "name must be at most {} characters",
            NAME_MAX_LENGTH
        )));
    }

    if trimmed.chars().any(char::is_control) {
        return Err(ActionError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Normalizes a room identifier: trimmed, lower-cased, `[a-z0-9_-]` only.
pub fn normalize_room_id(room_id: &str) -> Result<String, ActionError> {
    let normalized = room_id.trim().to_lowercase();

    if normalized.is_empty() {
        return Err(ActionError::InvalidRoomId(
            "room id cannot be empty".to_string(),
        ));
    }

    if normalized.len() > ROOM_ID_MAX_LENGTH {
        return Err(ActionError::InvalidRoomId(format!(
            "room id must be at most {} characters",
            ROOM_ID_MAX_LENGTH
        )));
    }

    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ActionError::InvalidRoomId(format!(
            "{:?} may only contain letters, digits, '-' and '_'",
            room_id.trim()
        )));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Alice ").unwrap(), "Alice");
        assert!(validate_name("B").is_ok());
        assert!(validate_name(&"x".repeat(32)).is_ok());
        assert!(validate_name(&"x".repeat(33)).is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("bad\u{7}name").is_err());
    }

    #[test]
    fn test_normalize_room_id() {
        assert_eq!(normalize_room_id(" Team-X ").unwrap(), "team-x");
        assert_eq!(normalize_room_id("sprint_42").unwrap(), "sprint_42");
        assert!(matches!(
            normalize_room_id(""),
            Err(ActionError::InvalidRoomId(_))
        ));
        assert!(matches!(
            normalize_room_id(" \t "),
            Err(ActionError::InvalidRoomId(_))
        ));
        assert!(normalize_room_id("../etc").is_err());
        assert!(normalize_room_id("team x").is_err());
        assert!(normalize_room_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"Join","room_id":"team-x","name":"Alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                room_id: "team-x".to_string(),
                name: "Alice".to_string(),
                resume_token: None,
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Vote","value":5}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Vote {
                value: CardInput::Number(5.into())
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Reveal"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Reveal);
    }

    #[test]
    fn test_snapshot_hides_missing_vote() {
        let view = ParticipantView {
            id: Uuid::new_v4(),
            name: "Bob".to_string(),
            has_voted: true,
            vote: None,
            connected: true,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"has_voted\":true"));
        assert!(!json.contains("\"vote\""));
    }

    #[test]
    fn test_action_error_message() {
        let msg = ServerMessage::from(&ActionError::InvalidVote("7".to_string()));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"ActionError\""));
        assert!(json.contains("\"code\":\"invalid_vote\""));
    }
}
