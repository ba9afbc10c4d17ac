//! Error types.
//!
//! [`ActionError`] is reported back to the acting client as an
//! `ActionError` message and never affects other participants.
//! [`Error`] covers process-level failures of the server or client.

use std::io;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::server::Phase;

/// A rejected client action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Room identifier is empty or malformed.
    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),

    /// Display name is empty, too long or contains control characters.
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Vote value is not one of the allowed cards.
    #[error("Invalid vote: {0:?} is not a card in the deck")]
    InvalidVote(String),

    /// Action is not permitted in the current round phase.
    #[error("Cannot {action} while the round is {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    /// Room no longer exists (it emptied out while the request was in flight).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Participant is not (or no longer) part of the room.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Room has reached its participant cap.
    #[error("Room is full: {0}")]
    RoomFull(String),

    /// Server has reached its room cap.
    #[error("Too many open rooms")]
    TooManyRooms,

    /// Action sent before a successful `Join`.
    #[error("Join a room first")]
    NotJoined,

    /// `Join` sent on a connection that already joined a room.
    #[error("Already joined room {0}")]
    AlreadyJoined(String),

    /// Message could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Connection went away before the action was applied.
    #[error("Connection lost")]
    ConnectionLost,
}

impl ActionError {
    /// Stable machine-readable code sent alongside the reason.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::InvalidRoomId(_) => "invalid_room_id",
            ActionError::InvalidName(_) => "invalid_name",
            ActionError::InvalidVote(_) => "invalid_vote",
            ActionError::InvalidPhase { .. } => "invalid_phase",
            ActionError::RoomNotFound(_) => "room_not_found",
            ActionError::ParticipantNotFound(_) => "participant_not_found",
            ActionError::RoomFull(_) => "room_full",
            ActionError::TooManyRooms => "too_many_rooms",
            ActionError::NotJoined => "not_joined",
            ActionError::AlreadyJoined(_) => "already_joined",
            ActionError::BadRequest(_) => "bad_request",
            ActionError::ConnectionLost => "connection_lost",
        }
    }
}

/// Process-level error for the server and client runners.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Join rejected: {0}")]
    Rejected(String),
}
