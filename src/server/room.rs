//! Room state and the round state machine.
//!
//! A [`Room`] exclusively owns its participants and their votes. Every
//! mutation goes through the methods here; callers serialize access by
//! holding the room's lock for the duration of one operation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::ActionError;
use crate::models::Card;
use crate::protocol::{ParticipantView, RoomSnapshot, ServerMessage};

/// Identifier of a participant within a room.
pub type ParticipantId = Uuid;

/// Identifier of one live transport connection.
pub type ConnectionId = Uuid;

/// Secret handed only to the participant's own connection, used to resume
/// after a dropped connection.
pub type ResumeToken = Uuid;

/// Channel used to deliver messages to one connection.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Voting phase of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Votes are being collected and are hidden.
    Collecting,
    /// Votes are visible to everyone; no more votes accepted.
    Revealed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Collecting => f.write_str("collecting"),
            Phase::Revealed => f.write_str("revealed"),
        }
    }
}

/// One user within a room.
#[derive(Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub vote: Option<Card>,
    /// False while the participant's connection is down (grace period).
    pub connected: bool,
    resume_token: ResumeToken,
    /// Connection currently bound to this participant.
    connection: Option<ConnectionId>,
    outbox: Option<Outbox>,
}

impl Participant {
    fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            vote: None,
            connected: true,
            resume_token: Uuid::new_v4(),
            connection: None,
            outbox: None,
        }
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn resume_token(&self) -> ResumeToken {
        self.resume_token
    }

    /// Send a message to this participant's connection, if any.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match &self.outbox {
            Some(outbox) if self.connected => outbox.send(msg).is_ok(),
            _ => false,
        }
    }
}

/// One estimation session.
#[derive(Debug)]
pub struct Room {
    id: String,
    phase: Phase,
    created_at: DateTime<Utc>,
    /// Join order is display order.
    participants: Vec<Participant>,
    max_participants: usize,
    /// Set once the store has dropped this room; further joins must go to a
    /// fresh room.
    closed: bool,
}

impl Room {
    /// Create an empty room in the `Collecting` phase.
    pub fn new(id: impl Into<String>, max_participants: usize) -> Self {
        Self {
            id: id.into(),
            phase: Phase::Collecting,
            created_at: Utc::now(),
            participants: Vec::new(),
            max_participants,
            closed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Participant holding `token`, if it is still in the room.
    pub fn participant_by_token(&self, token: ResumeToken) -> Option<&Participant> {
        self.participants.iter().find(|p| p.resume_token == token)
    }

    fn participant_mut(&mut self, id: ParticipantId) -> Result<&mut Participant, ActionError> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ActionError::ParticipantNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Number of participants holding a vote this round.
    pub fn vote_count(&self) -> usize {
        self.participants.iter().filter(|p| p.vote.is_some()).count()
    }

    /// Add a participant without a vote. Allowed in either phase.
    pub fn join(&mut self, name: impl Into<String>) -> Result<ParticipantId, ActionError> {
        if self.closed {
            return Err(ActionError::RoomNotFound(self.id.clone()));
        }
        if self.participants.len() >= self.max_participants {
            return Err(ActionError::RoomFull(self.id.clone()));
        }

        let participant = Participant::new(name.into());
        let id = participant.id;
        self.participants.push(participant);
        Ok(id)
    }

    /// Bind a live connection to a participant, marking it connected.
    ///
    /// Used both right after `join` and when resuming. Resuming replaces any
    /// connection still bound, which then stops receiving messages.
    pub fn attach(
        &mut self,
        participant_id: ParticipantId,
        connection: ConnectionId,
        outbox: Outbox,
    ) -> Result<(), ActionError> {
        let participant = self.participant_mut(participant_id)?;
        participant.connected = true;
        participant.connection = Some(connection);
        participant.outbox = Some(outbox);
        Ok(())
    }

    /// Record a vote, replacing any earlier vote by the same participant.
    pub fn vote(&mut self, participant_id: ParticipantId, raw: &str) -> Result<Card, ActionError> {
        if self.phase != Phase::Collecting {
            return Err(ActionError::InvalidPhase {
                action: "vote",
                phase: self.phase,
            });
        }
        let card = Card::parse(raw)?;
        let participant = self.participant_mut(participant_id)?;
        participant.vote = Some(card);
        Ok(card)
    }

    /// Flip the cards. Revealing with no votes yields an empty result.
    pub fn reveal(&mut self) -> Result<(), ActionError> {
        if self.phase == Phase::Revealed {
            return Err(ActionError::InvalidPhase {
                action: "reveal",
                phase: self.phase,
            });
        }
        self.phase = Phase::Revealed;
        Ok(())
    }

    /// Start a new round: clear every vote and go back to `Collecting`.
    pub fn reset(&mut self) {
        for participant in &mut self.participants {
            participant.vote = None;
        }
        self.phase = Phase::Collecting;
    }

    /// Remove a participant.
    pub fn leave(&mut self, participant_id: ParticipantId) -> Result<Participant, ActionError> {
        let index = self
            .participants
            .iter()
            .position(|p| p.id == participant_id)
            .ok_or_else(|| ActionError::ParticipantNotFound(participant_id.to_string()))?;
        Ok(self.participants.remove(index))
    }

    /// Mark a participant as not connected, if `connection` is still the
    /// one bound to it. Returns whether anything changed.
    pub fn mark_disconnected(
        &mut self,
        participant_id: ParticipantId,
        connection: ConnectionId,
    ) -> bool {
        match self.participant_mut(participant_id) {
            Ok(p) if p.connection == Some(connection) && p.connected => {
                p.connected = false;
                p.outbox = None;
                true
            }
            _ => false,
        }
    }

    /// Remove a participant whose grace period ran out, unless it resumed
    /// on another connection since `connection` dropped.
    pub fn expire(&mut self, participant_id: ParticipantId, connection: ConnectionId) -> bool {
        let still_gone = self
            .participant(participant_id)
            .is_some_and(|p| !p.connected && p.connection == Some(connection));
        still_gone && self.leave(participant_id).is_ok()
    }

    /// Observable state. Votes are only included once revealed.
    pub fn snapshot(&self) -> RoomSnapshot {
        let revealed = self.phase == Phase::Revealed;
        RoomSnapshot {
            room_id: self.id.clone(),
            phase: self.phase,
            created_at: self.created_at,
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantView {
                    id: p.id,
                    name: p.name.clone(),
                    has_voted: p.vote.is_some(),
                    vote: if revealed {
                        p.vote.map(|card| card.as_str().to_string())
                    } else {
                        None
                    },
                    connected: p.connected,
                })
                .collect(),
        }
    }

    /// Send a message to a single participant.
    pub fn send_to(&self, participant_id: ParticipantId, msg: ServerMessage) -> bool {
        self.participant(participant_id)
            .is_some_and(|p| p.send(msg))
    }

    /// Send a message to every connected participant.
    pub fn broadcast(&self, msg: ServerMessage) {
        for participant in &self.participants {
            participant.send(msg.clone());
        }
    }

    /// Broadcast the current snapshot.
    pub fn broadcast_snapshot(&self) {
        self.broadcast(ServerMessage::RoomSnapshot(self.snapshot()));
    }
}
