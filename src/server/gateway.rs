//! Connection gateway.
//!
//! Binds live connections to (room, participant) pairs and fans out room
//! snapshots. The connection table is a lookup only; vote and phase data
//! always come from the room itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ActionError;
use crate::models::Card;
use crate::protocol::{ServerMessage, normalize_room_id, validate_name};

use super::room::{ConnectionId, Outbox, ParticipantId, ResumeToken, Room};
use super::store::SessionStore;

/// Number of times `connect` retries when the room it found was closed
/// underneath it.
const JOIN_ATTEMPTS: usize = 3;

/// Round actions a joined participant can take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Vote(String),
    Reveal,
    Reset,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Vote(_) => "vote",
            Action::Reveal => "reveal",
            Action::Reset => "reset",
        }
    }

    /// Returns the accepted card for a vote.
    fn apply(
        &self,
        room: &mut Room,
        participant_id: ParticipantId,
    ) -> Result<Option<Card>, ActionError> {
        match self {
            Action::Vote(value) => room.vote(participant_id, value).map(Some),
            Action::Reveal => room.reveal().map(|_| None),
            Action::Reset => {
                room.reset();
                Ok(None)
            }
        }
    }
}

/// Result of a successful `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub connection_id: ConnectionId,
    pub participant_id: ParticipantId,
    pub resume_token: ResumeToken,
    pub room_id: String,
    pub resumed: bool,
}

#[derive(Debug, Clone)]
struct Binding {
    room_id: String,
    participant_id: ParticipantId,
}

pub struct Gateway {
    store: SessionStore,
    connections: Mutex<HashMap<ConnectionId, Binding>>,
    grace_period: Duration,
}

impl Gateway {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            store: SessionStore::new(config.max_rooms, config.max_participants),
            connections: Mutex::new(HashMap::new()),
            grace_period: config.grace_period,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Join `room_id` as `name` and register `outbox` for event delivery.
    ///
    /// If `resume` is the token of a participant still in that room, the
    /// new connection takes that participant over (keeping its name and
    /// vote) instead of joining a new one. An unknown token is ignored. The
    /// new connection receives `Joined`, its own card if it has one, and the
    /// room snapshot, which is also broadcast to everyone else in the room.
    pub async fn connect(
        &self,
        room_id: &str,
        name: &str,
        resume: Option<ResumeToken>,
        outbox: Outbox,
    ) -> Result<Joined, ActionError> {
        let room_id = normalize_room_id(room_id)?;
        let name = validate_name(name)?;
        let connection_id = Uuid::new_v4();

        for _ in 0..JOIN_ATTEMPTS {
            let shared = self.store.get_or_create_room(&room_id).await?;
            let mut room = shared.lock().await;

            let resumable = resume
                .and_then(|token| room.participant_by_token(token))
                .map(|p| p.id);
            let (participant_id, resumed) = match resumable {
                Some(id) => (id, true),
                None => match room.join(name.as_str()) {
                    Ok(id) => (id, false),
                    // Room emptied and closed while we were waiting on its lock.
                    Err(ActionError::RoomNotFound(_)) => continue,
                    Err(e) => return Err(e),
                },
            };

            let replaced = room
                .participant(participant_id)
                .filter(|p| resumed && p.connected)
                .and_then(|p| p.connection());
            if let Some(stale) = replaced {
                debug!(connection_id = %stale, "Resume takes over a live connection");
            }
            room.attach(participant_id, connection_id, outbox.clone())?;
            self.connections.lock().await.insert(
                connection_id,
                Binding {
                    room_id: room_id.clone(),
                    participant_id,
                },
            );

            let (resume_token, vote) = match room.participant(participant_id) {
                Some(p) => (p.resume_token(), p.vote),
                None => return Err(ActionError::ParticipantNotFound(participant_id.to_string())),
            };
            room.send_to(
                participant_id,
                ServerMessage::Joined {
                    room_id: room_id.clone(),
                    participant_id,
                    resume_token,
                    resumed,
                },
            );
            if let Some(card) = vote {
                room.send_to(
                    participant_id,
                    ServerMessage::VoteAccepted {
                        value: card.as_str().to_string(),
                    },
                );
            }
            room.broadcast_snapshot();

            info!(
                room_id = %room_id,
                participant_id = %participant_id,
                connection_id = %connection_id,
                resumed,
                participants = room.len(),
                "Participant joined"
            );

            return Ok(Joined {
                connection_id,
                participant_id,
                resume_token,
                room_id,
                resumed,
            });
        }

        warn!(room_id = %room_id, "Gave up joining a room that kept closing");
        Err(ActionError::RoomNotFound(room_id))
    }

    /// Apply a round action on behalf of `connection_id`.
    ///
    /// On success the new snapshot goes to the whole room, and an accepted
    /// vote is echoed to the voter alone. On failure nothing changes and the
    /// error is returned for the caller to report to the originating
    /// connection only.
    pub async fn on_client_action(
        &self,
        connection_id: ConnectionId,
        action: Action,
    ) -> Result<(), ActionError> {
        let binding = self.binding(connection_id).await?;
        let shared = self
            .store
            .get_room(&binding.room_id)
            .await
            .ok_or_else(|| ActionError::RoomNotFound(binding.room_id.clone()))?;
        let mut room = shared.lock().await;

        // The connection may have dropped while this action waited for the lock.
        let still_bound = room
            .participant(binding.participant_id)
            .is_some_and(|p| p.connected && p.connection() == Some(connection_id));
        if !still_bound {
            debug!(connection_id = %connection_id, "Discarding action from stale connection");
            return Err(ActionError::ConnectionLost);
        }

        if let Some(card) = action.apply(&mut room, binding.participant_id)? {
            room.send_to(
                binding.participant_id,
                ServerMessage::VoteAccepted {
                    value: card.as_str().to_string(),
                },
            );
        }
        room.broadcast_snapshot();

        info!(
            room_id = %binding.room_id,
            participant_id = %binding.participant_id,
            action = action.name(),
            phase = %room.phase(),
            votes = room.vote_count(),
            "Action applied"
        );
        Ok(())
    }

    /// Explicit departure: remove the participant right away.
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<(), ActionError> {
        let binding = self
            .connections
            .lock()
            .await
            .remove(&connection_id)
            .ok_or(ActionError::NotJoined)?;

        if let Some(shared) = self.store.get_room(&binding.room_id).await {
            let mut room = shared.lock().await;
            // A connection that was taken over by a resume no longer speaks
            // for the participant.
            let owns_seat = room
                .participant(binding.participant_id)
                .is_some_and(|p| p.connection() == Some(connection_id));
            if owns_seat && room.leave(binding.participant_id).is_ok() {
                room.broadcast_snapshot();
                info!(
                    room_id = %binding.room_id,
                    participant_id = %binding.participant_id,
                    participants = room.len(),
                    "Participant left"
                );
            }
        }

        self.store.remove_room_if_empty(&binding.room_id).await;
        Ok(())
    }

    /// Transport closed. The participant stays in the room, marked as not
    /// connected, until the grace period expires or it resumes.
    pub async fn disconnect(self: &Arc<Self>, connection_id: ConnectionId) {
        let Some(binding) = self.connections.lock().await.remove(&connection_id) else {
            return;
        };

        if let Some(shared) = self.store.get_room(&binding.room_id).await {
            let mut room = shared.lock().await;
            if room.mark_disconnected(binding.participant_id, connection_id) {
                room.broadcast_snapshot();
                info!(
                    room_id = %binding.room_id,
                    participant_id = %binding.participant_id,
                    grace_secs = self.grace_period.as_secs_f32(),
                    "Participant disconnected, grace period started"
                );
            }
        }

        if self.grace_period.is_zero() {
            self.expire(&binding, connection_id).await;
            return;
        }

        // Measured from the disconnect, not from when the task first runs.
        let deadline = tokio::time::Instant::now() + self.grace_period;
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            gateway.expire(&binding, connection_id).await;
        });
    }

    async fn expire(&self, binding: &Binding, connection_id: ConnectionId) {
        if let Some(shared) = self.store.get_room(&binding.room_id).await {
            let mut room = shared.lock().await;
            if room.expire(binding.participant_id, connection_id) {
                room.broadcast_snapshot();
                info!(
                    room_id = %binding.room_id,
                    participant_id = %binding.participant_id,
                    "Disconnect grace period expired, participant removed"
                );
            }
        }
        self.store.remove_room_if_empty(&binding.room_id).await;
    }

    /// Tell every live connection the server is going away.
    pub async fn shutdown(&self) {
        for shared in self.store.rooms().await {
            shared.lock().await.broadcast(ServerMessage::ServerClosing);
        }
    }

    async fn binding(&self, connection_id: ConnectionId) -> Result<Binding, ActionError> {
        self.connections
            .lock()
            .await
            .get(&connection_id)
            .cloned()
            .ok_or(ActionError::ConnectionLost)
    }
}
