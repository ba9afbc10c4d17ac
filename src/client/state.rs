//! Client state management.

use std::fmt::Write;

use uuid::Uuid;

use crate::protocol::{RoomSnapshot, ServerMessage};
use crate::server::Phase;

/// Error codes that mean our `Join` was refused.
const JOIN_FAILURES: [&str; 5] = [
    "invalid_room_id",
    "invalid_name",
    "room_full",
    "too_many_rooms",
    "room_not_found",
];

/// What the client knows about its session.
#[derive(Debug, Default)]
pub struct ClientSession {
    /// Our participant id while joined on the current connection.
    pub participant_id: Option<Uuid>,
    /// Sent back in `Join` after a dropped connection to reclaim our seat.
    pub resume_token: Option<Uuid>,
    pub room_id: Option<String>,
    /// Our own card this round, as confirmed by the server.
    pub my_vote: Option<String>,
    /// Set when the server closed or rejected the join.
    pub closed: Option<String>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a server message and return the text to print, if any.
    pub fn apply(&mut self, msg: ServerMessage) -> Option<String> {
        match msg {
            ServerMessage::ConnectionAck => None,
            ServerMessage::Joined {
                room_id,
                participant_id,
                resume_token,
                resumed,
            } => {
                let verb = if resumed { "Rejoined" } else { "Joined" };
                let line = format!("{} room {} as {}", verb, room_id, participant_id);
                if !resumed {
                    self.my_vote = None;
                }
                self.participant_id = Some(participant_id);
                self.resume_token = Some(resume_token);
                self.room_id = Some(room_id);
                Some(line)
            }
            ServerMessage::VoteAccepted { value } => {
                let line = format!("You selected: {}", value);
                self.my_vote = Some(value);
                Some(line)
            }
            ServerMessage::RoomSnapshot(snapshot) => {
                let me = snapshot
                    .participants
                    .iter()
                    .find(|p| Some(p.id) == self.participant_id);
                if me.is_some_and(|p| !p.has_voted) {
                    self.my_vote = None;
                }
                let mut text = format_snapshot(&snapshot, self.participant_id);
                if let (Phase::Collecting, Some(card)) = (snapshot.phase, &self.my_vote) {
                    let _ = write!(text, "\nYour card: {}", card);
                }
                Some(text)
            }
            ServerMessage::ActionError { code, reason } => {
                if self.participant_id.is_none() && JOIN_FAILURES.contains(&code.as_str()) {
                    self.closed = Some(reason.clone());
                }
                Some(format!("Error ({}): {}", code, reason))
            }
            ServerMessage::ServerClosing => {
                self.closed = Some("Server is shutting down".to_string());
                Some("Server is shutting down".to_string())
            }
        }
    }

    /// Forget the room after an explicit leave.
    pub fn left(&mut self) {
        self.participant_id = None;
        self.resume_token = None;
        self.room_id = None;
        self.my_vote = None;
    }

    /// The connection dropped. Keep the resume token; the next `Joined`
    /// tells us whether the seat survived.
    pub fn dropped(&mut self) {
        self.participant_id = None;
    }

    /// Whether a dropped connection should be re-established.
    pub fn can_resume(&self) -> bool {
        self.resume_token.is_some() && self.closed.is_none()
    }
}

/// Render a snapshot as a plain text table.
pub fn format_snapshot(snapshot: &RoomSnapshot, me: Option<Uuid>) -> String {
    let mut out = String::new();
    let voted = snapshot.participants.iter().filter(|p| p.has_voted).count();
    let _ = writeln!(
        out,
        "Room {} [{}] {}/{} voted",
        snapshot.room_id,
        snapshot.phase,
        voted,
        snapshot.participants.len()
    );

    for p in &snapshot.participants {
        let vote = match (&p.vote, p.has_voted, snapshot.phase) {
            (Some(v), _, _) => v.clone(),
            (None, true, Phase::Collecting) => "voted".to_string(),
            (None, _, _) => "-".to_string(),
        };
        let marker = if Some(p.id) == me { "*" } else { " " };
        let status = if p.connected { "" } else { " (away)" };
        let _ = writeln!(out, "{} {:<20} {}{}", marker, p.name, vote, status);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParticipantView;
    use chrono::Utc;

    fn view(name: &str, has_voted: bool, vote: Option<&str>) -> ParticipantView {
        ParticipantView {
            id: Uuid::new_v4(),
            name: name.to_string(),
            has_voted,
            vote: vote.map(str::to_string),
            connected: true,
        }
    }

    fn snapshot(phase: Phase, participants: Vec<ParticipantView>) -> RoomSnapshot {
        RoomSnapshot {
            room_id: "team-x".to_string(),
            phase,
            created_at: Utc::now(),
            participants,
        }
    }

    #[test]
    fn test_format_collecting() {
        let s = snapshot(
            Phase::Collecting,
            vec![view("Alice", true, None), view("Bob", false, None)],
        );
        let text = format_snapshot(&s, Some(s.participants[0].id));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Room team-x [collecting] 1/2 voted");
        assert!(lines[1].starts_with("* Alice"));
        assert!(lines[1].ends_with("voted"));
        assert!(lines[2].ends_with("-"));
    }

    #[test]
    fn test_format_revealed() {
        let s = snapshot(
            Phase::Revealed,
            vec![view("Alice", true, Some("5")), view("Bob", true, Some("8"))],
        );
        let text = format_snapshot(&s, None);
        assert!(text.contains("[revealed]"));
        assert!(text.lines().nth(1).unwrap().ends_with("5"));
        assert!(text.lines().nth(2).unwrap().ends_with("8"));
    }

    #[test]
    fn test_apply_tracks_join_and_closing() {
        let mut session = ClientSession::new();
        let id = Uuid::new_v4();
        let line = session
            .apply(ServerMessage::Joined {
                room_id: "team-x".to_string(),
                participant_id: id,
                resume_token: Uuid::new_v4(),
                resumed: false,
            })
            .unwrap();
        assert!(line.starts_with("Joined room team-x"));
        assert_eq!(session.participant_id, Some(id));
        assert!(session.can_resume());

        session.apply(ServerMessage::ActionError {
            code: "invalid_vote".to_string(),
            reason: "nope".to_string(),
        });
        assert!(session.closed.is_none());

        session.apply(ServerMessage::ServerClosing);
        assert!(session.closed.is_some());
    }

    #[test]
    fn test_rejected_join_closes_session() {
        let mut session = ClientSession::new();
        session.apply(ServerMessage::ActionError {
            code: "invalid_room_id".to_string(),
            reason: "room id cannot be empty".to_string(),
        });
        assert_eq!(session.closed.as_deref(), Some("room id cannot be empty"));
    }

    #[test]
    fn test_own_card_survives_reconnect() {
        let mut session = ClientSession::new();
        let id = Uuid::new_v4();
        let token = Uuid::new_v4();
        let joined = |resumed| ServerMessage::Joined {
            room_id: "team-x".to_string(),
            participant_id: id,
            resume_token: token,
            resumed,
        };
        let mut me = view("Alice", true, None);
        me.id = id;

        session.apply(joined(false));
        let line = session
            .apply(ServerMessage::VoteAccepted {
                value: "8".to_string(),
            })
            .unwrap();
        assert_eq!(line, "You selected: 8");
        let text = session
            .apply(ServerMessage::RoomSnapshot(snapshot(
                Phase::Collecting,
                vec![me.clone()],
            )))
            .unwrap();
        assert!(text.ends_with("Your card: 8"));

        session.dropped();
        assert!(session.participant_id.is_none());
        assert_eq!(session.resume_token, Some(token));
        assert!(session.can_resume());

        session.apply(joined(true));
        assert_eq!(session.my_vote.as_deref(), Some("8"));

        me.has_voted = false;
        session.apply(ServerMessage::RoomSnapshot(snapshot(
            Phase::Collecting,
            vec![me],
        )));
        assert!(session.my_vote.is_none());

        session.left();
        assert!(!session.can_resume());
    }

    #[test]
    fn test_rejected_rejoin_closes_session() {
        let mut session = ClientSession::new();
        session.apply(ServerMessage::Joined {
            room_id: "team-x".to_string(),
            participant_id: Uuid::new_v4(),
            resume_token: Uuid::new_v4(),
            resumed: false,
        });
        session.dropped();
        session.apply(ServerMessage::ActionError {
            code: "room_full".to_string(),
            reason: "room team-x is full".to_string(),
        });
        assert!(session.closed.is_some());
        assert!(!session.can_resume());
    }
}
