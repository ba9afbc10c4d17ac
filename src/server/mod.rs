//! Planning poker server.
//!
//! Provides WebSocket-based multi-room voting sessions.

mod gateway;
mod room;
mod server;
mod store;

pub use gateway::{Action, Gateway, Joined};
pub use room::{ConnectionId, Outbox, Participant, ParticipantId, Phase, ResumeToken, Room};
pub use server::{run, serve};
pub use store::{SessionStore, SharedRoom};
