//! # planning-poker
//!
//! A real-time, room-based planning poker server.
//!
//! Participants join a room by name, vote with cards from a fixed deck
//! (Fibonacci points and T-shirt sizes), and reveal or reset the round
//! together. Every accepted action is broadcast as a room snapshot to all
//! participants over WebSocket.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use planning_poker::{ServerConfig, server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), planning_poker::Error> {
//!     server::run(ServerConfig::default()).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod server;

pub use config::ServerConfig;
pub use error::{ActionError, Error};
pub use models::Card;
pub use protocol::{ClientMessage, RoomSnapshot, ServerMessage};
pub use server::{Gateway, Phase, Room, SessionStore};
