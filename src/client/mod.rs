//! Planning poker terminal client.
//!
//! A line-oriented WebSocket client for driving a room by hand.

mod client;
mod commands;
mod state;

pub use client::run;
pub use commands::{Command, parse_command};
pub use state::{ClientSession, format_snapshot};
