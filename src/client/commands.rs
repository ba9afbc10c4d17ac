//! Client command parser.
//!
//! Turns stdin lines like `vote 5` or `reveal` into commands.

use crate::models::{Card, CardInput};
use crate::protocol::ClientMessage;

/// A parsed user command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Send a message to the server.
    Send(ClientMessage),
    /// Print the deck.
    Cards,
    /// Print usage.
    Help,
    /// Disconnect and exit.
    Quit,
}

/// Parse one line of input. Empty input yields `Ok(None)`.
pub fn parse_command(input: &str) -> Result<Option<Command>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some((command, args)) = parts.split_first() else {
        return Ok(None);
    };

    let command = match command.to_lowercase().as_str() {
        "vote" | "v" => cmd_vote(args)?,
        "reveal" | "r" => Command::Send(ClientMessage::Reveal),
        "reset" => Command::Send(ClientMessage::Reset),
        "leave" => Command::Send(ClientMessage::Leave),
        "cards" => Command::Cards,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        // A bare card value is shorthand for `vote <card>`.
        other if Card::parse(other).is_ok() => cmd_vote(&parts)?,
        other => {
            return Err(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                other
            ));
        }
    };

    Ok(Some(command))
}

fn cmd_vote(args: &[&str]) -> Result<Command, String> {
    let Some(value) = args.first() else {
        return Err("Usage: vote <card>".to_string());
    };
    // Validated server-side; checking here only gives a faster hint.
    let card = Card::parse(value).map_err(|e| e.to_string())?;
    Ok(Command::Send(ClientMessage::Vote {
        value: CardInput::from(card),
    }))
}

/// Deck listing for the `cards` command.
pub fn cards_help() -> String {
    let labels = |keep: fn(Card) -> bool| -> String {
        Card::ALL
            .into_iter()
            .filter(|c| keep(*c))
            .map(Card::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "Points: {}\nSizes:  {}",
        labels(Card::is_points),
        labels(Card::is_size)
    )
}

pub const HELP: &str = r#"Available commands:
  vote <card>    - Cast or change your vote (or just type the card)
  reveal         - Show everyone's votes
  reset          - Clear votes and start a new round
  cards          - List the deck
  leave          - Leave the room
  quit/exit      - Disconnect
  help/?         - Show this help"#;
