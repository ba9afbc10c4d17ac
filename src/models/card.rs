use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// One card of the estimation deck.
///
/// The deck is closed: Fibonacci points followed by T-shirt sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Card {
    Zero,
    One,
    Two,
    Three,
    Five,
    Eight,
    Thirteen,
    TwentyOne,
    ThirtyFour,
    ExtraSmall,
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl Card {
    /// Every card, in deck order.
    pub const ALL: [Card; 14] = [
        Card::Zero,
        Card::One,
        Card::Two,
        Card::Three,
        Card::Five,
        Card::Eight,
        Card::Thirteen,
        Card::TwentyOne,
        Card::ThirtyFour,
        Card::ExtraSmall,
        Card::Small,
        Card::Medium,
        Card::Large,
        Card::ExtraLarge,
    ];

    /// Canonical label shown to clients.
    pub fn as_str(self) -> &'static str {
        match self {
            Card::Zero => "0",
            Card::One => "1",
            Card::Two => "2",
            Card::Three => "3",
            Card::Five => "5",
            Card::Eight => "8",
            Card::Thirteen => "13",
            Card::TwentyOne => "21",
            Card::ThirtyFour => "34",
            Card::ExtraSmall => "XS",
            Card::Small => "S",
            Card::Medium => "M",
            Card::Large => "L",
            Card::ExtraLarge => "XL",
        }
    }

    /// Parse a client-supplied value. Case-insensitive for T-shirt sizes.
    pub fn parse(raw: &str) -> Result<Card, ActionError> {
        let wanted = raw.trim().to_ascii_uppercase();
        Card::ALL
            .into_iter()
            .find(|card| card.as_str() == wanted)
            .ok_or_else(|| ActionError::InvalidVote(raw.to_string()))
    }

    /// Whether this is a Fibonacci point card.
    pub fn is_points(self) -> bool {
        !self.is_size()
    }

    /// Whether this is a T-shirt size card.
    pub fn is_size(self) -> bool {
        matches!(
            self,
            Card::ExtraSmall | Card::Small | Card::Medium | Card::Large | Card::ExtraLarge
        )
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Card {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Raw vote as it arrives on the wire: `5` and `"5"` are both accepted.
///
/// Validation happens at the vote boundary through [`Card::parse`], so an
/// unknown value surfaces as `InvalidVote` instead of a decode error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardInput {
    Number(serde_json::Number),
    Text(String),
}

impl CardInput {
    pub fn as_raw(&self) -> String {
        match self {
            CardInput::Number(n) => n.to_string(),
            CardInput::Text(s) => s.clone(),
        }
    }
}

impl From<Card> for CardInput {
    fn from(card: Card) -> Self {
        CardInput::Text(card.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_card() {
        for card in Card::ALL {
            assert_eq!(Card::parse(card.as_str()), Ok(card));
        }
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(Card::parse(" xs "), Ok(Card::ExtraSmall));
        assert_eq!(Card::parse("xl"), Ok(Card::ExtraLarge));
        assert_eq!(Card::parse(" 13"), Ok(Card::Thirteen));
    }

    #[test]
    fn test_parse_rejects_values_outside_deck() {
        for raw in ["4", "7", "55", "-1", "XXL", "", "5.0", "coffee", "?"] {
            assert_eq!(
                Card::parse(raw),
                Err(ActionError::InvalidVote(raw.to_string())),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_deck_split() {
        assert_eq!(Card::ALL.iter().filter(|c| c.is_points()).count(), 9);
        assert_eq!(Card::ALL.iter().filter(|c| c.is_size()).count(), 5);
    }

    #[test]
    fn test_card_input_accepts_number_or_string() {
        let n: CardInput = serde_json::from_str("8").unwrap();
        assert_eq!(n.as_raw(), "8");
        let s: CardInput = serde_json::from_str("\"M\"").unwrap();
        assert_eq!(s.as_raw(), "M");
        let f: CardInput = serde_json::from_str("5.5").unwrap();
        assert!(Card::parse(&f.as_raw()).is_err());
    }

    #[test]
    fn test_card_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Card::TwentyOne).unwrap(), "\"21\"");
        assert_eq!(serde_json::to_string(&Card::Small).unwrap(), "\"S\"");
    }
}
