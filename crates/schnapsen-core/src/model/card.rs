use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    pub fn is_trump(self, trump: Suit) -> bool {
        self.suit == trump
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCardError {
    Empty,
    UnknownRank(String),
    UnknownSuit(char),
}

impl fmt::Display for ParseCardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCardError::Empty => write!(f, "card text is empty"),
            ParseCardError::UnknownRank(rank) => write!(f, "unknown rank '{rank}'"),
            ParseCardError::UnknownSuit(suit) => write!(f, "unknown suit '{suit}'"),
        }
    }
}

impl std::error::Error for ParseCardError {}

impl FromStr for Card {
    type Err = ParseCardError;

    /// Parses `<rank><suit>` such as `QS`, `10H` or `A♦`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let suit_symbol = text.chars().last().ok_or(ParseCardError::Empty)?;
        let suit = Suit::from_symbol(suit_symbol.to_ascii_uppercase())
            .ok_or(ParseCardError::UnknownSuit(suit_symbol))?;
        let rank_text = &text[..text.len() - suit_symbol.len_utf8()];
        let rank = Rank::from_symbol(&rank_text.to_ascii_uppercase())
            .ok_or_else(|| ParseCardError::UnknownRank(rank_text.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

#[cfg(test)]
mod tests {
    use super::{Card, ParseCardError, Rank, Suit};

    #[test]
    fn trump_membership_follows_suit() {
        let card = Card::new(Rank::Jack, Suit::Spades);
        assert!(card.is_trump(Suit::Spades));
        assert!(!card.is_trump(Suit::Hearts));
    }

    #[test]
    fn parses_ascii_and_pip_notation() {
        assert_eq!("QS".parse::<Card>(), Ok(Card::new(Rank::Queen, Suit::Spades)));
        assert_eq!("10h".parse::<Card>(), Ok(Card::new(Rank::Ten, Suit::Hearts)));
        assert_eq!("A♦".parse::<Card>(), Ok(Card::new(Rank::Ace, Suit::Diamonds)));
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!("".parse::<Card>(), Err(ParseCardError::Empty));
        assert_eq!("QX".parse::<Card>(), Err(ParseCardError::UnknownSuit('X')));
        assert!(matches!(
            "1S".parse::<Card>(),
            Err(ParseCardError::UnknownRank(_))
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let card = Card::new(Rank::Ten, Suit::Clubs);
        assert_eq!(card.to_string(), "10C");
        assert_eq!(card.to_string().parse::<Card>(), Ok(card));
    }
}
