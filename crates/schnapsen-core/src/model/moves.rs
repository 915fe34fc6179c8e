use crate::model::card::Card;
use crate::model::rank::Rank;
use crate::model::suit::Suit;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Capability a policy needs from an engine's move type.
///
/// `cards()` is ordered with the card that takes part in the trick first.
/// Implementations outside this crate may hand out moves without cards;
/// consumers treat those as malformed.
pub trait GameMove: Clone + fmt::Debug {
    fn is_marriage(&self) -> bool;

    fn cards(&self) -> Vec<Card>;

    fn effective_card(&self) -> Option<Card> {
        self.cards().first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Move {
    /// Plays a single card.
    Regular { card: Card },
    /// Declares king and queen of one suit; the queen is played to the trick.
    Marriage { queen: Card, king: Card },
    /// Swaps the trump jack for the face-up trump card.
    TrumpExchange { jack: Card },
}

impl Move {
    pub const fn regular(card: Card) -> Self {
        Move::Regular { card }
    }

    pub const fn marriage(suit: Suit) -> Self {
        Move::Marriage {
            queen: Card::new(Rank::Queen, suit),
            king: Card::new(Rank::King, suit),
        }
    }

    pub const fn trump_exchange(trump: Suit) -> Self {
        Move::TrumpExchange {
            jack: Card::new(Rank::Jack, trump),
        }
    }

    pub const fn is_regular(&self) -> bool {
        matches!(self, Move::Regular { .. })
    }

    pub const fn is_trump_exchange(&self) -> bool {
        matches!(self, Move::TrumpExchange { .. })
    }

    /// The card whose suit and rank decide the trick.
    pub const fn played_card(&self) -> Card {
        match *self {
            Move::Regular { card } => card,
            Move::Marriage { queen, .. } => queen,
            Move::TrumpExchange { jack } => jack,
        }
    }
}

impl GameMove for Move {
    fn is_marriage(&self) -> bool {
        matches!(self, Move::Marriage { .. })
    }

    fn cards(&self) -> Vec<Card> {
        match *self {
            Move::Regular { card } => vec![card],
            Move::Marriage { queen, king } => vec![queen, king],
            Move::TrumpExchange { jack } => vec![jack],
        }
    }

    fn effective_card(&self) -> Option<Card> {
        Some(self.played_card())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Regular { card } => write!(f, "{card}"),
            Move::Marriage { queen, king } => write!(f, "marriage({queen}+{king})"),
            Move::TrumpExchange { jack } => write!(f, "exchange({jack})"),
        }
    }
}

impl From<Card> for Move {
    fn from(card: Card) -> Self {
        Move::regular(card)
    }
}
