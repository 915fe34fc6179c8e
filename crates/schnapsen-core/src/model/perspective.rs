use crate::model::card::Card;
use crate::model::hand::Hand;
use crate::model::moves::{GameMove, Move};
use crate::model::suit::Suit;
use serde::{Deserialize, Serialize};

/// Read-only view of the game handed to a player on its turn.
pub trait PlayerPerspective {
    type Move: GameMove;

    /// Moves the engine accepts this turn, in engine order.
    fn valid_moves(&self) -> Vec<Self::Move>;

    fn hand(&self) -> &[Card];

    fn trump_suit(&self) -> Suit;
}

/// Owned perspective over the crate's own [`Move`] type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerspectiveSnapshot {
    hand: Hand,
    trump_suit: Suit,
    valid_moves: Vec<Move>,
}

impl PerspectiveSnapshot {
    pub fn new(hand: Hand, trump_suit: Suit, valid_moves: Vec<Move>) -> Self {
        Self {
            hand,
            trump_suit,
            valid_moves,
        }
    }

    /// Snapshot where every card in hand is playable as a regular move.
    pub fn regular_moves(hand: Hand, trump_suit: Suit) -> Self {
        let valid_moves = hand.iter().copied().map(Move::regular).collect();
        Self::new(hand, trump_suit, valid_moves)
    }

    pub fn with_move(mut self, mv: Move) -> Self {
        self.valid_moves.push(mv);
        self
    }

    pub fn moves(&self) -> &[Move] {
        &self.valid_moves
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl PlayerPerspective for PerspectiveSnapshot {
    type Move = Move;

    fn valid_moves(&self) -> Vec<Move> {
        self.valid_moves.clone()
    }

    fn hand(&self) -> &[Card] {
        self.hand.cards()
    }

    fn trump_suit(&self) -> Suit {
        self.trump_suit
    }
}
