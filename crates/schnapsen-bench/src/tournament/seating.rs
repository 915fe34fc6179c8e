use serde::{Deserialize, Serialize};

/// Which of the two engine seats a player occupies. `First` leads the opening trick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub const fn index(self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }

    pub const fn other(self) -> Slot {
        match self {
            Slot::First => Slot::Second,
            Slot::Second => Slot::First,
        }
    }
}

/// Side of a matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Agent,
    Opponent,
}

/// Deterministic seat orders for a two-player deal.
pub struct SeatOrders {
    orders: Vec<[Side; 2]>,
}

impl SeatOrders {
    const ALL: [[Side; 2]; 2] = [[Side::Agent, Side::Opponent], [Side::Opponent, Side::Agent]];

    pub fn new(count: usize) -> Self {
        let limit = count.min(Self::ALL.len());
        Self {
            orders: Self::ALL[..limit].to_vec(),
        }
    }

    pub fn as_slice(&self) -> &[[Side; 2]] {
        &self.orders
    }
}

/// Seat occupied by `side` under `order`.
pub fn slot_of(order: &[Side; 2], side: Side) -> Slot {
    if order[0] == side {
        Slot::First
    } else {
        Slot::Second
    }
}
