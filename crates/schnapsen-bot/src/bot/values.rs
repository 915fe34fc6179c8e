use schnapsen_core::model::card::Card;
use schnapsen_core::model::rank::Rank;

/// Trick points a card is worth when captured.
pub const fn card_value(card: Card) -> u32 {
    match card.rank {
        Rank::Ace => 11,
        Rank::Ten => 10,
        Rank::King => 4,
        Rank::Queen => 3,
        Rank::Jack => 2,
        _ => 0,
    }
}

/// Aces and tens, the cards worth fighting for or holding back.
pub const fn is_high_value(card: Card) -> bool {
    matches!(card.rank, Rank::Ace | Rank::Ten)
}
