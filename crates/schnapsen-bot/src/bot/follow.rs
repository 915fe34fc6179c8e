use super::{
    Decision, DecisionReason, PolicyError, card_value, cheapest, effective_card, is_high_value,
    pick_uniform,
};
use rand::Rng;
use schnapsen_core::model::card::Card;
use schnapsen_core::model::moves::GameMove;
use schnapsen_core::model::suit::Suit;

pub struct FollowPlanner;

impl FollowPlanner {
    /// Answers `leading`: dump the cheapest card when nothing wins, fight
    /// for aces and tens with any winner, and otherwise win without
    /// spending an ace or ten when possible.
    pub fn choose<M, R>(
        leading: Card,
        trump: Suit,
        moves: &[M],
        rng: &mut R,
    ) -> Result<Decision<M>, PolicyError>
    where
        M: GameMove,
        R: Rng + ?Sized,
    {
        let mut winners = Vec::new();
        let mut thrifty = Vec::new();
        for mv in moves.iter().filter(|mv| !mv.is_marriage()) {
            let card = effective_card(mv)?;
            if beats(card, leading, trump) {
                if !is_high_value(card) {
                    thrifty.push(mv.clone());
                }
                winners.push(mv.clone());
            }
        }

        if winners.is_empty() {
            // Marriages stay in the pool here.
            let chosen = cheapest(moves)?
                .ok_or(PolicyError::InvalidState("no valid moves offered"))?;
            return Ok(Decision::new(
                chosen.clone(),
                DecisionReason::FollowCheapestLoser,
            ));
        }

        if is_high_value(leading) {
            let chosen = pick_uniform(&winners, rng)?;
            return Ok(Decision::new(chosen, DecisionReason::FollowContestValuable));
        }

        if !thrifty.is_empty() {
            let chosen = pick_uniform(&thrifty, rng)?;
            return Ok(Decision::new(chosen, DecisionReason::FollowSaveHigh));
        }

        let chosen = pick_uniform(&winners, rng)?;
        Ok(Decision::new(chosen, DecisionReason::FollowAnyWinner))
    }
}

/// Whether `card` takes a trick led with `leading`: a higher-valued card of
/// the led suit, or any trump against a non-trump lead.
pub fn beats(card: Card, leading: Card, trump: Suit) -> bool {
    if card.suit == leading.suit {
        return card_value(card) > card_value(leading);
    }
    card.is_trump(trump) && !leading.is_trump(trump)
}
