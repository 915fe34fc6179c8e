use super::{
    Decision, DecisionReason, PolicyError, cheapest, effective_card, is_high_value, pick_uniform,
};
use rand::Rng;
use schnapsen_core::model::moves::GameMove;
use schnapsen_core::model::suit::Suit;

/// Hands larger than this still count as early game.
pub const EARLY_GAME_HAND_SIZE: usize = 3;

pub struct LeadPlanner;

impl LeadPlanner {
    /// Early on, lead the cheapest plain card that is neither trump nor an
    /// ace or ten. Otherwise any legal move, uniformly at random.
    pub fn choose<M, R>(
        hand_size: usize,
        trump: Suit,
        moves: &[M],
        rng: &mut R,
    ) -> Result<Decision<M>, PolicyError>
    where
        M: GameMove,
        R: Rng + ?Sized,
    {
        if hand_size > EARLY_GAME_HAND_SIZE {
            let mut sheddable = Vec::with_capacity(moves.len());
            for mv in moves.iter().filter(|mv| !mv.is_marriage()) {
                let card = effective_card(mv)?;
                if !card.is_trump(trump) && !is_high_value(card) {
                    sheddable.push(mv);
                }
            }
            if let Some(mv) = cheapest(sheddable)? {
                return Ok(Decision::new(mv.clone(), DecisionReason::LeadShedLow));
            }
        }

        let chosen = pick_uniform(moves, rng)?;
        Ok(Decision::new(chosen, DecisionReason::LeadRandom))
    }
}

#[cfg(test)]
mod tests {
    use super::LeadPlanner;
    use crate::bot::DecisionReason;
    use crate::bot::test_support::card;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use schnapsen_core::model::moves::Move;
    use schnapsen_core::model::suit::Suit;
    use std::collections::HashMap;

    fn regular(cards: &[&str]) -> Vec<Move> {
        cards.iter().map(|text| Move::regular(card(text))).collect()
    }

    #[test]
    fn early_game_sheds_cheapest_plain_card() {
        let moves = regular(&["AC", "KC", "JD", "QS", "JH"]);
        let mut rng = StdRng::seed_from_u64(5);
        let decision = LeadPlanner::choose(5, Suit::Hearts, &moves, &mut rng).unwrap();
        assert_eq!(decision.chosen, Move::regular(card("JD")));
        assert_eq!(decision.reason, DecisionReason::LeadShedLow);
    }

    #[test]
    fn early_game_tie_keeps_engine_order() {
        let moves = regular(&["QC", "JS", "JD", "AH"]);
        let mut rng = StdRng::seed_from_u64(6);
        let decision = LeadPlanner::choose(4, Suit::Hearts, &moves, &mut rng).unwrap();
        assert_eq!(decision.chosen, Move::regular(card("JS")));
    }

    #[test]
    fn early_game_ignores_trump_and_high_cards() {
        let moves = regular(&["AC", "10D", "JH", "QH"]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let decision = LeadPlanner::choose(4, Suit::Hearts, &moves, &mut rng).unwrap();
            assert_eq!(decision.reason, DecisionReason::LeadRandom);
            assert!(moves.contains(&decision.chosen));
        }
    }

    #[test]
    fn early_game_skips_marriages_when_shedding() {
        let moves = vec![
            Move::marriage(Suit::Clubs),
            Move::regular(card("KD")),
            Move::regular(card("AS")),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let decision = LeadPlanner::choose(5, Suit::Spades, &moves, &mut rng).unwrap();
        assert_eq!(decision.chosen, Move::regular(card("KD")));
    }

    #[test]
    fn late_game_draws_from_every_move() {
        let moves = regular(&["JD", "AH", "10H"]);
        let mut rng = StdRng::seed_from_u64(8);
        let mut counts: HashMap<Move, usize> = HashMap::new();
        let trials = 6_000;
        for _ in 0..trials {
            let decision = LeadPlanner::choose(3, Suit::Hearts, &moves, &mut rng).unwrap();
            assert_eq!(decision.reason, DecisionReason::LeadRandom);
            *counts.entry(decision.chosen).or_default() += 1;
        }
        assert_eq!(counts.len(), moves.len());
        let expected = trials as f64 / moves.len() as f64;
        for count in counts.values() {
            assert!((*count as f64 - expected).abs() < expected * 0.1, "{counts:?}");
        }
    }
}
