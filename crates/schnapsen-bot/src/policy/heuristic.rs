use super::Bot;
use crate::bot::{Decision, PolicyError, decide};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schnapsen_core::model::moves::GameMove;
use schnapsen_core::model::perspective::PlayerPerspective;
use tracing::{Level, event};

/// Rule-based player that owns its random source.
pub struct HeuristicBot<R = StdRng> {
    name: String,
    rng: R,
}

impl HeuristicBot<StdRng> {
    pub fn from_seed(name: impl Into<String>, seed: u64) -> Self {
        Self::new(name, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> HeuristicBot<R> {
    pub fn new(name: impl Into<String>, rng: R) -> Self {
        Self {
            name: name.into(),
            rng,
        }
    }

    pub fn decide<P: PlayerPerspective>(
        &mut self,
        perspective: &P,
        leader_move: Option<&P::Move>,
    ) -> Result<Decision<P::Move>, PolicyError> {
        decide(perspective, leader_move, &mut self.rng)
    }
}

impl<P, R> Bot<P> for HeuristicBot<R>
where
    P: PlayerPerspective,
    R: Rng + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(
        &mut self,
        perspective: &P,
        leader_move: Option<&P::Move>,
    ) -> Result<P::Move, PolicyError> {
        match self.decide(perspective, leader_move) {
            Ok(decision) => {
                log_play_decision(&self.name, perspective, leader_move, &decision);
                Ok(decision.chosen)
            }
            Err(err) => {
                event!(
                    target: "schnapsen_bot::play",
                    Level::WARN,
                    agent = %self.name,
                    error = %err,
                    "policy rejected turn input"
                );
                Err(err)
            }
        }
    }
}

fn log_play_decision<P: PlayerPerspective>(
    agent: &str,
    perspective: &P,
    leader_move: Option<&P::Move>,
    decision: &Decision<P::Move>,
) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }

    let legal = perspective.valid_moves();
    let legal_preview = if legal.len() <= 6 {
        legal
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join(",")
    } else {
        format!("{} moves", legal.len())
    };
    let role = if leader_move.is_some() {
        "follow"
    } else {
        "lead"
    };
    let leading = leader_move.map(describe).unwrap_or_default();

    event!(
        target: "schnapsen_bot::play",
        Level::INFO,
        agent,
        role,
        hand_size = perspective.hand().len(),
        trump = %perspective.trump_suit(),
        leading = %leading,
        legal_count = legal.len(),
        legal_moves = %legal_preview,
        chosen = %describe(&decision.chosen),
        reason = decision.reason.as_str(),
    );
}

fn describe<M: GameMove>(mv: &M) -> String {
    let cards = mv
        .cards()
        .iter()
        .map(|card| card.to_string())
        .collect::<Vec<_>>()
        .join("+");
    if mv.is_marriage() {
        format!("marriage({cards})")
    } else {
        cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::DecisionReason;
    use schnapsen_core::model::card::Card;
    use schnapsen_core::model::hand::Hand;
    use schnapsen_core::model::moves::Move;
    use schnapsen_core::model::perspective::PerspectiveSnapshot;
    use schnapsen_core::model::rank::Rank;
    use schnapsen_core::model::suit::Suit;

    fn snapshot(cards: &[Card], trump: Suit) -> PerspectiveSnapshot {
        PerspectiveSnapshot::regular_moves(Hand::with_cards(cards.to_vec()), trump)
    }

    #[test]
    fn seeded_bots_repeat_each_other() {
        let perspective = snapshot(
            &[
                Card::new(Rank::Ace, Suit::Hearts),
                Card::new(Rank::Ten, Suit::Clubs),
            ],
            Suit::Hearts,
        );
        let mut a = HeuristicBot::from_seed("a", 17);
        let mut b = HeuristicBot::from_seed("b", 17);
        for _ in 0..10 {
            let left: Move = a.get_move(&perspective, None).unwrap();
            let right: Move = b.get_move(&perspective, None).unwrap();
            assert_eq!(left, right);
        }
    }

    #[test]
    fn bot_reports_its_name_through_trait_object() {
        let bot: Box<dyn Bot<PerspectiveSnapshot>> = Box::new(HeuristicBot::from_seed("heur", 1));
        assert_eq!(bot.name(), "heur");
    }

    #[test]
    fn decide_exposes_reason() {
        let perspective = snapshot(
            &[
                Card::new(Rank::Jack, Suit::Clubs),
                Card::new(Rank::King, Suit::Diamonds),
                Card::new(Rank::Ace, Suit::Spades),
                Card::new(Rank::Ten, Suit::Hearts),
            ],
            Suit::Spades,
        );
        let mut bot = HeuristicBot::from_seed("heur", 3);
        let decision = bot.decide(&perspective, None).unwrap();
        assert_eq!(
            decision.chosen,
            Move::regular(Card::new(Rank::Jack, Suit::Clubs))
        );
        assert_eq!(decision.reason, DecisionReason::LeadShedLow);
    }

    #[test]
    fn errors_surface_unchanged() {
        let perspective = PerspectiveSnapshot::new(Hand::new(), Suit::Clubs, Vec::new());
        let mut bot = HeuristicBot::from_seed("heur", 3);
        let result: Result<Move, _> = bot.get_move(&perspective, None);
        assert!(matches!(result, Err(PolicyError::InvalidState(_))));
    }

    #[test]
    fn describe_marks_marriages() {
        assert_eq!(describe(&Move::marriage(Suit::Hearts)), "marriage(QH+KH)");
        assert_eq!(
            describe(&Move::regular(Card::new(Rank::Ten, Suit::Spades))),
            "10S"
        );
    }
}
