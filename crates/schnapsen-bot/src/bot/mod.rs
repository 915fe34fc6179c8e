mod follow;
mod lead;
mod values;

pub use follow::{FollowPlanner, beats};
pub use lead::{EARLY_GAME_HAND_SIZE, LeadPlanner};
pub use values::{card_value, is_high_value};

use rand::Rng;
use rand::seq::SliceRandom;
use schnapsen_core::model::card::Card;
use schnapsen_core::model::moves::GameMove;
use schnapsen_core::model::perspective::PlayerPerspective;
use thiserror::Error;

/// Input contract violations; the engine is expected never to produce them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid game state: {0}")]
    InvalidState(&'static str),
    #[error("malformed move {0}: no effective card")]
    MalformedMove(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    Marriage,
    LeadShedLow,
    LeadRandom,
    FollowCheapestLoser,
    FollowContestValuable,
    FollowSaveHigh,
    FollowAnyWinner,
}

impl DecisionReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            DecisionReason::Marriage => "marriage",
            DecisionReason::LeadShedLow => "lead_shed_low",
            DecisionReason::LeadRandom => "lead_random",
            DecisionReason::FollowCheapestLoser => "follow_cheapest_loser",
            DecisionReason::FollowContestValuable => "follow_contest_valuable",
            DecisionReason::FollowSaveHigh => "follow_save_high",
            DecisionReason::FollowAnyWinner => "follow_any_winner",
        }
    }
}

/// A chosen move together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<M> {
    pub chosen: M,
    pub reason: DecisionReason,
}

impl<M> Decision<M> {
    pub fn new(chosen: M, reason: DecisionReason) -> Self {
        Self { chosen, reason }
    }
}

/// Picks one move for the current turn.
///
/// `leader_move` is `None` when this player leads the trick. Randomised
/// branches draw from `rng` only; identical inputs and rng state yield the
/// same move.
pub fn select_move<P, R>(
    perspective: &P,
    leader_move: Option<&P::Move>,
    rng: &mut R,
) -> Result<P::Move, PolicyError>
where
    P: PlayerPerspective,
    R: Rng + ?Sized,
{
    decide(perspective, leader_move, rng).map(|decision| decision.chosen)
}

/// Same as [`select_move`] but also reports which rule fired.
pub fn decide<P, R>(
    perspective: &P,
    leader_move: Option<&P::Move>,
    rng: &mut R,
) -> Result<Decision<P::Move>, PolicyError>
where
    P: PlayerPerspective,
    R: Rng + ?Sized,
{
    let moves = perspective.valid_moves();
    if moves.is_empty() {
        return Err(PolicyError::InvalidState("no valid moves offered"));
    }

    if let Some(marriage) = find_marriage(&moves) {
        return Ok(Decision::new(marriage.clone(), DecisionReason::Marriage));
    }

    let leading_card = leader_move.map(effective_card).transpose()?;
    let trump = perspective.trump_suit();
    match leading_card {
        None => LeadPlanner::choose(perspective.hand().len(), trump, &moves, rng),
        Some(leading) => FollowPlanner::choose(leading, trump, &moves, rng),
    }
}

/// First marriage in engine order, if any.
pub fn find_marriage<M: GameMove>(moves: &[M]) -> Option<&M> {
    moves.iter().find(|mv| mv.is_marriage())
}

pub(crate) fn effective_card<M: GameMove>(mv: &M) -> Result<Card, PolicyError> {
    mv.effective_card()
        .ok_or_else(|| PolicyError::MalformedMove(format!("{mv:?}")))
}

/// First move with the lowest card value; ties keep engine order.
pub(crate) fn cheapest<'a, M: GameMove>(
    moves: impl IntoIterator<Item = &'a M>,
) -> Result<Option<&'a M>, PolicyError> {
    let mut best: Option<(&M, u32)> = None;
    for mv in moves {
        let value = card_value(effective_card(mv)?);
        if best.is_none_or(|(_, lowest)| value < lowest) {
            best = Some((mv, value));
        }
    }
    Ok(best.map(|(mv, _)| mv))
}

pub(crate) fn pick_uniform<M: Clone, R: Rng + ?Sized>(
    moves: &[M],
    rng: &mut R,
) -> Result<M, PolicyError> {
    moves
        .choose(rng)
        .cloned()
        .ok_or(PolicyError::InvalidState("random choice over an empty move set"))
}
