mod heuristic;

pub use heuristic::HeuristicBot;

use crate::bot::PolicyError;
use schnapsen_core::model::perspective::PlayerPerspective;

/// A player the engine can ask for moves.
pub trait Bot<P: PlayerPerspective>: Send {
    fn name(&self) -> &str;

    /// Choose this turn's move. `leader_move` is `None` when leading.
    fn get_move(
        &mut self,
        perspective: &P,
        leader_move: Option<&P::Move>,
    ) -> Result<P::Move, PolicyError>;
}

impl<P: PlayerPerspective, B: Bot<P> + ?Sized> Bot<P> for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get_move(
        &mut self,
        perspective: &P,
        leader_move: Option<&P::Move>,
    ) -> Result<P::Move, PolicyError> {
        (**self).get_move(perspective, leader_move)
    }
}
