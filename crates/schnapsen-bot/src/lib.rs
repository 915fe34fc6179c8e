pub mod bot;
pub mod policy;

pub use bot::{
    Decision, DecisionReason, EARLY_GAME_HAND_SIZE, FollowPlanner, LeadPlanner, PolicyError,
    beats, card_value, decide, find_marriage, is_high_value, select_move,
};
pub use policy::{Bot, HeuristicBot};
