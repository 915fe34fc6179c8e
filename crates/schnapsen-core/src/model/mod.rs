pub mod card;
pub mod deck;
pub mod hand;
pub mod moves;
pub mod perspective;
pub mod rank;
pub mod suit;
