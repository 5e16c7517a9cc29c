pub mod health;
pub mod rooms;
pub mod score;
pub mod turns;
