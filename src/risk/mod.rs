pub mod score;
pub mod sizing;
