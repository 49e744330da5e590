pub mod decider;
pub mod legs;
pub mod policy;
