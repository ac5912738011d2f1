//! Attack target analysis
//!
//! For every enemy in reach, enumerate combinations of own units that could
//! move next to it this turn, each on the best hex still free. Recruitment
//! does not consume these; they are the input a combat stage would rate.

pub mod targets;

pub use targets::{analyze_targets, rate_terrain, AttackAnalysis, Movement};
