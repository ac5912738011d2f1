//! Muster - strategic recruitment planner for turn-based hex strategy AI

pub mod attack;
pub mod core;
pub mod game;
pub mod map;
pub mod recruit;
pub mod sandbox;
pub mod units;
