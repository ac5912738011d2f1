//! In-memory game implementing every collaborator trait
//!
//! Used by the integration tests and the `recruit_sim` runner.

pub mod game;
pub mod map;

pub use game::SandboxGame;
pub use map::SandboxMap;
