//! Collaborators the planner consumes: game state, command execution,
//! change signals and recruitment instructions

pub mod executor;
pub mod instructions;
pub mod ledger;
pub mod observer;

pub use executor::{Command, CommandExecutor, CommandFailure};
pub use instructions::{types_match, InstructionAspect, Job, Limit, StaticInstructions};
pub use ledger::{BoardUnit, GameLedger, LeaderInfo, RecallUnit};
pub use observer::{ChangeObserver, ChangeSignals};
