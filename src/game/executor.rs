//! Recruit and recall commands

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{SideId, UnitId, UnitTypeId};
use crate::map::hex::HexCoord;

/// A command the planner issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Recruit {
        type_id: UnitTypeId,
        leader_position: HexCoord,
    },
    Recall {
        unit: UnitId,
        leader_position: HexCoord,
    },
}

impl Command {
    pub fn recruit(type_id: UnitTypeId, leader_position: HexCoord) -> Self {
        Command::Recruit {
            type_id,
            leader_position,
        }
    }

    pub fn recall(unit: UnitId, leader_position: HexCoord) -> Self {
        Command::Recall {
            unit,
            leader_position,
        }
    }
}

/// Why the executor rejected a command
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandFailure {
    #[error("not enough gold")]
    NoGold,

    #[error("no vacant castle hex")]
    NoVacantHex,

    #[error("leader is not on a keep")]
    LeaderNotOnKeep,

    #[error("unknown unit type: {0}")]
    UnknownType(UnitTypeId),

    #[error("unit {0} is not on the recall list")]
    NotInRecallList(UnitId),

    #[error("{0}")]
    Other(String),
}

/// Performs recruits and recalls
pub trait CommandExecutor {
    /// Commit `command`; a rejected command leaves the game untouched
    fn execute(&mut self, side: SideId, command: &Command) -> Result<(), CommandFailure>;
}
