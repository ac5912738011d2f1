//! Turn-based game state as seen by the planner

use serde::{Deserialize, Serialize};

use crate::core::types::{Gold, SideId, UnitId, UnitTypeId};
use crate::map::hex::HexCoord;

/// A unit standing on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardUnit {
    pub id: UnitId,
    pub side: SideId,
    pub type_id: UnitTypeId,
    pub position: HexCoord,
    pub hitpoints: u32,
    pub max_hitpoints: u32,
    pub cost: Gold,
    pub level: u32,
    /// Total movement points
    pub movement: u32,
    /// Leaders can recruit
    pub can_recruit: bool,
    pub attacks_left: bool,
    /// Petrified and similar; such units neither fight nor count
    pub incapacitated: bool,
}

impl BoardUnit {
    /// Cost weighted by remaining health
    pub fn value(&self) -> f64 {
        if self.max_hitpoints == 0 {
            return 0.0;
        }
        self.cost as f64 * self.hitpoints as f64 / self.max_hitpoints as f64
    }
}

/// A leader that may recruit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderInfo {
    /// Stable name used by job leader filters and ratio score overrides
    pub id: String,
    pub unit: UnitId,
    pub side: SideId,
    pub position: HexCoord,
    /// Types only this leader can recruit
    pub extra_recruits: Vec<UnitTypeId>,
    /// Type/usage tokens this leader may recall; empty allows everything
    pub recall_filter: Vec<String>,
}

/// An individual on the recall list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallUnit {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub experience: u32,
    pub max_experience: u32,
}

/// Mutable game state the planner reads
///
/// Commands against it go through a `CommandExecutor`.
pub trait GameLedger {
    fn gold(&self, side: SideId) -> Gold;

    fn base_income(&self, side: SideId) -> Gold;

    /// Sum of levels of units that need upkeep
    fn upkeep(&self, side: SideId) -> Gold;

    /// Faction-wide recruit list
    fn recruits(&self, side: SideId) -> Vec<UnitTypeId>;

    fn recall_list(&self, side: SideId) -> Vec<RecallUnit>;

    fn recall_cost(&self, side: SideId) -> Gold;

    fn sides(&self) -> Vec<SideId>;

    fn is_enemy(&self, side: SideId, other: SideId) -> bool;

    fn units(&self) -> Vec<BoardUnit>;

    fn leaders(&self, side: SideId) -> Vec<LeaderInfo>;

    /// Free castle hexes connected to the keep at `keep`
    fn vacant_castle_hexes(&self, keep: HexCoord) -> usize;

    fn unit_at(&self, hex: HexCoord) -> Option<BoardUnit> {
        self.units().into_iter().find(|u| u.position == hex)
    }

    /// Sides allied with `side`, `side` included
    fn allies(&self, side: SideId) -> Vec<SideId> {
        self.sides()
            .into_iter()
            .filter(|other| !self.is_enemy(side, *other))
            .collect()
    }

    fn enemies(&self, side: SideId) -> Vec<SideId> {
        self.sides()
            .into_iter()
            .filter(|other| self.is_enemy(side, *other))
            .collect()
    }
}
