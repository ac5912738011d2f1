//! Recruitment planning
//!
//! Architecture: analysis pipeline + candidate action
//! - `important_hexes` finds the contested ground
//! - `terrain_profile` and `combat` score unit types on it
//! - `blend` turns those terms into one distribution per leader
//! - `economy` decides whether to spend at all
//! - `allocation` spends, leader by leader, unit by unit
//! - `engine::RecruitmentEngine` ties it together behind `CandidateAction`

pub mod allocation;
pub mod blend;
pub mod combat;
pub mod economy;
pub mod engine;
pub mod equilibrium;
pub mod important_hexes;
pub mod plan;
pub mod terrain_profile;

pub use allocation::{AllocationPlanner, AllocationReport, StopReason};
pub use blend::ScoreBlender;
pub use combat::{CombatSimulator, CombatValueCache};
pub use economy::{EconomicState, EconomySnapshot, EconomyTracker};
pub use engine::{RecruitmentEngine, RecruitmentPlan, RECRUITMENT_SCORE};
pub use equilibrium::{find_equilibrium, EffectivenessTable};
pub use important_hexes::{compute_important_hexes, ImportantHexes};
pub use plan::{LeaderPlan, ScoreMap};
pub use terrain_profile::TerrainProfile;

use crate::core::types::{Score, SideId};
use crate::game::executor::CommandExecutor;
use crate::game::ledger::GameLedger;
use crate::map::SpatialOracle;
use crate::units::catalog::UnitCatalog;

/// Everything a planner reads: map, unit types and game state
pub trait GameView: SpatialOracle + UnitCatalog + GameLedger {}

impl<T: SpatialOracle + UnitCatalog + GameLedger> GameView for T {}

/// An AI decision that can be scored and then carried out
///
/// The scheduler calls `evaluate` and, if the score wins, `execute`. A
/// `Score::BAD` evaluation means "nothing to do this turn".
pub trait CandidateAction<W: GameView + CommandExecutor> {
    type Report;

    fn evaluate(&mut self, world: &W) -> Score;

    /// Run one planning cycle; may stop early when the game changes under it
    fn execute(&mut self, world: &mut W) -> Self::Report;
}

/// Read-only collaborators for one side, as trait objects
///
/// Analysis stages take this instead of a generic world so they can be
/// tested against any mix of oracle, catalog and ledger.
#[derive(Clone, Copy)]
pub struct PlanningContext<'a> {
    pub side: SideId,
    pub map: &'a dyn SpatialOracle,
    pub catalog: &'a dyn UnitCatalog,
    pub ledger: &'a dyn GameLedger,
}

impl<'a> PlanningContext<'a> {
    pub fn new<W: GameView>(side: SideId, world: &'a W) -> Self {
        Self {
            side,
            map: world,
            catalog: world,
            ledger: world,
        }
    }
}
