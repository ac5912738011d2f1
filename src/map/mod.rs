//! Map geometry and the spatial oracle the planner reads the board through
//!
//! The planner never owns the map. Everything it needs (board extent,
//! terrain, villages, castles, movement costs) comes from a `SpatialOracle`.

pub mod cost_map;
pub mod hex;
pub mod terrain;

pub use cost_map::{movement_costs_from, CostMap};
pub use hex::{HexCoord, NEIGHBOR_OFFSETS};
pub use terrain::{Terrain, TerrainHistogram};

use crate::core::types::SideId;
use crate::units::catalog::{UnitType, UNREACHABLE};

/// Read-only view of the map
pub trait SpatialOracle {
    /// All on-board hexes
    fn tiles(&self) -> Vec<HexCoord>;

    fn on_board(&self, hex: HexCoord) -> bool;

    fn terrain_at(&self, hex: HexCoord) -> Option<Terrain>;

    /// Owner of the village at `hex`, `None` for neutral villages
    fn village_owner(&self, hex: HexCoord) -> Option<SideId>;

    fn villages(&self) -> Vec<HexCoord> {
        self.tiles()
            .into_iter()
            .filter(|hex| self.terrain_at(*hex).is_some_and(|t| t.is_village()))
            .collect()
    }

    /// On-board hexes within `radius` of `center`, center included
    fn tiles_in_radius(&self, center: HexCoord, radius: u32) -> Vec<HexCoord> {
        center
            .hexes_in_range(radius)
            .into_iter()
            .filter(|hex| self.on_board(*hex))
            .collect()
    }

    /// On-board neighbors of `hex`
    fn adjacent_tiles(&self, hex: HexCoord) -> Vec<HexCoord> {
        hex.neighbors()
            .into_iter()
            .filter(|n| self.on_board(*n))
            .collect()
    }

    fn is_keep(&self, hex: HexCoord) -> bool {
        self.terrain_at(hex).is_some_and(|t| t.is_keep())
    }

    fn is_castle(&self, hex: HexCoord) -> bool {
        self.terrain_at(hex).is_some_and(|t| t.is_castle())
    }

    /// Movement points `unit_type` spends to enter `hex`
    fn movement_cost(&self, unit_type: &UnitType, hex: HexCoord) -> u32 {
        self.terrain_at(hex)
            .map(|t| unit_type.movement_cost(t))
            .unwrap_or(UNREACHABLE)
    }
}
