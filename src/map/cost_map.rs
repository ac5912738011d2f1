//! Multi-source movement cost fields
//!
//! A `CostMap` accumulates, for every hex, the movement cost of each unit
//! added to it. The average over all units that can reach a hex tells how
//! "close" a side is to it; comparing the averages of two sides finds the
//! frontier between them. Zones of control are ignored.

use ahash::AHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::map::hex::HexCoord;
use crate::map::SpatialOracle;
use crate::units::catalog::{UnitType, UNREACHABLE};

/// Node in the Dijkstra open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CostNode {
    coord: HexCoord,
    cost: u32,
}

impl Ord for CostNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap, coordinate as tie-break for determinism
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for CostNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest movement cost from `origin` to every reachable hex
///
/// The origin itself costs 0. With `budget`, hexes costing more are left out.
pub fn movement_costs_from<O: SpatialOracle + ?Sized>(
    oracle: &O,
    origin: HexCoord,
    unit_type: &UnitType,
    budget: Option<u32>,
) -> AHashMap<HexCoord, u32> {
    let mut costs: AHashMap<HexCoord, u32> = AHashMap::new();
    if !oracle.on_board(origin) {
        return costs;
    }

    let mut open_set = BinaryHeap::new();
    costs.insert(origin, 0);
    open_set.push(CostNode {
        coord: origin,
        cost: 0,
    });

    while let Some(current) = open_set.pop() {
        if costs.get(&current.coord).is_some_and(|c| *c < current.cost) {
            continue;
        }

        for neighbor in oracle.adjacent_tiles(current.coord) {
            let step = oracle.movement_cost(unit_type, neighbor);
            if step >= UNREACHABLE {
                continue;
            }

            let tentative = current.cost + step;
            if budget.is_some_and(|b| tentative > b) {
                continue;
            }

            let known = costs.get(&neighbor).copied().unwrap_or(u32::MAX);
            if tentative < known {
                costs.insert(neighbor, tentative);
                open_set.push(CostNode {
                    coord: neighbor,
                    cost: tentative,
                });
            }
        }
    }

    costs
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CostCell {
    sum: f64,
    count: u32,
}

/// Accumulated movement cost field of one side
#[derive(Debug, Clone, Default)]
pub struct CostMap {
    cells: AHashMap<HexCoord, CostCell>,
    units: usize,
}

impl CostMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit of `unit_type` standing at `origin`
    pub fn add_unit<O: SpatialOracle + ?Sized>(
        &mut self,
        oracle: &O,
        origin: HexCoord,
        unit_type: &UnitType,
    ) {
        for (hex, cost) in movement_costs_from(oracle, origin, unit_type, None) {
            let cell = self.cells.entry(hex).or_default();
            cell.sum += cost as f64;
            cell.count += 1;
        }
        self.units += 1;
    }

    /// Average cost over all units reaching `hex`; `None` if none does
    pub fn average_cost_at(&self, hex: HexCoord) -> Option<f64> {
        self.cells
            .get(&hex)
            .filter(|cell| cell.count > 0)
            .map(|cell| cell.sum / cell.count as f64)
    }

    pub fn is_reachable(&self, hex: HexCoord) -> bool {
        self.average_cost_at(hex).is_some()
    }

    /// Number of units added
    pub fn unit_count(&self) -> usize {
        self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::terrain::Terrain;
    use crate::sandbox::SandboxMap;

    fn line(width: i32) -> SandboxMap {
        SandboxMap::filled(width, 1, Terrain::Flat)
    }

    #[test]
    fn test_costs_on_flat_line() {
        let map = line(6);
        let unit = UnitType::new("Spearman", 14, 36);
        let costs = movement_costs_from(&map, HexCoord::new(0, 0), &unit, None);
        assert_eq!(costs.len(), 6);
        assert_eq!(costs[&HexCoord::new(0, 0)], 0);
        assert_eq!(costs[&HexCoord::new(5, 0)], 5);
    }

    #[test]
    fn test_budget_limits_reach() {
        let map = line(6);
        let unit = UnitType::new("Spearman", 14, 36);
        let costs = movement_costs_from(&map, HexCoord::new(0, 0), &unit, Some(2));
        assert_eq!(costs.len(), 3);
    }

    #[test]
    fn test_impassable_terrain_blocks() {
        let mut map = line(6);
        map.set_terrain(HexCoord::new(3, 0), Terrain::DeepWater);
        let unit = UnitType::new("Spearman", 14, 36);
        let costs = movement_costs_from(&map, HexCoord::new(0, 0), &unit, None);
        assert!(!costs.contains_key(&HexCoord::new(3, 0)));
        assert!(!costs.contains_key(&HexCoord::new(4, 0)));
    }

    #[test]
    fn test_average_over_units() {
        let map = line(5);
        let unit = UnitType::new("Spearman", 14, 36);
        let mut cost_map = CostMap::new();
        cost_map.add_unit(&map, HexCoord::new(0, 0), &unit);
        cost_map.add_unit(&map, HexCoord::new(4, 0), &unit);
        assert_eq!(cost_map.unit_count(), 2);
        // 2 from the left, 2 from the right
        assert_eq!(cost_map.average_cost_at(HexCoord::new(2, 0)), Some(2.0));
        // 1 and 3
        assert_eq!(cost_map.average_cost_at(HexCoord::new(1, 0)), Some(2.0));
        assert_eq!(cost_map.average_cost_at(HexCoord::new(9, 0)), None);
    }

    #[test]
    fn test_forest_costs_more() {
        let mut map = line(3);
        map.set_terrain(HexCoord::new(1, 0), Terrain::Forest);
        let unit = UnitType::new("Spearman", 14, 36);
        let costs = movement_costs_from(&map, HexCoord::new(0, 0), &unit, None);
        assert_eq!(costs[&HexCoord::new(1, 0)], 2);
        assert_eq!(costs[&HexCoord::new(2, 0)], 3);
    }
}
