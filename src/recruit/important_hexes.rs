//! Spatial importance analysis: where will the fighting happen?
//!
//! Three sources mark hexes as important:
//! - contact zones around own units standing next to an enemy
//! - the near part of the frontier between our cost field and each enemy's
//! - villages close to anything already important, with their surroundings
//!
//! The resulting terrain histogram drives the terrain and combat scores.

use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::core::config::MapAnalysisConfig;
use crate::core::types::SideId;
use crate::game::ledger::BoardUnit;
use crate::map::cost_map::CostMap;
use crate::map::hex::HexCoord;
use crate::map::terrain::TerrainHistogram;
use crate::recruit::PlanningContext;
use crate::units::catalog::{UnitType, UNREACHABLE};

/// Important hexes of one planning cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportantHexes {
    pub hexes: BTreeSet<HexCoord>,
    /// Terrain of `hexes`
    pub terrain: TerrainHistogram,
    /// Own units adjacent to an enemy unit
    pub units_in_contact: u32,
}

impl ImportantHexes {
    pub fn contains(&self, hex: HexCoord) -> bool {
        self.hexes.contains(&hex)
    }

    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }
}

pub fn compute_important_hexes(
    ctx: &PlanningContext,
    config: &MapAnalysisConfig,
) -> ImportantHexes {
    let units: Vec<BoardUnit> = ctx
        .ledger
        .units()
        .into_iter()
        .filter(|u| !u.incapacitated)
        .collect();
    let mut important = ImportantHexes::default();

    mark_contact_zones(ctx, config, &units, &mut important);

    let own_costs = cost_map_of_side(ctx, ctx.side, config, &units);
    let local_costs = average_local_costs(ctx, &units);
    for enemy in ctx.ledger.enemies(ctx.side) {
        let enemy_costs = cost_map_of_side(ctx, enemy, config, &units);
        mark_frontier(ctx, config, &own_costs, &enemy_costs, &local_costs, &mut important);
    }

    mark_villages(ctx, config, &own_costs, &mut important);

    for hex in &important.hexes {
        if let Some(terrain) = ctx.map.terrain_at(*hex) {
            important.terrain.add(terrain);
        }
    }

    tracing::debug!(
        side = %ctx.side,
        hexes = important.hexes.len(),
        in_contact = important.units_in_contact,
        "important hexes"
    );
    important
}

fn mark_contact_zones(
    ctx: &PlanningContext,
    config: &MapAnalysisConfig,
    units: &[BoardUnit],
    important: &mut ImportantHexes,
) {
    let by_position: AHashMap<HexCoord, &BoardUnit> =
        units.iter().map(|u| (u.position, u)).collect();

    for unit in units.iter().filter(|u| u.side == ctx.side) {
        let in_contact = ctx.map.adjacent_tiles(unit.position).into_iter().any(|hex| {
            by_position
                .get(&hex)
                .is_some_and(|other| ctx.ledger.is_enemy(ctx.side, other.side))
        });
        if !in_contact {
            continue;
        }
        important.units_in_contact += 1;
        important.hexes.insert(unit.position);
        important
            .hexes
            .extend(ctx.map.tiles_in_radius(unit.position, config.village_surrounding));
    }
}

/// Cost field of `side`: its units, plus its recruit lists at every leader
/// while the side has fewer than `unit_threshold` units
fn cost_map_of_side(
    ctx: &PlanningContext,
    side: SideId,
    config: &MapAnalysisConfig,
    units: &[BoardUnit],
) -> CostMap {
    let mut cost_map = CostMap::new();

    let mut unit_count = 0;
    for unit in units.iter().filter(|u| u.side == side && !u.can_recruit) {
        if let Some(unit_type) = ctx.catalog.unit_type(&unit.type_id) {
            cost_map.add_unit(ctx.map, unit.position, unit_type);
            unit_count += 1;
        }
    }

    if unit_count < config.unit_threshold {
        let recruits = ctx.ledger.recruits(side);
        for leader in ctx.ledger.leaders(side) {
            // Duplicates across leaders are fine, they only weigh the average
            for type_id in recruits.iter().chain(leader.extra_recruits.iter()) {
                if let Some(unit_type) = ctx.catalog.unit_type(type_id) {
                    cost_map.add_unit(ctx.map, leader.position, unit_type);
                }
            }
        }
    }
    cost_map
}

/// Mean cost for our own unit types to enter each hex
///
/// Types are our recruit list, else the types of our units on the board.
/// Hexes none of them can enter get 0, so they never become frontier.
fn average_local_costs(ctx: &PlanningContext, units: &[BoardUnit]) -> AHashMap<HexCoord, f64> {
    let mut types: Vec<&UnitType> = ctx
        .ledger
        .recruits(ctx.side)
        .iter()
        .filter_map(|id| ctx.catalog.unit_type(id))
        .collect();
    if types.is_empty() {
        types = units
            .iter()
            .filter(|u| u.side == ctx.side)
            .filter_map(|u| ctx.catalog.unit_type(&u.type_id))
            .collect();
    }

    ctx.map
        .tiles()
        .into_iter()
        .map(|hex| {
            if types.is_empty() {
                return (hex, 1.0);
            }
            let costs: Vec<u32> = types
                .iter()
                .map(|t| ctx.map.movement_cost(t, hex))
                .filter(|c| *c < UNREACHABLE)
                .collect();
            let average = if costs.is_empty() {
                0.0
            } else {
                costs.iter().sum::<u32>() as f64 / costs.len() as f64
            };
            (hex, average)
        })
        .collect()
}

/// Keep the near part of the frontier between two cost fields
fn mark_frontier(
    ctx: &PlanningContext,
    config: &MapAnalysisConfig,
    own_costs: &CostMap,
    enemy_costs: &CostMap,
    local_costs: &AHashMap<HexCoord, f64>,
    important: &mut ImportantHexes,
) {
    let mut candidates: Vec<(HexCoord, f64)> = Vec::new();
    let mut smallest = f64::INFINITY;
    let mut biggest = f64::NEG_INFINITY;

    for hex in ctx.map.tiles() {
        let (Some(mine), Some(theirs)) = (
            own_costs.average_cost_at(hex),
            enemy_costs.average_cost_at(hex),
        ) else {
            continue;
        };
        let local = local_costs.get(&hex).copied().unwrap_or(0.0);
        if (mine - config.offensive_shift - theirs).abs() < config.border_thickness * local {
            let value = (mine + theirs) / 2.0;
            smallest = smallest.min(value);
            biggest = biggest.max(value);
            candidates.push((hex, value));
        }
    }

    if candidates.is_empty() {
        return;
    }
    let threshold = smallest + (biggest - smallest) * config.border_width;
    important.hexes.extend(
        candidates
            .into_iter()
            .filter(|(_, value)| *value <= threshold)
            .map(|(hex, _)| hex),
    );
}

/// Villages near important hexes, collected before any is added so one
/// village's surroundings cannot pull in the next
fn mark_villages(
    ctx: &PlanningContext,
    config: &MapAnalysisConfig,
    own_costs: &CostMap,
    important: &mut ImportantHexes,
) {
    let villages: Vec<HexCoord> = ctx
        .map
        .villages()
        .into_iter()
        .filter(|village| {
            ctx.map
                .tiles_in_radius(*village, config.village_nearness)
                .iter()
                .any(|hex| important.hexes.contains(hex))
        })
        .collect();

    for village in villages {
        important.hexes.insert(village);
        for hex in ctx.map.tiles_in_radius(village, config.village_surrounding) {
            if own_costs.is_reachable(hex) {
                important.hexes.insert(hex);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::terrain::Terrain;
    use crate::sandbox::{SandboxGame, SandboxMap};
    use crate::units::catalog::TypeCatalog;

    fn catalog() -> TypeCatalog {
        [UnitType::new("Spearman", 14, 36)].into_iter().collect()
    }

    fn duel(map: SandboxMap, own: HexCoord, enemy: HexCoord) -> SandboxGame {
        let mut game = SandboxGame::new(map, catalog());
        game.add_side(SideId(1), 1, 100, &["Spearman"]);
        game.add_side(SideId(2), 2, 100, &["Spearman"]);
        game.add_unit(SideId(1), "Spearman", own);
        game.add_unit(SideId(2), "Spearman", enemy);
        game
    }

    #[test]
    fn test_frontier_midpoint() {
        let game = duel(
            SandboxMap::filled(9, 1, Terrain::Flat),
            HexCoord::new(1, 0),
            HexCoord::new(7, 0),
        );
        let ctx = PlanningContext::new(SideId(1), &game);
        let important = compute_important_hexes(&ctx, &MapAnalysisConfig::default());
        assert_eq!(important.hexes, BTreeSet::from([HexCoord::new(4, 0)]));
        assert_eq!(important.terrain.count(Terrain::Flat), 1);
        assert_eq!(important.units_in_contact, 0);
    }

    #[test]
    fn test_contact_zone() {
        let game = duel(
            SandboxMap::filled(5, 1, Terrain::Flat),
            HexCoord::new(1, 0),
            HexCoord::new(2, 0),
        );
        let ctx = PlanningContext::new(SideId(1), &game);
        let important = compute_important_hexes(&ctx, &MapAnalysisConfig::default());
        assert_eq!(important.units_in_contact, 1);
        assert!(important.contains(HexCoord::new(0, 0)));
        assert!(important.contains(HexCoord::new(1, 0)));
        assert!(important.contains(HexCoord::new(2, 0)));
    }

    #[test]
    fn test_nearby_village_joins() {
        let mut map = SandboxMap::filled(9, 1, Terrain::Flat);
        map.set_terrain(HexCoord::new(6, 0), Terrain::Village);
        let game = duel(map, HexCoord::new(1, 0), HexCoord::new(7, 0));
        let ctx = PlanningContext::new(SideId(1), &game);
        let important = compute_important_hexes(&ctx, &MapAnalysisConfig::default());
        assert!(important.contains(HexCoord::new(6, 0)));
        assert!(important.contains(HexCoord::new(5, 0)));
        assert_eq!(important.terrain.count(Terrain::Village), 1);
    }

    #[test]
    fn test_no_enemies_no_frontier() {
        let mut game = SandboxGame::new(SandboxMap::filled(5, 1, Terrain::Flat), catalog());
        game.add_side(SideId(1), 1, 100, &["Spearman"]);
        game.add_unit(SideId(1), "Spearman", HexCoord::new(0, 0));
        let ctx = PlanningContext::new(SideId(1), &game);
        let important = compute_important_hexes(&ctx, &MapAnalysisConfig::default());
        assert!(important.is_empty());
        assert!(important.terrain.is_empty());
    }
}
