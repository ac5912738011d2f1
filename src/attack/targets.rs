//! Recursive attacker assignment around each enemy unit

use ahash::AHashMap;
use serde::Serialize;

use crate::core::config::AttackConfig;
use crate::core::types::{SideId, UnitId};
use crate::game::ledger::BoardUnit;
use crate::map::cost_map::movement_costs_from;
use crate::map::hex::HexCoord;
use crate::recruit::PlanningContext;
use crate::units::catalog::UnitType;

const HEALING_VALUE: i32 = 10;
const FRIENDLY_VILLAGE_VALUE: i32 = 5;
const NEUTRAL_VILLAGE_VALUE: i32 = 10;
const ENEMY_VILLAGE_VALUE: i32 = 15;
const SURROUND_BONUS: f64 = 1.2;

/// One unit stepping next to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Movement {
    pub unit: UnitId,
    pub from: HexCoord,
    pub to: HexCoord,
}

/// A combination of attackers against one enemy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackAnalysis {
    pub target: HexCoord,
    pub movements: Vec<Movement>,
    /// Enemy power that can reach the attack hexes, scaled down when surrounding
    pub vulnerability: f64,
    /// Own power that can reach the attack hexes, scaled up when surrounding
    pub support: f64,
    /// Whether the last unit added is itself surrounded where it stands
    pub is_surrounded: bool,
    /// Sum of the position ratings of every attack hex
    pub rating: i32,
}

impl AttackAnalysis {
    fn new(target: HexCoord) -> Self {
        Self {
            target,
            movements: Vec::new(),
            vulnerability: 0.0,
            support: 0.0,
            is_surrounded: false,
            rating: 0,
        }
    }

    pub fn exposure(&self) -> f64 {
        self.vulnerability - self.support
    }
}

/// How much `unit_type` of `side` likes standing on `hex`
///
/// `100 - chance to be hit`, plus healing and village bonuses. Taking an
/// enemy village is worth more than standing on a neutral or own one.
pub fn rate_terrain(
    ctx: &PlanningContext<'_>,
    unit_type: &UnitType,
    side: SideId,
    hex: HexCoord,
) -> i32 {
    let Some(terrain) = ctx.map.terrain_at(hex) else {
        return 0;
    };
    let mut rating = 100 - unit_type.defense_modifier(terrain) as i32;

    if terrain.gives_healing() && !unit_type.has_ability("regenerate") {
        rating += HEALING_VALUE;
    }

    if terrain.is_village() {
        rating += match ctx.map.village_owner(hex) {
            Some(owner) if owner == side => FRIENDLY_VILLAGE_VALUE,
            None => NEUTRAL_VILLAGE_VALUE,
            Some(_) => ENEMY_VILLAGE_VALUE,
        };
    }

    rating
}

/// Every attack combination of `ctx.side` against every visible enemy
///
/// Combinations are built incrementally: each prefix is an analysis of its
/// own. Orderings count separately.
pub fn analyze_targets(ctx: &PlanningContext<'_>, config: &AttackConfig) -> Vec<AttackAnalysis> {
    let mut analyzer = Analyzer::new(*ctx, config.clone());
    let mut results = Vec::new();

    let targets: Vec<BoardUnit> = ctx
        .ledger
        .units()
        .into_iter()
        .filter(|u| ctx.ledger.is_enemy(ctx.side, u.side) && !u.incapacitated)
        .collect();

    for target in &targets {
        let mut remaining: Vec<usize> = (0..analyzer.attackers.len()).collect();
        let mut used = [false; 6];
        let mut current = AttackAnalysis::new(target.position);
        analyzer.search(target, &mut used, &mut remaining, &mut current, &mut results);
    }

    tracing::debug!(
        side = %ctx.side,
        targets = targets.len(),
        analyses = results.len(),
        "attack analysis done"
    );
    results
}

/// A unit with the hexes it can reach this turn
struct Mover<'a> {
    unit: BoardUnit,
    unit_type: &'a UnitType,
    reach: AHashMap<HexCoord, u32>,
    /// Best damage per attack, scaled by remaining health
    strength: f64,
}

impl<'a> Mover<'a> {
    fn new(ctx: &PlanningContext<'a>, unit: BoardUnit) -> Option<Self> {
        let unit_type = ctx.catalog.unit_type(&unit.type_id)?;
        let reach = movement_costs_from(ctx.map, unit.position, unit_type, Some(unit.movement));
        let best = unit_type
            .attacks
            .iter()
            .map(|a| (a.damage * a.strikes) as f64)
            .fold(0.0, f64::max);
        let health = if unit.max_hitpoints == 0 {
            0.0
        } else {
            unit.hitpoints as f64 / unit.max_hitpoints as f64
        };
        Some(Self {
            unit,
            unit_type,
            reach,
            strength: best * health,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Attacker {
    /// Index into `Analyzer::own`
    mover: usize,
    backstab: bool,
    slow: bool,
    surrounded: bool,
}

#[derive(Debug, Clone, Copy)]
struct Position {
    tile: usize,
    rating: i32,
    vulnerability: f64,
    support: f64,
}

struct Analyzer<'a> {
    ctx: PlanningContext<'a>,
    config: AttackConfig,
    occupants: AHashMap<HexCoord, BoardUnit>,
    own: Vec<Mover<'a>>,
    enemies: Vec<Mover<'a>>,
    attackers: Vec<Attacker>,
    vulnerability: AHashMap<HexCoord, f64>,
    support: AHashMap<HexCoord, f64>,
}

impl<'a> Analyzer<'a> {
    fn new(ctx: PlanningContext<'a>, config: AttackConfig) -> Self {
        let units = ctx.ledger.units();
        let occupants: AHashMap<HexCoord, BoardUnit> =
            units.iter().map(|u| (u.position, u.clone())).collect();

        let mut own = Vec::new();
        let mut enemies = Vec::new();
        for unit in units {
            if unit.incapacitated {
                continue;
            }
            if unit.side == ctx.side {
                match Mover::new(&ctx, unit) {
                    Some(mover) => own.push(mover),
                    None => tracing::warn!("own unit of unknown type skipped in attack analysis"),
                }
            } else if ctx.ledger.is_enemy(ctx.side, unit.side) {
                enemies.extend(Mover::new(&ctx, unit));
            }
        }

        let mut analyzer = Self {
            ctx,
            config,
            occupants,
            own,
            enemies,
            attackers: Vec::new(),
            vulnerability: AHashMap::new(),
            support: AHashMap::new(),
        };

        let attackers: Vec<Attacker> = analyzer
            .own
            .iter()
            .enumerate()
            .filter(|(_, m)| m.unit.attacks_left)
            .filter(|(_, m)| !(m.unit.can_recruit && analyzer.config.passive_leader))
            .map(|(i, m)| Attacker {
                mover: i,
                backstab: m.unit_type.attacks.iter().any(|a| a.specials.backstab),
                slow: m.unit_type.attacks.iter().any(|a| a.specials.slow),
                surrounded: analyzer.is_surrounded(m.unit.position),
            })
            .collect();
        analyzer.attackers = attackers;
        analyzer
    }

    fn enemy_at(&self, hex: HexCoord) -> bool {
        self.occupants
            .get(&hex)
            .is_some_and(|u| self.ctx.ledger.is_enemy(self.ctx.side, u.side))
    }

    /// Flanked with a third enemy near, or boxed in with at most one way out
    fn is_surrounded(&self, position: HexCoord) -> bool {
        let adjacent = position.neighbors();
        let mut enemies_around = 0;
        let mut accessible = 0;
        let mut flanked = false;

        for tile in 0..3 {
            let mut flank = false;
            if self.ctx.map.on_board(adjacent[tile]) {
                accessible += 1;
                if self.enemy_at(adjacent[tile]) {
                    enemies_around += 1;
                    flank = true;
                }
            }
            if self.ctx.map.on_board(adjacent[tile + 3]) {
                accessible += 1;
                if self.enemy_at(adjacent[tile + 3]) {
                    enemies_around += 1;
                    flanked |= flank;
                }
            }
        }

        (flanked && enemies_around > 2) || enemies_around >= accessible - 1
    }

    /// Combined power of `movers` able to strike at `hex`, one unit per adjacent tile
    fn power_projection(&self, hex: HexCoord, movers: &[Mover<'a>]) -> f64 {
        let mut used = vec![false; movers.len()];
        let mut total = 0.0;
        for tile in hex.neighbors() {
            let Some(terrain) = self.ctx.map.terrain_at(tile) else {
                continue;
            };
            let mut best: Option<(usize, f64)> = None;
            for (i, mover) in movers.iter().enumerate() {
                if used[i] || !mover.reach.contains_key(&tile) {
                    continue;
                }
                let defense = 100 - mover.unit_type.defense_modifier(terrain) as i32;
                let power = mover.strength * defense as f64 / 100.0;
                if best.map_or(true, |(_, b)| power > b) {
                    best = Some((i, power));
                }
            }
            if let Some((i, power)) = best {
                used[i] = true;
                total += power;
            }
        }
        total
    }

    fn vulnerability_at(&mut self, hex: HexCoord) -> f64 {
        if let Some(v) = self.vulnerability.get(&hex) {
            return *v;
        }
        let value = self.power_projection(hex, &self.enemies);
        self.vulnerability.insert(hex, value);
        value
    }

    fn support_at(&mut self, hex: HexCoord) -> f64 {
        if let Some(v) = self.support.get(&hex) {
            return *v;
        }
        let value = self.power_projection(hex, &self.own);
        self.support.insert(hex, value);
        value
    }

    /// Best free hex next to the target for `attacker`
    fn best_position(
        &mut self,
        target: &BoardUnit,
        attacker: Attacker,
        used: &[bool; 6],
    ) -> Option<Position> {
        let tiles = target.position.neighbors();
        let origin = self.own[attacker.mover].unit.position;
        let unit_type = self.own[attacker.mover].unit_type;
        let skirmisher_target = self
            .ctx
            .catalog
            .unit_type(&target.type_id)
            .is_some_and(|t| t.has_ability("skirmisher"));

        let mut best: Option<Position> = None;
        for j in 0..6 {
            if used[j] {
                continue;
            }
            let tile = tiles[j];
            if tile != origin
                && (!self.own[attacker.mover].reach.contains_key(&tile)
                    || self.occupants.contains_key(&tile))
            {
                continue;
            }

            // Only units already standing opposite count
            let mut backstab_bonus = 1.0;
            let mut surround_bonus = 1.0;
            let opposite = tile.mirrored_through(target.position);
            if opposite != origin {
                let behind = self.occupants.get(&opposite).is_some_and(|u| {
                    !u.incapacitated && self.ctx.ledger.is_enemy(target.side, u.side)
                });
                if behind {
                    if attacker.backstab {
                        backstab_bonus = 2.0;
                    }
                    if !skirmisher_target {
                        surround_bonus = SURROUND_BONUS;
                    }
                }
            }

            let rating = (rate_terrain(&self.ctx, unit_type, self.ctx.side, tile) as f64
                * backstab_bonus) as i32;
            if best.is_some_and(|b| rating < b.rating) {
                continue;
            }

            let vulnerability = self.vulnerability_at(tile) / surround_bonus;
            let support = self.support_at(tile) * surround_bonus;
            let exposure = vulnerability - support;
            if best.is_some_and(|b| rating == b.rating && exposure >= b.vulnerability - b.support) {
                continue;
            }

            best = Some(Position {
                tile: j,
                rating,
                vulnerability,
                support,
            });
        }
        best
    }

    fn search(
        &mut self,
        target: &BoardUnit,
        used: &mut [bool; 6],
        remaining: &mut Vec<usize>,
        current: &mut AttackAnalysis,
        results: &mut Vec<AttackAnalysis>,
    ) {
        if current.movements.len() >= self.config.depth {
            return;
        }
        if results.len() > self.config.max_positions && !current.movements.is_empty() {
            tracing::debug!(positions = results.len(), "attack analysis cut short");
            return;
        }

        let tiles = target.position.neighbors();
        for i in 0..remaining.len() {
            let attacker = self.attackers[remaining[i]];
            // Slowing units open the attack or stay out
            if attacker.slow && !current.movements.is_empty() {
                continue;
            }

            let Some(position) = self.best_position(target, attacker, used) else {
                continue;
            };

            let unit = &self.own[attacker.mover].unit;
            let movement = Movement {
                unit: unit.id,
                from: unit.position,
                to: tiles[position.tile],
            };

            let slot = remaining.remove(i);
            current.movements.push(movement);
            current.vulnerability += position.vulnerability;
            current.support += position.support;
            current.rating += position.rating;
            current.is_surrounded = attacker.surrounded;
            results.push(current.clone());

            used[position.tile] = true;
            self.search(target, used, remaining, current, results);
            used[position.tile] = false;

            current.vulnerability -= position.vulnerability;
            current.support -= position.support;
            current.rating -= position.rating;
            current.movements.pop();
            remaining.insert(i, slot);
        }
    }
}
