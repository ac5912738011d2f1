//! In-memory game: ledger and command executor over a `SandboxMap`

use ahash::AHashMap;
use std::collections::VecDeque;

use crate::core::types::{Gold, SideId, UnitId, UnitTypeId};
use crate::game::executor::{Command, CommandExecutor, CommandFailure};
use crate::game::instructions::types_match;
use crate::game::ledger::{BoardUnit, GameLedger, LeaderInfo, RecallUnit};
use crate::game::observer::ChangeSignals;
use crate::map::hex::HexCoord;
use crate::map::terrain::Terrain;
use crate::map::SpatialOracle;
use crate::sandbox::map::SandboxMap;
use crate::units::catalog::{TypeCatalog, UnitCatalog, UnitType};

#[derive(Debug, Clone)]
struct SideState {
    side: SideId,
    team: u32,
    gold: Gold,
    base_income: Gold,
    recruits: Vec<UnitTypeId>,
    recall_list: Vec<RecallUnit>,
    recall_cost: Gold,
}

#[derive(Debug, Clone)]
struct LeaderMeta {
    name: String,
    extra_recruits: Vec<UnitTypeId>,
    recall_filter: Vec<String>,
}

/// Complete in-memory game for tests and the headless runner
#[derive(Debug, Clone)]
pub struct SandboxGame {
    map: SandboxMap,
    catalog: TypeCatalog,
    sides: Vec<SideState>,
    units: Vec<BoardUnit>,
    leaders: AHashMap<UnitId, LeaderMeta>,
    signals: ChangeSignals,
}

impl SandboxGame {
    pub fn new(map: SandboxMap, catalog: TypeCatalog) -> Self {
        Self {
            map,
            catalog,
            sides: Vec::new(),
            units: Vec::new(),
            leaders: AHashMap::new(),
            signals: ChangeSignals::new(),
        }
    }

    pub fn map(&self) -> &SandboxMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut SandboxMap {
        &mut self.map
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Handle the planner polls; every committed command notifies it
    pub fn signals(&self) -> ChangeSignals {
        self.signals.clone()
    }

    /// Add a side; sides sharing `team` are allies
    pub fn add_side(&mut self, side: SideId, team: u32, gold: Gold, recruits: &[&str]) {
        self.sides.push(SideState {
            side,
            team,
            gold,
            base_income: 2,
            recruits: recruits.iter().map(|r| UnitTypeId::from(*r)).collect(),
            recall_list: Vec::new(),
            recall_cost: 20,
        });
    }

    fn side_state(&self, side: SideId) -> Option<&SideState> {
        self.sides.iter().find(|s| s.side == side)
    }

    fn side_state_mut(&mut self, side: SideId) -> Option<&mut SideState> {
        self.sides.iter_mut().find(|s| s.side == side)
    }

    pub fn set_gold(&mut self, side: SideId, gold: Gold) {
        if let Some(state) = self.side_state_mut(side) {
            state.gold = gold;
        }
    }

    pub fn set_recruits(&mut self, side: SideId, recruits: &[&str]) {
        if let Some(state) = self.side_state_mut(side) {
            state.recruits = recruits.iter().map(|r| UnitTypeId::from(*r)).collect();
        }
        self.signals.notify_recruit_list_changed();
    }

    pub fn set_recall_cost(&mut self, side: SideId, cost: Gold) {
        if let Some(state) = self.side_state_mut(side) {
            state.recall_cost = cost;
        }
    }

    fn board_unit(&self, side: SideId, unit_type: &UnitType, position: HexCoord) -> BoardUnit {
        BoardUnit {
            id: UnitId::new(),
            side,
            type_id: unit_type.id.clone(),
            position,
            hitpoints: unit_type.hitpoints,
            max_hitpoints: unit_type.hitpoints,
            cost: unit_type.cost,
            level: unit_type.level,
            movement: unit_type.movement,
            can_recruit: false,
            attacks_left: true,
            incapacitated: false,
        }
    }

    /// Place a unit of a catalog type; `None` if the type is unknown
    pub fn add_unit(&mut self, side: SideId, type_id: &str, position: HexCoord) -> Option<UnitId> {
        let unit_type = self.catalog.unit_type(&UnitTypeId::from(type_id))?;
        let unit = self.board_unit(side, unit_type, position);
        let id = unit.id;
        self.units.push(unit);
        Some(id)
    }

    /// Place a leader unit
    pub fn add_leader(
        &mut self,
        side: SideId,
        name: &str,
        type_id: &str,
        position: HexCoord,
    ) -> Option<UnitId> {
        let id = self.add_unit(side, type_id, position)?;
        if let Some(unit) = self.units.iter_mut().find(|u| u.id == id) {
            unit.can_recruit = true;
        }
        self.leaders.insert(
            id,
            LeaderMeta {
                name: name.to_string(),
                extra_recruits: Vec::new(),
                recall_filter: Vec::new(),
            },
        );
        Some(id)
    }

    pub fn set_extra_recruits(&mut self, leader: UnitId, recruits: &[&str]) {
        if let Some(meta) = self.leaders.get_mut(&leader) {
            meta.extra_recruits = recruits.iter().map(|r| UnitTypeId::from(*r)).collect();
        }
    }

    pub fn set_recall_filter(&mut self, leader: UnitId, tokens: &[&str]) {
        if let Some(meta) = self.leaders.get_mut(&leader) {
            meta.recall_filter = tokens.iter().map(|t| t.to_string()).collect();
        }
    }

    pub fn add_recall(&mut self, side: SideId, type_id: &str, experience: u32) -> Option<UnitId> {
        let max_experience = self
            .catalog
            .unit_type(&UnitTypeId::from(type_id))?
            .experience;
        let id = UnitId::new();
        let state = self.side_state_mut(side)?;
        state.recall_list.push(RecallUnit {
            id,
            type_id: UnitTypeId::from(type_id),
            experience,
            max_experience,
        });
        Some(id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut BoardUnit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn remove_unit(&mut self, id: UnitId) {
        self.units.retain(|u| u.id != id);
        self.leaders.remove(&id);
    }

    /// Units of `side` by type, leaders excluded
    pub fn unit_counts(&self, side: SideId) -> AHashMap<UnitTypeId, usize> {
        let mut counts = AHashMap::new();
        for unit in self.units.iter().filter(|u| u.side == side && !u.can_recruit) {
            *counts.entry(unit.type_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Collect income for `side` at the start of its turn
    pub fn collect_income(&mut self, side: SideId) -> Gold {
        let villages = self.map.villages_of(side) as Gold;
        let upkeep = self.upkeep(side);
        let Some(state) = self.side_state_mut(side) else {
            return 0;
        };
        let income = state.base_income + 2 * villages - (upkeep - villages).max(0);
        state.gold += income;
        income
    }

    /// Free castle hexes reachable from `keep` through castle tiles, nearest first
    fn vacant_castle_tiles(&self, keep: HexCoord) -> Vec<HexCoord> {
        let mut vacant = Vec::new();
        if !self.map.is_keep(keep) {
            return vacant;
        }

        let mut seen = vec![keep];
        let mut queue = VecDeque::from([keep]);
        while let Some(hex) = queue.pop_front() {
            for neighbor in self.map.adjacent_tiles(hex) {
                if seen.contains(&neighbor) || !self.map.is_castle(neighbor) {
                    continue;
                }
                seen.push(neighbor);
                queue.push_back(neighbor);
                if self.unit_at(neighbor).is_none() {
                    vacant.push(neighbor);
                }
            }
        }
        vacant
    }

    fn leader_at(&self, side: SideId, position: HexCoord) -> Option<&BoardUnit> {
        self.units
            .iter()
            .find(|u| u.side == side && u.can_recruit && u.position == position)
    }

    fn check_placement(
        &self,
        side: SideId,
        leader_position: HexCoord,
    ) -> Result<HexCoord, CommandFailure> {
        let Some(leader) = self.leader_at(side, leader_position) else {
            return Err(CommandFailure::Other(format!(
                "no leader of {side} at {leader_position:?}"
            )));
        };
        if !self.map.is_keep(leader.position) {
            return Err(CommandFailure::LeaderNotOnKeep);
        }
        self.vacant_castle_tiles(leader.position)
            .first()
            .copied()
            .ok_or(CommandFailure::NoVacantHex)
    }

    fn check_recruit(
        &self,
        side: SideId,
        type_id: &UnitTypeId,
        leader_position: HexCoord,
    ) -> Result<(HexCoord, Gold), CommandFailure> {
        let state = self
            .side_state(side)
            .ok_or_else(|| CommandFailure::Other(format!("unknown {side}")))?;
        let unit_type = self
            .catalog
            .unit_type(type_id)
            .ok_or_else(|| CommandFailure::UnknownType(type_id.clone()))?;

        let extra = self
            .leader_at(side, leader_position)
            .and_then(|l| self.leaders.get(&l.id))
            .map(|meta| meta.extra_recruits.contains(type_id))
            .unwrap_or(false);
        if !state.recruits.contains(type_id) && !extra {
            return Err(CommandFailure::UnknownType(type_id.clone()));
        }

        let hex = self.check_placement(side, leader_position)?;
        if state.gold < unit_type.cost {
            return Err(CommandFailure::NoGold);
        }
        Ok((hex, unit_type.cost))
    }

    fn check_recall(
        &self,
        side: SideId,
        unit: UnitId,
        leader_position: HexCoord,
    ) -> Result<(HexCoord, Gold), CommandFailure> {
        let state = self
            .side_state(side)
            .ok_or_else(|| CommandFailure::Other(format!("unknown {side}")))?;
        let Some(recall) = state.recall_list.iter().find(|r| r.id == unit) else {
            return Err(CommandFailure::NotInRecallList(unit));
        };

        let allowed = match self.leader_at(side, leader_position) {
            Some(leader) => match (
                self.leaders.get(&leader.id),
                self.catalog.unit_type(&recall.type_id),
            ) {
                (Some(meta), Some(unit_type)) => types_match(&meta.recall_filter, unit_type),
                _ => true,
            },
            None => true,
        };
        if !allowed {
            return Err(CommandFailure::Other("recall filter rejects unit".into()));
        }

        let hex = self.check_placement(side, leader_position)?;
        if state.gold < state.recall_cost {
            return Err(CommandFailure::NoGold);
        }
        Ok((hex, state.recall_cost))
    }
}

impl SpatialOracle for SandboxGame {
    fn tiles(&self) -> Vec<HexCoord> {
        self.map.tiles()
    }

    fn on_board(&self, hex: HexCoord) -> bool {
        self.map.on_board(hex)
    }

    fn terrain_at(&self, hex: HexCoord) -> Option<Terrain> {
        self.map.terrain_at(hex)
    }

    fn village_owner(&self, hex: HexCoord) -> Option<SideId> {
        self.map.village_owner(hex)
    }
}

impl UnitCatalog for SandboxGame {
    fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitType> {
        self.catalog.unit_type(id)
    }
}

impl GameLedger for SandboxGame {
    fn gold(&self, side: SideId) -> Gold {
        self.side_state(side).map_or(0, |s| s.gold)
    }

    fn base_income(&self, side: SideId) -> Gold {
        self.side_state(side).map_or(0, |s| s.base_income)
    }

    fn upkeep(&self, side: SideId) -> Gold {
        self.units
            .iter()
            .filter(|u| u.side == side && !u.can_recruit)
            .map(|u| u.level as Gold)
            .sum()
    }

    fn recruits(&self, side: SideId) -> Vec<UnitTypeId> {
        self.side_state(side)
            .map(|s| s.recruits.clone())
            .unwrap_or_default()
    }

    fn recall_list(&self, side: SideId) -> Vec<RecallUnit> {
        self.side_state(side)
            .map(|s| s.recall_list.clone())
            .unwrap_or_default()
    }

    fn recall_cost(&self, side: SideId) -> Gold {
        self.side_state(side).map_or(20, |s| s.recall_cost)
    }

    fn sides(&self) -> Vec<SideId> {
        self.sides.iter().map(|s| s.side).collect()
    }

    fn is_enemy(&self, side: SideId, other: SideId) -> bool {
        match (self.side_state(side), self.side_state(other)) {
            (Some(a), Some(b)) => a.team != b.team,
            _ => false,
        }
    }

    fn units(&self) -> Vec<BoardUnit> {
        self.units.clone()
    }

    fn leaders(&self, side: SideId) -> Vec<LeaderInfo> {
        let mut leaders: Vec<LeaderInfo> = self
            .units
            .iter()
            .filter(|u| u.side == side && u.can_recruit)
            .map(|u| {
                let meta = self.leaders.get(&u.id);
                LeaderInfo {
                    id: meta.map_or_else(|| u.id.to_string(), |m| m.name.clone()),
                    unit: u.id,
                    side,
                    position: u.position,
                    extra_recruits: meta.map(|m| m.extra_recruits.clone()).unwrap_or_default(),
                    recall_filter: meta.map(|m| m.recall_filter.clone()).unwrap_or_default(),
                }
            })
            .collect();
        leaders.sort_by(|a, b| a.id.cmp(&b.id));
        leaders
    }

    fn vacant_castle_hexes(&self, keep: HexCoord) -> usize {
        self.vacant_castle_tiles(keep).len()
    }

    fn unit_at(&self, hex: HexCoord) -> Option<BoardUnit> {
        self.units.iter().find(|u| u.position == hex).cloned()
    }
}

impl CommandExecutor for SandboxGame {
    fn execute(&mut self, side: SideId, command: &Command) -> Result<(), CommandFailure> {
        let (hex, cost, type_id) = match command {
            Command::Recruit {
                type_id,
                leader_position,
            } => {
                let (hex, cost) = self.check_recruit(side, type_id, *leader_position)?;
                (hex, cost, type_id.clone())
            }
            Command::Recall {
                unit,
                leader_position,
            } => {
                let (hex, cost) = self.check_recall(side, *unit, *leader_position)?;
                let state = self
                    .side_state_mut(side)
                    .ok_or_else(|| CommandFailure::Other(format!("unknown {side}")))?;
                let index = state
                    .recall_list
                    .iter()
                    .position(|r| r.id == *unit)
                    .ok_or(CommandFailure::NotInRecallList(*unit))?;
                let recalled = state.recall_list.remove(index);
                (hex, cost, recalled.type_id)
            }
        };

        let unit_type = self
            .catalog
            .unit_type(&type_id)
            .ok_or_else(|| CommandFailure::UnknownType(type_id.clone()))?;
        let unit = self.board_unit(side, unit_type, hex);
        self.units.push(unit);
        if let Some(state) = self.side_state_mut(side) {
            state.gold -= cost;
        }
        self.signals.notify_gamestate_changed();
        Ok(())
    }
}
