//! Economic state machine
//!
//! ```text
//! NORMAL ──ratio > begin, income > 0──▶ SAVE_GOLD ──ratio < end──▶ NORMAL
//! NORMAL ──gold ≥ spend-all threshold──▶ SPEND_ALL_GOLD ──no gold──▶ SAVE_GOLD
//! any ──enemy near a leader──▶ LEADER_IN_DANGER ──end of cycle──▶ NORMAL
//! ```
//!
//! The begin/end band keeps the state from flapping when the unit value
//! ratio hovers around a single threshold.

use serde::Serialize;
use std::fmt;

use crate::core::config::SaveGoldConfig;
use crate::core::types::Gold;
use crate::recruit::PlanningContext;

/// Share of the neutral villages per side expected to be taken each turn
const NEUTRAL_VILLAGE_CLAIM_RATE: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicState {
    #[default]
    Normal,
    SaveGold,
    SpendAllGold,
    LeaderInDanger,
}

impl fmt::Display for EconomicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EconomicState::Normal => "NORMAL",
            EconomicState::SaveGold => "SAVE_GOLD",
            EconomicState::SpendAllGold => "SPEND_ALL_GOLD",
            EconomicState::LeaderInDanger => "LEADER_IN_DANGER",
        };
        f.write_str(name)
    }
}

/// Economic inputs of one side at one moment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EconomySnapshot {
    pub gold: Gold,
    /// Summed `cost * hp / max_hp` of our non-leader units
    pub own_value: f64,
    /// Same over every allied side, ours included
    pub team_value: f64,
    pub enemy_value: f64,
    /// Allied sides, ours included
    pub allies: usize,
    pub base_income: Gold,
    pub own_villages: usize,
    pub neutral_villages: usize,
    /// Sides in the game
    pub side_count: usize,
    pub upkeep: Gold,
    pub units_in_contact: u32,
}

impl EconomySnapshot {
    pub fn gather(ctx: &PlanningContext, units_in_contact: u32) -> Self {
        let allies = ctx.ledger.allies(ctx.side);
        let enemies = ctx.ledger.enemies(ctx.side);

        let mut snapshot = EconomySnapshot {
            gold: ctx.ledger.gold(ctx.side),
            allies: allies.len(),
            base_income: ctx.ledger.base_income(ctx.side),
            side_count: ctx.ledger.sides().len(),
            upkeep: ctx.ledger.upkeep(ctx.side),
            units_in_contact,
            ..Default::default()
        };

        for unit in ctx.ledger.units() {
            if unit.can_recruit || unit.incapacitated {
                continue;
            }
            let value = unit.value();
            if unit.side == ctx.side {
                snapshot.own_value += value;
            }
            if allies.contains(&unit.side) {
                snapshot.team_value += value;
            } else if enemies.contains(&unit.side) {
                snapshot.enemy_value += value;
            }
        }

        for village in ctx.map.villages() {
            match ctx.map.village_owner(village) {
                Some(owner) if owner == ctx.side => snapshot.own_villages += 1,
                None => snapshot.neutral_villages += 1,
                Some(_) => {}
            }
        }
        snapshot
    }

    /// Allied unit value per ally against the enemy's
    ///
    /// 0 without enemy units: with nothing to compare against there is no
    /// lead to protect by saving.
    pub fn unit_ratio(&self) -> f64 {
        if self.enemy_value <= 0.0 {
            return 0.0;
        }
        (self.team_value / self.enemy_value) / self.allies.max(1) as f64
    }

    /// Total income over the forecast horizon
    ///
    /// Villages grow by our share of the neutral ones; units in contact are
    /// expected to die off, which lowers upkeep.
    pub fn estimated_income(&self, config: &SaveGoldConfig) -> f64 {
        let village_gain = self.neutral_villages as f64 / self.side_count.max(1) as f64
            * NEUTRAL_VILLAGE_CLAIM_RATE;
        let unit_gain = -(self.units_in_contact as f64) * config.attrition_per_contact;

        (1..=config.forecast_turns)
            .map(|turn| {
                let turn = turn as f64;
                let villages = self.own_villages as f64 + village_gain * turn;
                let income = villages * config.village_income;
                let upkeep = self.upkeep as f64 + unit_gain * turn
                    - villages * config.village_support;
                self.base_income as f64 + income - upkeep.max(0.0)
            })
            .sum()
    }
}

/// Persistent economic state of one side
#[derive(Debug, Clone, Default)]
pub struct EconomyTracker {
    state: EconomicState,
    spend_all_threshold: Option<Gold>,
}

impl EconomyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EconomicState {
        self.state
    }

    /// Gold at which everything is spent, once known
    pub fn spend_all_threshold(&self) -> Option<Gold> {
        self.spend_all_threshold
    }

    /// Re-evaluate the ratio and gold transitions
    pub fn update(&mut self, snapshot: &EconomySnapshot, config: &SaveGoldConfig) -> EconomicState {
        let threshold = *self
            .spend_all_threshold
            .get_or_insert(config.spend_all_gold.unwrap_or(snapshot.gold + 1));

        let previous = self.state;
        match self.state {
            EconomicState::LeaderInDanger | EconomicState::SpendAllGold => {}
            EconomicState::Normal | EconomicState::SaveGold if snapshot.gold >= threshold => {
                self.state = EconomicState::SpendAllGold;
            }
            EconomicState::Normal => {
                let ratio = snapshot.unit_ratio();
                let income = if config.save_on_negative_income {
                    1.0
                } else {
                    snapshot.estimated_income(config)
                };
                if ratio > config.begin && income > 0.0 {
                    self.state = EconomicState::SaveGold;
                }
            }
            EconomicState::SaveGold => {
                if snapshot.unit_ratio() < config.end {
                    self.state = EconomicState::Normal;
                }
            }
        }

        if self.state != previous {
            tracing::info!(
                from = %previous,
                to = %self.state,
                ratio = snapshot.unit_ratio(),
                gold = snapshot.gold,
                "economic state changed"
            );
        }
        self.state
    }

    /// A command failed for lack of gold
    pub fn on_no_gold(&mut self) {
        if self.state == EconomicState::SpendAllGold {
            tracing::info!("gold spent, saving again");
            self.state = EconomicState::SaveGold;
        }
    }

    pub fn set_leader_in_danger(&mut self) {
        self.state = EconomicState::LeaderInDanger;
    }

    /// Drop the transient danger state
    pub fn finish_cycle(&mut self) {
        if self.state == EconomicState::LeaderInDanger {
            self.state = EconomicState::Normal;
        }
    }

    /// Does the current state stop recruiting?
    pub fn halts_recruiting(&self, config: &SaveGoldConfig) -> bool {
        config.active && self.state == EconomicState::SaveGold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SideId;
    use crate::map::hex::HexCoord;
    use crate::map::terrain::Terrain;
    use crate::sandbox::{SandboxGame, SandboxMap};
    use crate::units::catalog::{TypeCatalog, UnitType};

    fn band() -> SaveGoldConfig {
        SaveGoldConfig {
            begin: 1.0,
            end: 0.7,
            spend_all_gold: Some(1000),
            ..Default::default()
        }
    }

    fn snapshot_with_ratio(ratio: f64) -> EconomySnapshot {
        EconomySnapshot {
            gold: 50,
            own_value: ratio * 100.0,
            team_value: ratio * 100.0,
            enemy_value: 100.0,
            allies: 1,
            base_income: 2,
            own_villages: 3,
            side_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_hysteresis_band_holds_normal() {
        let config = band();
        let mut tracker = EconomyTracker::new();
        for ratio in [0.8, 0.9, 0.85, 0.8, 0.9, 0.99] {
            assert_eq!(tracker.update(&snapshot_with_ratio(ratio), &config), EconomicState::Normal);
        }
    }

    #[test]
    fn test_hysteresis_enter_and_leave() {
        let config = band();
        let mut tracker = EconomyTracker::new();
        assert_eq!(tracker.update(&snapshot_with_ratio(1.2), &config), EconomicState::SaveGold);
        assert!(tracker.halts_recruiting(&config));
        for ratio in [0.8, 0.9, 0.75] {
            assert_eq!(
                tracker.update(&snapshot_with_ratio(ratio), &config),
                EconomicState::SaveGold
            );
        }
        assert_eq!(tracker.update(&snapshot_with_ratio(0.6), &config), EconomicState::Normal);
    }

    #[test]
    fn test_inactive_saving_does_not_halt() {
        let config = SaveGoldConfig {
            active: false,
            ..band()
        };
        let mut tracker = EconomyTracker::new();
        tracker.update(&snapshot_with_ratio(2.0), &config);
        assert_eq!(tracker.state(), EconomicState::SaveGold);
        assert!(!tracker.halts_recruiting(&config));
    }

    #[test]
    fn test_negative_income_blocks_saving() {
        let config = band();
        let mut snapshot = snapshot_with_ratio(2.0);
        snapshot.base_income = 0;
        snapshot.own_villages = 0;
        snapshot.upkeep = 10;
        assert!(snapshot.estimated_income(&config) < 0.0);

        let mut tracker = EconomyTracker::new();
        assert_eq!(tracker.update(&snapshot, &config), EconomicState::Normal);

        let lenient = SaveGoldConfig {
            save_on_negative_income: true,
            ..band()
        };
        assert_eq!(tracker.update(&snapshot, &lenient), EconomicState::SaveGold);
    }

    #[test]
    fn test_spend_all_gold_then_save() {
        let config = SaveGoldConfig {
            spend_all_gold: Some(40),
            ..band()
        };
        let mut tracker = EconomyTracker::new();
        assert_eq!(tracker.update(&snapshot_with_ratio(0.5), &config), EconomicState::SpendAllGold);
        tracker.on_no_gold();
        assert_eq!(tracker.state(), EconomicState::SaveGold);
    }

    #[test]
    fn test_default_spend_all_threshold_is_first_gold_plus_one() {
        let config = SaveGoldConfig {
            spend_all_gold: None,
            ..band()
        };
        let mut tracker = EconomyTracker::new();
        tracker.update(&snapshot_with_ratio(0.5), &config);
        assert_eq!(tracker.spend_all_threshold(), Some(51));
        assert_eq!(tracker.state(), EconomicState::Normal);

        let mut richer = snapshot_with_ratio(0.5);
        richer.gold = 51;
        assert_eq!(tracker.update(&richer, &config), EconomicState::SpendAllGold);
    }

    #[test]
    fn test_danger_is_transient() {
        let config = band();
        let mut tracker = EconomyTracker::new();
        tracker.update(&snapshot_with_ratio(1.5), &config);
        tracker.set_leader_in_danger();
        assert!(!tracker.halts_recruiting(&config));
        assert_eq!(
            tracker.update(&snapshot_with_ratio(1.5), &config),
            EconomicState::LeaderInDanger
        );
        tracker.finish_cycle();
        assert_eq!(tracker.state(), EconomicState::Normal);
    }

    #[test]
    fn test_unit_ratio_edges() {
        let empty = EconomySnapshot::default();
        assert_eq!(empty.unit_ratio(), 0.0);
        let unopposed = EconomySnapshot {
            team_value: 10.0,
            ..Default::default()
        };
        assert_eq!(unopposed.unit_ratio(), 0.0);
        let shared = EconomySnapshot {
            team_value: 40.0,
            enemy_value: 10.0,
            allies: 2,
            ..Default::default()
        };
        assert_eq!(shared.unit_ratio(), 2.0);
    }

    #[test]
    fn test_income_forecast() {
        let snapshot = EconomySnapshot {
            base_income: 2,
            own_villages: 2,
            upkeep: 3,
            side_count: 2,
            ..Default::default()
        };
        // 2 + 2*2 - max(0, 3 - 2) = 5 per turn
        assert_eq!(snapshot.estimated_income(&SaveGoldConfig::default()), 25.0);
    }

    #[test]
    fn test_gather() {
        let catalog: TypeCatalog = [UnitType::new("Spearman", 14, 36)].into_iter().collect();
        let mut map = SandboxMap::filled(6, 1, Terrain::Flat);
        map.set_terrain(HexCoord::new(0, 0), Terrain::Village);
        map.set_terrain(HexCoord::new(5, 0), Terrain::Village);
        map.set_village_owner(HexCoord::new(0, 0), Some(SideId(1)));
        let mut game = SandboxGame::new(map, catalog);
        game.add_side(SideId(1), 1, 75, &["Spearman"]);
        game.add_side(SideId(2), 2, 100, &["Spearman"]);
        game.add_unit(SideId(1), "Spearman", HexCoord::new(1, 0));
        game.add_unit(SideId(1), "Spearman", HexCoord::new(2, 0));
        game.add_unit(SideId(2), "Spearman", HexCoord::new(4, 0));

        let ctx = PlanningContext::new(SideId(1), &game);
        let snapshot = EconomySnapshot::gather(&ctx, 1);
        assert_eq!(snapshot.gold, 75);
        assert_eq!(snapshot.own_value, 28.0);
        assert_eq!(snapshot.enemy_value, 14.0);
        assert_eq!(snapshot.allies, 1);
        assert_eq!(snapshot.own_villages, 1);
        assert_eq!(snapshot.neutral_villages, 1);
        assert_eq!(snapshot.upkeep, 2);
        assert_eq!(snapshot.unit_ratio(), 2.0);
    }
}
