//! Score blending
//!
//! Turns the analysis into one raw score per candidate and leader, in four
//! stages applied in order:
//! 1. terrain: average defense on the important hexes
//! 2. combat: how well each candidate answers the enemy roster
//! 3. similarity: candidates in the same advancement line share their score
//! 4. diversity: flat offset plus uniform noise
//!
//! Every stage computes its values from a snapshot and writes them back
//! afterwards, so stages never observe their own partial output.

use rand::Rng;
use std::collections::BTreeSet;

use crate::core::config::{AllocationMode, RecruitConfig};
use crate::core::error::Result;
use crate::core::types::UnitTypeId;
use crate::recruit::combat::CombatSimulator;
use crate::recruit::equilibrium::{find_equilibrium, EffectivenessTable};
use crate::recruit::plan::{LeaderPlan, ScoreMap};
use crate::recruit::terrain_profile::TerrainProfile;
use crate::recruit::PlanningContext;
use crate::units::catalog::UnitCatalog;

/// Enemy unit types with the hitpoints they bring
pub type EnemyRoster = Vec<(UnitTypeId, f64)>;

/// Visible enemy units, topped up with the enemy recruit lists at full
/// hitpoints when fewer than `threshold` are on the board
pub fn enemy_roster(ctx: &PlanningContext, threshold: usize) -> EnemyRoster {
    let enemies = ctx.ledger.enemies(ctx.side);
    let mut roster: EnemyRoster = ctx
        .ledger
        .units()
        .into_iter()
        .filter(|u| !u.incapacitated && enemies.contains(&u.side))
        .map(|u| (u.type_id, u.hitpoints as f64))
        .collect();

    if roster.len() < threshold {
        for side in &enemies {
            for type_id in ctx.ledger.recruits(*side) {
                if let Some(unit_type) = ctx.catalog.unit_type(&type_id) {
                    roster.push((type_id, unit_type.hitpoints as f64));
                }
            }
        }
    }
    roster
}

/// `sign(x) * |x|^power`
fn signed_power(value: f64, power: f64) -> f64 {
    value.signum() * value.abs().powf(power)
}

/// Linear rescale: the maximum maps to 100, `max - threshold * (max - average)`
/// maps to 0, anything below is clamped to 0
pub fn rescale_scores(raw: &ScoreMap, threshold: f64) -> ScoreMap {
    if raw.is_empty() {
        return ScoreMap::new();
    }
    let max = raw.iter().map(|(_, v)| v).fold(f64::NEG_INFINITY, f64::max);
    let average = raw.sum() / raw.len() as f64;

    let new_100 = max;
    let mut new_0 = max - threshold * (max - average);
    if (new_100 - new_0).abs() < f64::EPSILON {
        new_0 = new_100 - 1e-6;
    }

    raw.iter()
        .map(|(id, v)| {
            let scaled = (v - new_0) / (new_100 - new_0) * 100.0;
            (id.clone(), scaled.max(0.0))
        })
        .collect()
}

fn advances_directly(catalog: &dyn UnitCatalog, from: &UnitTypeId, to: &UnitTypeId) -> bool {
    catalog
        .unit_type(from)
        .is_some_and(|t| t.advances_to.contains(to))
}

/// Divide every score by 1 + the number of other scored types it advances
/// from or to directly
pub fn apply_similarity_penalty(scores: &mut ScoreMap, catalog: &dyn UnitCatalog) {
    let ids: Vec<UnitTypeId> = scores.ids().cloned().collect();
    let penalized: Vec<(UnitTypeId, f64)> = ids
        .iter()
        .map(|id| {
            let similarity = ids
                .iter()
                .filter(|other| *other != id)
                .filter(|other| {
                    advances_directly(catalog, id, other) || advances_directly(catalog, other, id)
                })
                .count();
            (id.clone(), scores.get(id) / (similarity as f64 + 1.0))
        })
        .collect();

    for (id, score) in penalized {
        scores.set(id, score);
    }
}

/// Runs the blending stages over a cycle's leader plans
pub struct ScoreBlender<'c> {
    config: &'c RecruitConfig,
}

impl<'c> ScoreBlender<'c> {
    pub fn new(config: &'c RecruitConfig) -> Self {
        Self { config }
    }

    pub fn blend<R: Rng + ?Sized>(
        &self,
        plans: &mut [LeaderPlan],
        ctx: &PlanningContext,
        profile: &mut TerrainProfile,
        simulator: &mut CombatSimulator,
        rng: &mut R,
    ) {
        self.add_terrain_term(plans, ctx, profile);
        self.add_combat_term(plans, ctx, profile, simulator);
        for plan in plans.iter_mut() {
            apply_similarity_penalty(&mut plan.scores, ctx.catalog);
        }
        self.add_diversity(plans, rng);

        for plan in plans.iter() {
            tracing::debug!(leader = %plan.leader.id, scores = ?plan.scores, "blended scores");
        }
    }

    pub fn add_terrain_term(
        &self,
        plans: &mut [LeaderPlan],
        ctx: &PlanningContext,
        profile: &mut TerrainProfile,
    ) {
        let weight = self.config.map.analysis_weight;
        for plan in plans.iter_mut() {
            let terms: Vec<(UnitTypeId, f64)> = plan
                .scores
                .ids()
                .map(|id| (id.clone(), profile.average_defense(ctx.catalog, id) * weight))
                .collect();
            for (id, term) in terms {
                plan.scores.add(&id, term);
            }
        }
    }

    pub fn add_combat_term(
        &self,
        plans: &mut [LeaderPlan],
        ctx: &PlanningContext,
        profile: &mut TerrainProfile,
        simulator: &mut CombatSimulator,
    ) {
        let roster = enemy_roster(ctx, self.config.combat.enemy_unit_threshold);
        if roster.is_empty() {
            tracing::debug!(side = %ctx.side, "no enemy roster, combat term skipped");
            return;
        }

        let weight = self.config.combat.weight;
        for plan in plans.iter_mut() {
            let term = match self.config.allocation.mode {
                AllocationMode::Proportional => {
                    self.proportional_term(&plan.candidates, ctx, &roster, profile, simulator)
                }
                AllocationMode::Equilibrium => {
                    match self.equilibrium_term(&plan.candidates, ctx, &roster, profile, simulator)
                    {
                        Ok(term) => term,
                        Err(err) => {
                            tracing::warn!(
                                leader = %plan.leader.id,
                                %err,
                                "falling back to proportional combat term"
                            );
                            self.proportional_term(
                                &plan.candidates,
                                ctx,
                                &roster,
                                profile,
                                simulator,
                            )
                        }
                    }
                }
            };
            for (id, value) in term.iter() {
                plan.scores.add(id, value * weight);
            }
        }
    }

    /// Rescaled sum of `compare * enemy_hp` per candidate
    fn proportional_term(
        &self,
        candidates: &BTreeSet<UnitTypeId>,
        ctx: &PlanningContext,
        roster: &EnemyRoster,
        profile: &mut TerrainProfile,
        simulator: &mut CombatSimulator,
    ) -> ScoreMap {
        let power = self.config.combat.score_power;
        let mut raw = ScoreMap::zeroed(candidates);

        for (enemy, hitpoints) in roster {
            if self.config.combat.direct_response {
                // Only the best answer to this enemy gets credit
                let mut best: Option<(&UnitTypeId, f64)> = None;
                for candidate in candidates {
                    let value = simulator.compare_types(ctx.catalog, profile, candidate, enemy);
                    if best.map_or(true, |(_, b)| value > b) {
                        best = Some((candidate, value));
                    }
                }
                if let Some((candidate, value)) = best {
                    raw.add(candidate, signed_power(value * hitpoints, power));
                }
            } else {
                for candidate in candidates {
                    let value = simulator.compare_types(ctx.catalog, profile, candidate, enemy);
                    raw.add(candidate, signed_power(value * hitpoints, power));
                }
            }
        }

        rescale_scores(&raw, self.config.combat.score_threshold)
    }

    /// `100 * probability` of each candidate in the equilibrium mix
    fn equilibrium_term(
        &self,
        candidates: &BTreeSet<UnitTypeId>,
        ctx: &PlanningContext,
        roster: &EnemyRoster,
        profile: &mut TerrainProfile,
        simulator: &mut CombatSimulator,
    ) -> Result<ScoreMap> {
        let columns: Vec<UnitTypeId> = roster
            .iter()
            .map(|(id, _)| id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows: Vec<UnitTypeId> = candidates.iter().cloned().collect();

        let mut table = EffectivenessTable::new(rows.clone(), columns.clone());
        for (i, row) in rows.iter().enumerate() {
            for (j, column) in columns.iter().enumerate() {
                table.set(i, j, simulator.compare_types(ctx.catalog, profile, row, column));
            }
        }

        let strategy = find_equilibrium(&table, self.config.allocation.max_pivots)?;
        let mut term = ScoreMap::zeroed(candidates);
        for (id, probability) in strategy {
            term.add(&id, 100.0 * probability);
        }
        Ok(term)
    }

    pub fn add_diversity<R: Rng + ?Sized>(&self, plans: &mut [LeaderPlan], rng: &mut R) {
        let offset = self.config.blend.diversity_weight * 50.0;
        let maximum = self.config.blend.randomness_maximum;
        for plan in plans.iter_mut() {
            let terms: Vec<(UnitTypeId, f64)> = plan
                .scores
                .ids()
                .map(|id| {
                    let noise = if maximum > 0.0 {
                        rng.gen_range(0.0..=maximum)
                    } else {
                        0.0
                    };
                    (id.clone(), offset + noise)
                })
                .collect();
            for (id, term) in terms {
                plan.scores.add(&id, term);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{SideId, UnitId};
    use crate::game::ledger::{GameLedger, LeaderInfo};
    use crate::map::hex::HexCoord;
    use crate::map::terrain::Terrain;
    use crate::sandbox::{SandboxGame, SandboxMap};
    use crate::units::catalog::{Attack, AttackRange, DamageType, TypeCatalog, UnitType};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog() -> TypeCatalog {
        let mut striker = UnitType::new("Striker", 14, 36);
        striker.attacks = vec![Attack::new("sword", AttackRange::Melee, DamageType::Blade, 10, 3)];
        let mut target = UnitType::new("Target", 14, 30);
        target.attacks = vec![Attack::new("club", AttackRange::Melee, DamageType::Impact, 5, 2)];
        let dummy = UnitType::new("Dummy", 14, 36);
        [striker, target, dummy].into_iter().collect()
    }

    fn game(enemies: usize) -> SandboxGame {
        let mut game = SandboxGame::new(SandboxMap::filled(6, 2, Terrain::Flat), catalog());
        game.add_side(SideId(1), 1, 100, &["Striker", "Dummy"]);
        game.add_side(SideId(2), 2, 100, &[]);
        for i in 0..enemies {
            game.add_unit(SideId(2), "Target", HexCoord::new(i as i32, 1));
        }
        game
    }

    fn plan(game: &SandboxGame) -> LeaderPlan {
        let leader = LeaderInfo {
            id: "north".into(),
            unit: UnitId::new(),
            side: SideId(1),
            position: HexCoord::new(0, 0),
            extra_recruits: Vec::new(),
            recall_filter: Vec::new(),
        };
        LeaderPlan::new(leader, &game.recruits(SideId(1)), &[], game, 1.0)
    }

    fn combat_only(mut config: RecruitConfig) -> RecruitConfig {
        config.map.analysis_weight = 0.0;
        config.blend.diversity_weight = 0.0;
        config.blend.randomness_maximum = 0.0;
        config.combat.enemy_unit_threshold = 0;
        config
    }

    #[test]
    fn test_terrain_term() {
        let game = game(0);
        let ctx = PlanningContext::new(SideId(1), &game);
        let config = RecruitConfig::default();
        let mut plans = vec![plan(&game)];
        let mut profile = TerrainProfile::new([Terrain::Hills].into_iter().collect());
        ScoreBlender::new(&config).add_terrain_term(&mut plans, &ctx, &mut profile);
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Striker")), 50.0);
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Dummy")), 50.0);
    }

    #[test]
    fn test_rescale() {
        let raw: ScoreMap = [
            (UnitTypeId::from("a"), 10.0),
            (UnitTypeId::from("b"), 20.0),
            (UnitTypeId::from("c"), 30.0),
        ]
        .into_iter()
        .collect();

        let strict = rescale_scores(&raw, 1.0);
        assert_eq!(strict.get(&UnitTypeId::from("a")), 0.0);
        assert_eq!(strict.get(&UnitTypeId::from("b")), 0.0);
        assert_eq!(strict.get(&UnitTypeId::from("c")), 100.0);

        let wide = rescale_scores(&raw, 2.0);
        assert_eq!(wide.get(&UnitTypeId::from("a")), 0.0);
        assert!((wide.get(&UnitTypeId::from("b")) - 50.0).abs() < 1e-9);
        assert_eq!(wide.get(&UnitTypeId::from("c")), 100.0);
    }

    #[test]
    fn test_rescale_equal_scores() {
        let raw: ScoreMap = [(UnitTypeId::from("a"), 7.0), (UnitTypeId::from("b"), 7.0)]
            .into_iter()
            .collect();
        let scaled = rescale_scores(&raw, 1.0);
        assert!((scaled.get(&UnitTypeId::from("a")) - 100.0).abs() < 1e-6);
        assert!((scaled.get(&UnitTypeId::from("b")) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_signed_power_keeps_sign() {
        assert_eq!(signed_power(-4.0, 0.5), -2.0);
        assert_eq!(signed_power(9.0, 0.5), 3.0);
    }

    #[test]
    fn test_similarity_penalty_is_applied_once_per_call() {
        let mut spearman = UnitType::new("Spearman", 14, 36);
        spearman.advances_to = vec!["Pikeman".into()];
        let catalog: TypeCatalog = [
            spearman,
            UnitType::new("Pikeman", 25, 55),
            UnitType::new("Bowman", 14, 33),
        ]
        .into_iter()
        .collect();
        let mut scores: ScoreMap = ["Spearman", "Pikeman", "Bowman"]
            .into_iter()
            .map(|id| (UnitTypeId::from(id), 8.0))
            .collect();

        apply_similarity_penalty(&mut scores, &catalog);
        assert_eq!(scores.get(&UnitTypeId::from("Spearman")), 4.0);
        assert_eq!(scores.get(&UnitTypeId::from("Pikeman")), 4.0);
        assert_eq!(scores.get(&UnitTypeId::from("Bowman")), 8.0);

        apply_similarity_penalty(&mut scores, &catalog);
        assert_eq!(scores.get(&UnitTypeId::from("Spearman")), 2.0);
        assert_eq!(scores.get(&UnitTypeId::from("Bowman")), 8.0);
    }

    #[test]
    fn test_diversity_bounds() {
        let game = game(0);
        let config = RecruitConfig::default();
        let mut plans = vec![plan(&game)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        ScoreBlender::new(&config).add_diversity(&mut plans, &mut rng);
        for (_, score) in plans[0].scores.iter() {
            assert!((50.0..=70.0).contains(&score));
        }
    }

    #[test]
    fn test_no_enemies_skips_combat_term() {
        let game = game(0);
        let ctx = PlanningContext::new(SideId(1), &game);
        let config = combat_only(RecruitConfig::default());
        let mut plans = vec![plan(&game)];
        let mut profile = TerrainProfile::default();
        let mut simulator = CombatSimulator::new(&config.combat);
        ScoreBlender::new(&config).add_combat_term(&mut plans, &ctx, &mut profile, &mut simulator);
        assert_eq!(plans[0].scores.sum(), 0.0);
        assert!(simulator.cache().is_empty());
    }

    #[test]
    fn test_combat_term_prefers_the_counter() {
        let game = game(1);
        let ctx = PlanningContext::new(SideId(1), &game);
        let config = combat_only(RecruitConfig::default());
        let mut plans = vec![plan(&game)];
        let mut profile = TerrainProfile::default();
        let mut simulator = CombatSimulator::new(&config.combat);
        ScoreBlender::new(&config).add_combat_term(&mut plans, &ctx, &mut profile, &mut simulator);
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Striker")), 100.0);
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Dummy")), 0.0);
    }

    #[test]
    fn test_direct_response_credits_best_counter_only() {
        let game = game(2);
        let ctx = PlanningContext::new(SideId(1), &game);
        let mut config = combat_only(RecruitConfig::default());
        config.combat.direct_response = true;
        config.combat.score_threshold = 2.0;
        let mut plans = vec![plan(&game)];
        let mut profile = TerrainProfile::default();
        let mut simulator = CombatSimulator::new(&config.combat);
        ScoreBlender::new(&config).add_combat_term(&mut plans, &ctx, &mut profile, &mut simulator);
        // raw Dummy is 0, raw Striker positive: 0 maps to exactly 0 at threshold 2
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Striker")), 100.0);
        assert!(plans[0].scores.get(&UnitTypeId::from("Dummy")).abs() < 1e-9);
    }

    #[test]
    fn test_equilibrium_mode() {
        let game = game(1);
        let ctx = PlanningContext::new(SideId(1), &game);
        let mut config = combat_only(RecruitConfig::default());
        config.allocation.mode = AllocationMode::Equilibrium;
        let mut plans = vec![plan(&game)];
        let mut profile = TerrainProfile::default();
        let mut simulator = CombatSimulator::new(&config.combat);
        ScoreBlender::new(&config).add_combat_term(&mut plans, &ctx, &mut profile, &mut simulator);
        assert!((plans[0].scores.get(&UnitTypeId::from("Striker")) - 100.0).abs() < 1e-9);
        assert_eq!(plans[0].scores.get(&UnitTypeId::from("Dummy")), 0.0);
    }

    #[test]
    fn test_roster_falls_back_to_enemy_recruits() {
        let mut game = game(1);
        game.set_recruits(SideId(2), &["Target", "Striker"]);
        let ctx = PlanningContext::new(SideId(1), &game);
        assert_eq!(enemy_roster(&ctx, 0).len(), 1);
        let roster = enemy_roster(&ctx, 5);
        assert_eq!(roster.len(), 3);
        assert!(roster.contains(&(UnitTypeId::from("Striker"), 36.0)));
    }
}
