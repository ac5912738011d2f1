//! The recruitment candidate action
//!
//! One engine per side. It owns everything that outlives a single cycle:
//! the combat value cache, the cheapest-recruit memo, the economic state and
//! the random source. Collaborators it does not own (map, catalog, ledger,
//! executor) come in through the world passed to `evaluate`/`execute`.

use ahash::AHashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::core::config::RecruitConfig;
use crate::core::types::{Gold, Score, SideId, UnitId};
use crate::game::executor::CommandExecutor;
use crate::game::instructions::InstructionAspect;
use crate::game::ledger::LeaderInfo;
use crate::game::observer::ChangeObserver;
use crate::recruit::allocation::{AllocationPlanner, AllocationReport, StopReason};
use crate::recruit::blend::ScoreBlender;
use crate::recruit::combat::{CombatSimulator, CombatValueCache};
use crate::recruit::economy::{EconomicState, EconomyTracker};
use crate::recruit::important_hexes::{compute_important_hexes, ImportantHexes};
use crate::recruit::plan::LeaderPlan;
use crate::recruit::terrain_profile::TerrainProfile;
use crate::recruit::{CandidateAction, GameView, PlanningContext};

/// Score of a ready engine; recruiting outranks most other decisions
pub const RECRUITMENT_SCORE: Score = Score(180_000.0);

/// Analysis result of one cycle, before any gold is spent
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecruitmentPlan {
    pub important: ImportantHexes,
    pub leaders: Vec<LeaderPlan>,
}

pub struct RecruitmentEngine {
    side: SideId,
    config: RecruitConfig,
    observer: Box<dyn ChangeObserver>,
    instructions: Box<dyn InstructionAspect>,
    simulator: CombatSimulator,
    /// Cheapest fresh recruit per leader; cleared when recruit lists change
    cheapest_costs: AHashMap<UnitId, Option<Gold>>,
    economy: EconomyTracker,
    rng: ChaCha8Rng,
}

impl RecruitmentEngine {
    pub fn new(
        side: SideId,
        config: RecruitConfig,
        observer: Box<dyn ChangeObserver>,
        instructions: Box<dyn InstructionAspect>,
    ) -> Self {
        Self::with_seed(side, config, observer, instructions, 42)
    }

    pub fn with_seed(
        side: SideId,
        config: RecruitConfig,
        observer: Box<dyn ChangeObserver>,
        instructions: Box<dyn InstructionAspect>,
        seed: u64,
    ) -> Self {
        Self {
            side,
            simulator: CombatSimulator::new(&config.combat),
            config,
            observer,
            instructions,
            cheapest_costs: AHashMap::new(),
            economy: EconomyTracker::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn side(&self) -> SideId {
        self.side
    }

    pub fn config(&self) -> &RecruitConfig {
        &self.config
    }

    pub fn state(&self) -> EconomicState {
        self.economy.state()
    }

    pub fn cache(&self) -> &CombatValueCache {
        self.simulator.cache()
    }

    /// Forget memoized recruit costs
    pub fn invalidate(&mut self) {
        tracing::debug!(side = %self.side, "recruit cost memo cleared");
        self.cheapest_costs.clear();
    }

    /// Leaders standing on a keep with room to place a unit
    fn ready_leaders<W: GameView>(&self, world: &W) -> Vec<LeaderInfo> {
        world
            .leaders(self.side)
            .into_iter()
            .filter(|l| world.is_keep(l.position) && world.vacant_castle_hexes(l.position) > 0)
            .collect()
    }

    /// Cheapest thing any ready leader could buy: a fresh recruit or a recall
    fn cheapest_action<W: GameView>(
        &mut self,
        world: &W,
        leaders: &[LeaderInfo],
    ) -> Option<Gold> {
        let recruits = world.recruits(self.side);
        let recall_list = world.recall_list(self.side);
        let recall_cost = world.recall_cost(self.side);

        let mut cheapest: Option<Gold> = None;
        for leader in leaders {
            let plan = LeaderPlan::new(leader.clone(), &recruits, &recall_list, world, 1.0);
            let recruit = *self
                .cheapest_costs
                .entry(leader.unit)
                .or_insert_with(|| plan.cheapest_recruit_cost(world));
            let recall = (!plan.recalls.is_empty()).then_some(recall_cost);
            for cost in [recruit, recall].into_iter().flatten() {
                cheapest = Some(cheapest.map_or(cost, |c: Gold| c.min(cost)));
            }
        }
        cheapest
    }

    /// `Ok` when a cycle could recruit something
    ///
    /// A pending recruit-list change clears the cost memo first, so a list
    /// that gained a cheaper type is seen before gold is compared.
    fn readiness<W: GameView>(&mut self, world: &W) -> Result<(), StopReason> {
        if self.observer.recruit_list_changed() {
            self.invalidate();
            self.observer.reset();
        }
        let leaders = self.ready_leaders(world);
        if leaders.is_empty() {
            return Err(StopReason::NoLeader);
        }
        let Some(cheapest) = self.cheapest_action(world, &leaders) else {
            return Err(StopReason::NoJobs);
        };
        if world.gold(self.side) < cheapest {
            return Err(StopReason::NotEnoughGold);
        }
        Ok(())
    }

    /// Analyze the board and blend scores for every ready leader
    pub fn plan<W: GameView>(&mut self, world: &W) -> RecruitmentPlan {
        let ctx = PlanningContext::new(self.side, world);
        let important = compute_important_hexes(&ctx, &self.config.map);

        let recruits = world.recruits(self.side);
        let recall_list = world.recall_list(self.side);
        let enemy_positions: Vec<_> = world
            .units()
            .into_iter()
            .filter(|u| !u.incapacitated && world.is_enemy(self.side, u.side))
            .map(|u| u.position)
            .collect();

        let mut leaders = Vec::new();
        for leader in self.ready_leaders(world) {
            let in_danger = enemy_positions
                .iter()
                .any(|p| p.distance(&leader.position) <= self.config.allocation.danger_radius);
            let ratio_score = if in_danger {
                tracing::info!(side = %self.side, leader = %leader.id, "leader in danger");
                self.economy.set_leader_in_danger();
                self.config.allocation.danger_ratio_score
            } else {
                self.config.ratio_score_for(&leader.id)
            };

            let mut plan = LeaderPlan::new(leader, &recruits, &recall_list, world, ratio_score);
            plan.in_danger = in_danger;
            if plan.candidates.is_empty() {
                tracing::debug!(leader = %plan.leader.id, "leader has no candidates");
                continue;
            }
            leaders.push(plan);
        }

        let mut profile = TerrainProfile::new(important.terrain.clone());
        ScoreBlender::new(&self.config).blend(
            &mut leaders,
            &ctx,
            &mut profile,
            &mut self.simulator,
            &mut self.rng,
        );

        RecruitmentPlan { important, leaders }
    }
}

impl<W: GameView + CommandExecutor> CandidateAction<W> for RecruitmentEngine {
    type Report = AllocationReport;

    fn evaluate(&mut self, world: &W) -> Score {
        match self.readiness(world) {
            Ok(()) => RECRUITMENT_SCORE,
            Err(reason) => {
                tracing::debug!(side = %self.side, ?reason, "recruitment not applicable");
                Score::BAD
            }
        }
    }

    fn execute(&mut self, world: &mut W) -> AllocationReport {
        if let Err(reason) = self.readiness(&*world) {
            return AllocationReport::stopped(reason, self.economy.state());
        }

        self.instructions.refresh();
        let plan = self.plan(&*world);
        let RecruitmentPlan {
            important,
            mut leaders,
        } = plan;
        let jobs = self.instructions.jobs();
        let limits = self.instructions.limits();

        let report = AllocationPlanner::new(
            &self.config,
            &mut self.economy,
            &mut *self.observer,
            &mut self.rng,
        )
        .run(
            world,
            self.side,
            &mut leaders,
            jobs,
            &limits,
            important.units_in_contact,
        );

        if report.stop == StopReason::RecruitListChanged {
            self.invalidate();
        }
        self.economy.finish_cycle();
        tracing::info!(
            side = %self.side,
            issued = report.issued.len(),
            stop = ?report.stop,
            cache_hits = self.simulator.cache().hits(),
            cache_misses = self.simulator.cache().misses(),
            "recruitment cycle finished"
        );
        report
    }
}
