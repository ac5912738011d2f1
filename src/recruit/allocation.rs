//! Allocation: spending gold one command at a time
//!
//! Each iteration re-checks the economy, picks the most important open job,
//! the leader furthest behind its fair share and the candidate furthest
//! behind its desired share, then recruits or recalls it. The loop ends on
//! the first of: saving gold, no open jobs, a blocking gold failure, no
//! leaders left, or a change signal from the game.
//!
//! Progress: every iteration either issues a successful command, cancels a
//! job, retires a leader or stops.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::config::RecruitConfig;
use crate::core::types::{Gold, SideId, UnitTypeId};
use crate::game::executor::{Command, CommandExecutor, CommandFailure};
use crate::game::instructions::{types_match, Job, Limit};
use crate::game::ledger::{GameLedger, RecallUnit};
use crate::game::observer::ChangeObserver;
use crate::map::hex::HexCoord;
use crate::recruit::economy::{EconomicState, EconomySnapshot, EconomyTracker};
use crate::recruit::plan::LeaderPlan;
use crate::recruit::{GameView, PlanningContext};
use crate::units::catalog::UnitCatalog;

/// Why a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every job is satisfied or cancelled
    #[default]
    NoJobs,
    /// The economy decided to save gold
    SaveGold,
    /// A blocking job ran out of gold
    Blocked,
    RecruitListChanged,
    GamestateChanged,
    /// No leader can act
    NoLeader,
    /// Gold is below the cheapest recruit
    NotEnoughGold,
}

/// A command that went through
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedCommand {
    pub leader: String,
    pub type_id: UnitTypeId,
    pub command: Command,
}

/// A command the executor rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedCommand {
    pub leader: String,
    pub command: Command,
    pub failure: CommandFailure,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllocationReport {
    pub issued: Vec<IssuedCommand>,
    pub failures: Vec<FailedCommand>,
    pub stop: StopReason,
    /// Successful commands per leader id
    pub recruit_counts: BTreeMap<String, u32>,
    pub state: EconomicState,
}

impl AllocationReport {
    /// Report of a cycle that did nothing
    pub fn stopped(stop: StopReason, state: EconomicState) -> Self {
        Self {
            stop,
            state,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// A job with its quota bookkeeping for this cycle
#[derive(Debug, Clone)]
struct OpenJob {
    job: Job,
    /// Quota left for non-total jobs
    remaining: Option<u32>,
    cancelled: bool,
}

impl OpenJob {
    fn new(job: Job) -> Self {
        Self {
            remaining: job.number,
            job,
            cancelled: false,
        }
    }

    /// Units still wanted; `None` is unlimited
    fn wanted(&self, counts: &BTreeMap<UnitTypeId, u32>, catalog: &dyn UnitCatalog) -> Option<u32> {
        match self.job.number {
            None => None,
            Some(number) if self.job.total => {
                Some(number.saturating_sub(count_matching(&self.job.types, counts, catalog)))
            }
            Some(_) => self.remaining,
        }
    }
}

/// What a leader would do to get one more unit of a type
#[derive(Debug, Clone)]
enum Action {
    Recruit(UnitTypeId),
    Recall(RecallUnit),
}

impl Action {
    fn command(&self, leader_position: HexCoord) -> Command {
        match self {
            Action::Recruit(type_id) => Command::recruit(type_id.clone(), leader_position),
            Action::Recall(recall) => Command::recall(recall.id, leader_position),
        }
    }
}

/// Own units on the board by type, leaders excluded
fn own_unit_counts(ledger: &dyn GameLedger, side: SideId) -> BTreeMap<UnitTypeId, u32> {
    let mut counts = BTreeMap::new();
    for unit in ledger.units() {
        if unit.side == side && !unit.can_recruit {
            *counts.entry(unit.type_id).or_insert(0) += 1;
        }
    }
    counts
}

fn count_matching(
    tokens: &[String],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> u32 {
    counts
        .iter()
        .filter(|(id, _)| {
            catalog
                .unit_type(id)
                .is_some_and(|t| types_match(tokens, t))
        })
        .map(|(_, count)| count)
        .sum()
}

/// Estimated worth of a recall list entry: its cost plus the experience
/// share of what advancing would add
pub fn recall_value(recall: &RecallUnit, catalog: &dyn UnitCatalog) -> f64 {
    let Some(unit_type) = catalog.unit_type(&recall.type_id) else {
        return 0.0;
    };
    let base = unit_type.cost as f64;
    let progress = if recall.max_experience == 0 {
        0.0
    } else {
        (recall.experience as f64 / recall.max_experience as f64).min(1.0)
    };

    let advanced: Vec<f64> = unit_type
        .advances_to
        .iter()
        .filter_map(|id| catalog.unit_type(id))
        .map(|t| t.cost as f64)
        .collect();
    let advanced_cost = if advanced.is_empty() {
        base
    } else {
        advanced.iter().sum::<f64>() / advanced.len() as f64
    };

    base + progress * (advanced_cost - base).max(0.0)
}

/// Spends gold for one side over one cycle
pub struct AllocationPlanner<'a, R: Rng + ?Sized> {
    config: &'a RecruitConfig,
    economy: &'a mut EconomyTracker,
    observer: &'a mut dyn ChangeObserver,
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> AllocationPlanner<'a, R> {
    pub fn new(
        config: &'a RecruitConfig,
        economy: &'a mut EconomyTracker,
        observer: &'a mut dyn ChangeObserver,
        rng: &'a mut R,
    ) -> Self {
        Self {
            config,
            economy,
            observer,
            rng,
        }
    }

    pub fn run<W: GameView + CommandExecutor>(
        &mut self,
        world: &mut W,
        side: SideId,
        plans: &mut [LeaderPlan],
        jobs: Vec<Job>,
        limits: &[Limit],
        units_in_contact: u32,
    ) -> AllocationReport {
        let mut report = AllocationReport::default();
        let mut jobs: Vec<OpenJob> = jobs.into_iter().map(OpenJob::new).collect();
        let mut retired: BTreeSet<usize> = BTreeSet::new();
        let mut total_actions: u32 = plans.iter().map(|p| p.recruit_count).sum();

        report.stop = loop {
            let ctx = PlanningContext::new(side, &*world);
            let snapshot = EconomySnapshot::gather(&ctx, units_in_contact);
            self.economy.update(&snapshot, &self.config.save_gold);
            if self.economy.halts_recruiting(&self.config.save_gold) {
                break StopReason::SaveGold;
            }

            if retired.len() == plans.len() {
                break StopReason::NoLeader;
            }

            let counts = own_unit_counts(&*world, side);
            let Some(job_index) = pick_job(&jobs, &counts, &*world) else {
                break StopReason::NoJobs;
            };
            let job = jobs[job_index].job.clone();

            let eligible: Vec<usize> = (0..plans.len())
                .filter(|i| !retired.contains(i))
                .filter(|i| job.matches_leader(&plans[*i].leader.id))
                .filter(|i| serves(&plans[*i], &job, limits, &counts, &*world))
                .collect();
            let Some(leader_index) = self.pick_leader(plans, eligible, total_actions) else {
                tracing::debug!(job = ?job.types, "no leader can serve job, cancelled");
                jobs[job_index].cancelled = true;
                continue;
            };

            // Pattern jobs draw one token per attempt
            let tokens = if is_pattern(&job) {
                pattern_tokens(&plans[leader_index], &job, limits, &counts, &*world)
                    .choose(&mut *self.rng)
                    .map(|token| vec![token.clone()])
                    .unwrap_or_default()
            } else {
                job.types.clone()
            };

            let plan = &plans[leader_index];
            let gold = world.gold(side);
            let recall_cost = world.recall_cost(side);
            let Some((type_id, action)) =
                pick_candidate(plan, &tokens, limits, &counts, &*world, gold, recall_cost)
            else {
                jobs[job_index].cancelled = true;
                continue;
            };

            let command = action.command(plan.leader.position);
            let leader_id = plan.leader.id.clone();

            self.observer.reset();
            match world.execute(side, &command) {
                Ok(()) => {
                    tracing::info!(
                        %side,
                        leader = %leader_id,
                        unit_type = %type_id,
                        ?command,
                        "issued"
                    );
                    plans[leader_index].recruit_count += 1;
                    total_actions += 1;
                    if let Action::Recall(recall) = &action {
                        for plan in plans.iter_mut() {
                            plan.recalls.retain(|r| r.id != recall.id);
                        }
                    }
                    let open = &mut jobs[job_index];
                    if !open.job.total {
                        open.remaining = open.remaining.map(|r| r.saturating_sub(1));
                    }
                    report.issued.push(IssuedCommand {
                        leader: leader_id,
                        type_id,
                        command,
                    });

                    if self.observer.recruit_list_changed() {
                        break StopReason::RecruitListChanged;
                    }
                    if self.observer.gamestate_changed_count() > 1 {
                        break StopReason::GamestateChanged;
                    }
                }
                Err(failure) => {
                    tracing::debug!(
                        %side,
                        leader = %leader_id,
                        unit_type = %type_id,
                        %failure,
                        "command failed"
                    );
                    report.failures.push(FailedCommand {
                        leader: leader_id,
                        command,
                        failure: failure.clone(),
                    });
                    if failure == CommandFailure::NoGold {
                        self.economy.on_no_gold();
                        if job.blocker {
                            break StopReason::Blocked;
                        }
                        jobs[job_index].cancelled = true;
                    } else {
                        tracing::warn!(
                            leader = %plans[leader_index].leader.id,
                            %failure,
                            "leader retired for this cycle"
                        );
                        retired.insert(leader_index);
                    }
                }
            }
        };

        report.recruit_counts = plans
            .iter()
            .map(|p| (p.leader.id.clone(), p.recruit_count))
            .collect();
        report.state = self.economy.state();
        tracing::debug!(
            %side,
            stop = ?report.stop,
            issued = report.issued.len(),
            "allocation finished"
        );
        report
    }

    /// The leader furthest below its desired share of this cycle's actions
    fn pick_leader(
        &mut self,
        plans: &[LeaderPlan],
        mut eligible: Vec<usize>,
        total_actions: u32,
    ) -> Option<usize> {
        let ratio_sum: f64 = plans.iter().map(|p| p.ratio_score).sum();
        if ratio_sum <= 0.0 {
            return eligible.first().copied();
        }
        eligible.shuffle(&mut *self.rng);

        let mut best: Option<(f64, usize)> = None;
        for index in eligible {
            let plan = &plans[index];
            let share = plan.ratio_score / ratio_sum;
            let desired = share * (total_actions + 1) as f64 - plan.recruit_count as f64;
            if best.map_or(true, |(max, _)| desired > max) {
                best = Some((desired, index));
            }
        }
        best.map(|(_, index)| index)
    }
}

/// Tokens of a pattern job under which `plan` has an eligible candidate
fn pattern_tokens(
    plan: &LeaderPlan,
    job: &Job,
    limits: &[Limit],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> Vec<String> {
    job.types
        .iter()
        .filter(|token| {
            let tokens = [(*token).clone()];
            !eligible_candidates(plan, &tokens, limits, counts, catalog).is_empty()
        })
        .cloned()
        .collect()
}

fn is_pattern(job: &Job) -> bool {
    job.pattern && !job.types.is_empty()
}

/// Can `plan` offer anything for `job`?
fn serves(
    plan: &LeaderPlan,
    job: &Job,
    limits: &[Limit],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> bool {
    if is_pattern(job) {
        !pattern_tokens(plan, job, limits, counts, catalog).is_empty()
    } else {
        !eligible_candidates(plan, &job.types, limits, counts, catalog).is_empty()
    }
}

/// Highest importance first, then the largest remaining quota
fn pick_job(
    jobs: &[OpenJob],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> Option<usize> {
    let mut best: Option<((i32, u64), usize)> = None;
    for (index, open) in jobs.iter().enumerate() {
        if open.cancelled {
            continue;
        }
        let wanted = open.wanted(counts, catalog);
        if wanted == Some(0) {
            continue;
        }
        let key = (open.job.importance, wanted.map_or(u64::MAX, u64::from));
        if best.map_or(true, |(max, _)| key > max) {
            best = Some((key, index));
        }
    }
    best.map(|(_, index)| index)
}

/// Does no limit forbid another unit of `type_id`?
fn within_limits(
    type_id: &UnitTypeId,
    limits: &[Limit],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> bool {
    let Some(unit_type) = catalog.unit_type(type_id) else {
        return false;
    };
    limits
        .iter()
        .filter(|limit| limit.matches_type(unit_type))
        .all(|limit| count_matching(&limit.types, counts, catalog) < limit.max)
}

/// Candidates of `plan` matching `tokens`, within limits, recruitable or recallable
fn eligible_candidates<'p>(
    plan: &'p LeaderPlan,
    tokens: &[String],
    limits: &[Limit],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
) -> Vec<&'p UnitTypeId> {
    plan.candidates
        .iter()
        .filter(|id| {
            catalog
                .unit_type(id)
                .is_some_and(|t| types_match(tokens, t))
        })
        .filter(|id| within_limits(id, limits, counts, catalog))
        .filter(|id| {
            plan.recruitable.contains(*id) || plan.recalls.iter().any(|r| &r.type_id == *id)
        })
        .collect()
}

/// Recall the most valuable fitting individual when it is worth the recall
/// cost (or the only way to get the type), else recruit
fn choose_action(
    plan: &LeaderPlan,
    type_id: &UnitTypeId,
    catalog: &dyn UnitCatalog,
    recall_cost: Gold,
) -> Option<(Action, Gold)> {
    let best_recall = plan
        .recalls
        .iter()
        .filter(|r| &r.type_id == type_id)
        .map(|r| (recall_value(r, catalog), r))
        .max_by(|a, b| a.0.total_cmp(&b.0));
    let recruitable = plan.recruitable.contains(type_id);

    match best_recall {
        Some((value, recall)) if value >= recall_cost as f64 || !recruitable => {
            Some((Action::Recall(recall.clone()), recall_cost))
        }
        _ if recruitable => {
            let cost = catalog.unit_type(type_id)?.cost;
            Some((Action::Recruit(type_id.clone()), cost))
        }
        _ => None,
    }
}

/// The candidate furthest below its desired population share
///
/// Affordable candidates win over unaffordable ones; if nothing is
/// affordable the best is returned anyway so the executor reports the lack
/// of gold.
fn pick_candidate(
    plan: &LeaderPlan,
    tokens: &[String],
    limits: &[Limit],
    counts: &BTreeMap<UnitTypeId, u32>,
    catalog: &dyn UnitCatalog,
    gold: Gold,
    recall_cost: Gold,
) -> Option<(UnitTypeId, Action)> {
    let normalized = plan.scores.normalized();
    let population: u32 = plan
        .candidates
        .iter()
        .map(|id| counts.get(id).copied().unwrap_or(0))
        .sum();

    let mut best_affordable: Option<(f64, UnitTypeId, Action)> = None;
    let mut best_overall: Option<(f64, UnitTypeId, Action)> = None;
    for type_id in eligible_candidates(plan, tokens, limits, counts, catalog) {
        let Some((action, cost)) = choose_action(plan, type_id, catalog, recall_cost) else {
            continue;
        };
        let current = counts.get(type_id).copied().unwrap_or(0) as f64;
        let desired = normalized.get(type_id) * (population + 1) as f64 - current;

        if cost <= gold && best_affordable.as_ref().map_or(true, |(max, _, _)| desired > *max) {
            best_affordable = Some((desired, type_id.clone(), action.clone()));
        }
        if best_overall.as_ref().map_or(true, |(max, _, _)| desired > *max) {
            best_overall = Some((desired, type_id.clone(), action));
        }
    }

    best_affordable
        .or(best_overall)
        .map(|(_, type_id, action)| (type_id, action))
}
