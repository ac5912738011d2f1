//! Per-leader planning data for one cycle

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::{Gold, UnitTypeId};
use crate::game::instructions::types_match;
use crate::game::ledger::{LeaderInfo, RecallUnit};
use crate::units::catalog::UnitCatalog;

/// Desirability of each candidate type
///
/// Scores are raw: every pipeline stage adds to or scales them. They become
/// a distribution only through `normalized`, which never writes back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreMap(BTreeMap<UnitTypeId, f64>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map with every id at 0.0
    pub fn zeroed<'a>(ids: impl IntoIterator<Item = &'a UnitTypeId>) -> Self {
        Self(ids.into_iter().map(|id| (id.clone(), 0.0)).collect())
    }

    pub fn get(&self, id: &UnitTypeId) -> f64 {
        self.0.get(id).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, id: UnitTypeId, score: f64) {
        self.0.insert(id, score);
    }

    pub fn add(&mut self, id: &UnitTypeId, delta: f64) {
        if let Some(score) = self.0.get_mut(id) {
            *score += delta;
        }
    }

    pub fn contains(&self, id: &UnitTypeId) -> bool {
        self.0.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &UnitTypeId> + '_ {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitTypeId, f64)> + '_ {
        self.0.iter().map(|(id, score)| (id, *score))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Scores divided by their sum; returned verbatim when the sum is zero
    pub fn normalized(&self) -> ScoreMap {
        let sum = self.sum();
        if sum == 0.0 {
            return self.clone();
        }
        Self(
            self.0
                .iter()
                .map(|(id, score)| (id.clone(), score / sum))
                .collect(),
        )
    }
}

impl FromIterator<(UnitTypeId, f64)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (UnitTypeId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One recruiting leader's view of this cycle
#[derive(Debug, Clone, Serialize)]
pub struct LeaderPlan {
    pub leader: LeaderInfo,
    /// Team recruits, leader extra recruits and recallable types
    pub candidates: BTreeSet<UnitTypeId>,
    /// Types this leader can buy fresh
    pub recruitable: BTreeSet<UnitTypeId>,
    /// Recall list entries passing this leader's recall filter
    pub recalls: Vec<RecallUnit>,
    pub scores: ScoreMap,
    /// Share of this cycle's actions this leader should take
    pub ratio_score: f64,
    /// Successful actions this cycle
    pub recruit_count: u32,
    pub in_danger: bool,
}

impl LeaderPlan {
    /// Gather candidates for `leader`; unknown type ids are dropped
    pub fn new(
        leader: LeaderInfo,
        team_recruits: &[UnitTypeId],
        recall_list: &[RecallUnit],
        catalog: &dyn UnitCatalog,
        ratio_score: f64,
    ) -> Self {
        let recruitable: BTreeSet<UnitTypeId> = team_recruits
            .iter()
            .chain(leader.extra_recruits.iter())
            .filter(|id| {
                let known = catalog.unit_type(id).is_some();
                if !known {
                    tracing::warn!(unit_type = %id, "recruit list names an unknown unit type");
                }
                known
            })
            .cloned()
            .collect();

        let recalls: Vec<RecallUnit> = recall_list
            .iter()
            .filter(|recall| {
                catalog
                    .unit_type(&recall.type_id)
                    .is_some_and(|t| types_match(&leader.recall_filter, t))
            })
            .cloned()
            .collect();

        let candidates: BTreeSet<UnitTypeId> = recruitable
            .iter()
            .cloned()
            .chain(recalls.iter().map(|r| r.type_id.clone()))
            .collect();

        Self {
            scores: ScoreMap::zeroed(&candidates),
            leader,
            candidates,
            recruitable,
            recalls,
            ratio_score,
            recruit_count: 0,
            in_danger: false,
        }
    }

    /// Cheapest fresh recruit, `None` if the leader has nothing to buy
    pub fn cheapest_recruit_cost(&self, catalog: &dyn UnitCatalog) -> Option<Gold> {
        self.recruitable
            .iter()
            .filter_map(|id| catalog.unit_type(id))
            .map(|t| t.cost)
            .min()
    }
}
