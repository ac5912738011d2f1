//! Recruitment instructions: jobs (quotas) and limits
//!
//! Type tokens match either a unit type id ("Spearman") or a usage
//! ("fighter", "archer", "mixed fighter", "scout", "healer"). An empty token
//! list matches every type.

use serde::{Deserialize, Serialize};

use crate::units::catalog::UnitType;

/// Does any of `tokens` match `unit_type`? Empty matches everything.
pub fn types_match(tokens: &[String], unit_type: &UnitType) -> bool {
    tokens.is_empty()
        || tokens
            .iter()
            .any(|t| t.is_empty() || *t == unit_type.id.0 || *t == unit_type.usage)
}

/// A recruitment quota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub types: Vec<String>,
    /// Leader id this job is restricted to
    pub leader: Option<String>,
    pub importance: i32,
    /// Units wanted; `None` is unlimited
    pub number: Option<u32>,
    /// `number` counts already existing matching units
    pub total: bool,
    /// Failing this job for lack of gold stops the whole cycle
    pub blocker: bool,
    /// Pick one random token per attempt instead of matching all of them
    pub pattern: bool,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            leader: None,
            importance: 0,
            number: None,
            total: false,
            blocker: true,
            pattern: false,
        }
    }
}

impl Job {
    pub fn new(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_importance(mut self, importance: i32) -> Self {
        self.importance = importance;
        self
    }

    pub fn with_leader(mut self, leader: impl Into<String>) -> Self {
        self.leader = Some(leader.into());
        self
    }

    pub fn total(mut self, total: bool) -> Self {
        self.total = total;
        self
    }

    pub fn blocker(mut self, blocker: bool) -> Self {
        self.blocker = blocker;
        self
    }

    pub fn pattern(mut self, pattern: bool) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn matches_leader(&self, leader_id: &str) -> bool {
        self.leader.as_deref().map_or(true, |l| l == leader_id)
    }

    pub fn matches_type(&self, unit_type: &UnitType) -> bool {
        types_match(&self.types, unit_type)
    }
}

/// Upper bound on how many units matching `types` may exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    pub types: Vec<String>,
    pub max: u32,
}

impl Limit {
    pub fn new(types: &[&str], max: u32) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
            max,
        }
    }

    pub fn matches_type(&self, unit_type: &UnitType) -> bool {
        types_match(&self.types, unit_type)
    }
}

/// Per-turn recruitment policy
pub trait InstructionAspect {
    /// Refresh for the current turn
    fn refresh(&mut self) {}

    fn jobs(&self) -> Vec<Job>;

    fn limits(&self) -> Vec<Limit>;
}

/// Fixed instruction set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticInstructions {
    #[serde(rename = "job")]
    pub jobs: Vec<Job>,
    #[serde(rename = "limit")]
    pub limits: Vec<Limit>,
}

impl StaticInstructions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, job: Job) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limits.push(limit);
        self
    }
}

impl InstructionAspect for StaticInstructions {
    /// No jobs means "recruit anything, without limit"
    fn jobs(&self) -> Vec<Job> {
        if self.jobs.is_empty() {
            vec![Job::default()]
        } else {
            self.jobs.clone()
        }
    }

    fn limits(&self) -> Vec<Limit> {
        self.limits.clone()
    }
}
