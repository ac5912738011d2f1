//! Recruitment planner configuration with documented constants
//!
//! Every tunable of the pipeline is collected here with an explanation of its
//! purpose and how it interacts with the others. Sections map one-to-one onto
//! pipeline stages and can be overridden from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::error::{MusterError, Result};
use crate::core::types::Gold;

/// Spatial importance analysis (battle fronts, contested villages)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapAnalysisConfig {
    /// Sides with fewer units than this on the board also seed their cost
    /// field from every leader with every recruitable type.
    ///
    /// Keeps the frontier meaningful on turn one when the board is empty.
    pub unit_threshold: usize,

    /// Maximum difference between own and enemy average move cost for a hex
    /// to count as frontier, in multiples of the local average move cost.
    pub border_thickness: f64,

    /// Fraction of the observed [min, max] frontier cost range that is kept.
    ///
    /// At 0.2 only the nearest fifth of the frontier survives; far-away
    /// frontier segments are not worth recruiting for.
    pub border_width: f64,

    /// A village within this many hexes of an important hex becomes important.
    pub village_nearness: u32,

    /// Radius around important villages (and around contact units) that is
    /// marked as well.
    pub village_surrounding: u32,

    /// Shifts the frontier towards the enemy (positive) or towards us.
    pub offensive_shift: f64,

    /// Multiplier of the terrain-defense score term.
    pub analysis_weight: f64,
}

impl Default for MapAnalysisConfig {
    fn default() -> Self {
        Self {
            unit_threshold: 5,
            border_thickness: 2.0,
            border_width: 0.2,
            village_nearness: 3,
            village_surrounding: 1,
            offensive_shift: 0.0,
            analysis_weight: 1.0,
        }
    }
}

/// Combat value simulation and its score term
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Multiplier of the combat score term (after rescaling to 0..100).
    pub weight: f64,

    /// Exponent applied (sign-preserving) to each `compare * enemy_hp` term.
    ///
    /// Values above 1 exaggerate strong counters.
    pub score_power: f64,

    /// Where the 0 of the rescaled combat score lies: `max - threshold * (max - average)`.
    ///
    /// At 1.0 every below-average candidate gets 0 combat score.
    pub score_threshold: f64,

    /// Credit each enemy only to the single best counter instead of summing
    /// over all candidates.
    pub direct_response: bool,

    /// If fewer enemy units than this are visible, the enemy recruit lists are
    /// used as well (at full hitpoints).
    pub enemy_unit_threshold: usize,

    /// Maximum defense drift (percentage points) for a cached combat value to
    /// be reused.
    pub cache_tolerance: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            weight: 1.0,
            score_power: 1.0,
            score_threshold: 1.0,
            direct_response: false,
            enemy_unit_threshold: 5,
            cache_tolerance: 5.0,
        }
    }
}

/// Diversity and randomness applied after the analytic terms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Flat offset `diversity_weight * 50` added to every score.
    ///
    /// Keeps weak candidates in the mix so the army never becomes a single type.
    pub diversity_weight: f64,

    /// Upper bound of the uniform noise added to every score.
    pub randomness_maximum: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            diversity_weight: 1.0,
            randomness_maximum: 20.0,
        }
    }
}

/// Economic strategy ("save gold" hysteresis and forecast)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveGoldConfig {
    /// Whether SAVE_GOLD actually halts recruitment.
    pub active: bool,

    /// Unit value ratio (own / enemy) above which we start saving.
    pub begin: f64,

    /// Unit value ratio below which we stop saving. Must be below `begin`.
    pub end: f64,

    /// Gold at which everything gets spent. `None` means starting gold + 1.
    pub spend_all_gold: Option<Gold>,

    /// Save even when the income forecast is negative.
    pub save_on_negative_income: bool,

    /// Number of turns the income forecast looks ahead.
    pub forecast_turns: u32,

    /// Expected units lost per turn for each own unit in contact with the enemy.
    pub attrition_per_contact: f64,

    /// Gold per owned village per turn.
    pub village_income: f64,

    /// Upkeep levels supported per owned village.
    pub village_support: f64,
}

impl Default for SaveGoldConfig {
    fn default() -> Self {
        Self {
            active: true,
            begin: 1.5,
            end: 1.1,
            spend_all_gold: None,
            save_on_negative_income: false,
            forecast_turns: 5,
            attrition_per_contact: 1.0 / 3.0,
            village_income: 2.0,
            village_support: 1.0,
        }
    }
}

/// How leader scores are turned into recruit proportions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Blended analyzer scores
    #[default]
    Proportional,
    /// Combat term replaced by the mixed-strategy equilibrium against the enemy roster
    Equilibrium,
}

/// Allocation across leaders and unit types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub mode: AllocationMode,

    /// An enemy within this many hexes puts a leader in danger.
    pub danger_radius: u32,

    /// Ratio score forced onto a leader in danger.
    pub danger_ratio_score: f64,

    /// Ratio score of leaders not listed in `leader_ratio_scores`.
    pub default_ratio_score: f64,

    /// Per-leader ratio score overrides, keyed by leader id.
    pub leader_ratio_scores: BTreeMap<String, f64>,

    /// Pivot limit of the equilibrium solver.
    pub max_pivots: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            mode: AllocationMode::Proportional,
            danger_radius: 3,
            danger_ratio_score: 50.0,
            default_ratio_score: 1.0,
            leader_ratio_scores: BTreeMap::new(),
            max_pivots: 1000,
        }
    }
}

/// Attack target analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Maximum number of attackers combined against one target.
    pub depth: usize,

    /// Once this many analyses exist, multi-unit combinations stop growing.
    pub max_positions: usize,

    /// Leaders never take part in attacks.
    pub passive_leader: bool,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            depth: 5,
            max_positions: 1000,
            passive_leader: false,
        }
    }
}

/// Complete recruitment configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecruitConfig {
    pub map: MapAnalysisConfig,
    pub combat: CombatConfig,
    pub blend: BlendConfig,
    pub save_gold: SaveGoldConfig,
    pub allocation: AllocationConfig,
    pub attack: AttackConfig,
}

impl RecruitConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML; missing sections and keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RecruitConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Ratio score of a leader before danger boosting
    pub fn ratio_score_for(&self, leader_id: &str) -> f64 {
        self.allocation
            .leader_ratio_scores
            .get(leader_id)
            .copied()
            .unwrap_or(self.allocation.default_ratio_score)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MusterError::InvalidConfig(msg));

        // Hysteresis band must be open or the state flaps every turn
        if self.save_gold.begin <= self.save_gold.end {
            return invalid(format!(
                "save_gold.begin ({}) must be greater than save_gold.end ({})",
                self.save_gold.begin, self.save_gold.end
            ));
        }

        if !(0.0..=1.0).contains(&self.map.border_width) {
            return invalid(format!(
                "map.border_width ({}) must be within [0, 1]",
                self.map.border_width
            ));
        }

        if self.map.border_thickness <= 0.0 {
            return invalid("map.border_thickness must be positive".into());
        }

        if self.combat.cache_tolerance < 0.0 {
            return invalid("combat.cache_tolerance must not be negative".into());
        }

        if self.combat.score_power <= 0.0 {
            return invalid("combat.score_power must be positive".into());
        }

        if self.map.analysis_weight < 0.0
            || self.combat.weight < 0.0
            || self.blend.diversity_weight < 0.0
            || self.blend.randomness_maximum < 0.0
        {
            return invalid("score weights must not be negative".into());
        }

        if self.allocation.default_ratio_score <= 0.0
            || self.allocation.danger_ratio_score <= 0.0
            || self.allocation.leader_ratio_scores.values().any(|r| *r <= 0.0)
        {
            return invalid("ratio scores must be positive".into());
        }

        if self.attack.depth == 0 {
            return invalid("attack.depth must be at least 1".into());
        }

        Ok(())
    }
}

/// Load a config from a TOML file
pub fn load_config(path: &Path) -> Result<RecruitConfig> {
    let contents = fs::read_to_string(path)?;
    RecruitConfig::from_toml_str(&contents)
}
