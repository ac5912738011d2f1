//! Combat value simulation
//!
//! Compares two unit types by letting each attack the other once, with both
//! sides picking their weapons as best responses, on the average defense
//! they would have on the contested ground.
//!
//! The result uses a signed-ratio convention that downstream scoring relies on:
//! - `x > 0`: A is `x` times better than B
//! - `x < 0`: B is `|x|` times better than A
//! - `0`: even
//!
//! Read a negative `-x` as "1/x times as good"; under that reading
//! `compare(A, B)` and `compare(B, A)` are reciprocal. Do not "fix" the
//! sign into a plain ratio.

use ahash::AHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::config::CombatConfig;
use crate::core::types::UnitTypeId;
use crate::recruit::terrain_profile::TerrainProfile;
use crate::units::catalog::{Attack, UnitCatalog, UnitType};

/// Hitpoints lost at the end of a turn while poisoned
pub const POISON_AMOUNT: u32 = 8;

/// Below this much damage a side counts as untouched
const NO_DAMAGE: f64 = 1e-9;

/// Outcomes within this margin are treated as equal when choosing weapons
const COMPARE_MARGIN: f64 = 0.01;

/// One side of an exchange
#[derive(Debug, Clone, Copy)]
pub struct Combatant<'a> {
    pub unit_type: &'a UnitType,
    pub hitpoints: u32,
    /// Chance (percent) to avoid a hit
    pub defense: f64,
}

impl<'a> Combatant<'a> {
    /// Unhurt unit of `unit_type`
    pub fn fresh(unit_type: &'a UnitType, defense: f64) -> Self {
        Self {
            unit_type,
            hitpoints: unit_type.hitpoints,
            defense,
        }
    }

    /// Base chance (percent) of being hit
    fn chance_to_be_hit(&self) -> u32 {
        (100.0 - self.defense).round().clamp(0.0, 100.0) as u32
    }
}

/// Expected result of an exchange for one side
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CombatantOutcome {
    pub death_chance: f64,
    /// Expected hitpoints afterwards, poison not yet applied
    pub average_hp: f64,
    /// Chance to survive poisoned
    pub poison_chance: f64,
    /// Expected hitpoints the poison will take
    pub poison_damage: f64,
}

impl CombatantOutcome {
    fn untouched(hitpoints: u32) -> Self {
        Self {
            average_hp: hitpoints as f64,
            ..Default::default()
        }
    }

    pub fn average_hp_after_poison(&self) -> f64 {
        self.average_hp - self.poison_damage
    }
}

/// Result of one attack with the chosen weapons
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExchangeOutcome {
    pub attacker: CombatantOutcome,
    pub defender: CombatantOutcome,
    /// Index into the attacker's attacks, `None` if it has none
    pub attacker_weapon: Option<usize>,
    /// Index into the defender's attacks, `None` if it cannot retaliate
    pub defender_weapon: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Strike {
    /// Probability in [0, 1]
    chance: f64,
    damage: u32,
    slowed_damage: u32,
    slows: bool,
    poisons: bool,
}

impl Strike {
    fn new(weapon: &Attack, target: &Combatant, offense: bool) -> Self {
        let mut taken = target.unit_type.resistance_against(weapon);
        // Steadfast only works while defending
        if offense && target.unit_type.has_ability("steadfast") && taken < 100 {
            taken = (taken * 2 - 100).max(50);
        }
        let damage = if weapon.damage == 0 {
            0
        } else {
            ((weapon.damage as f64 * taken.max(0) as f64 / 100.0).round() as u32).max(1)
        };
        Self {
            chance: weapon.chance_to_hit(target.chance_to_be_hit(), offense) as f64 / 100.0,
            damage,
            slowed_damage: if damage == 0 { 0 } else { (damage / 2).max(1) },
            slows: weapon.specials.slow,
            poisons: weapon.specials.poison && !target.unit_type.unpoisonable,
        }
    }
}

const SLOWED_ATTACKER: u8 = 1;
const SLOWED_DEFENDER: u8 = 2;
const POISONED_ATTACKER: u8 = 4;
const POISONED_DEFENDER: u8 = 8;

/// Joint distribution over (attacker hp, defender hp, status flags)
///
/// Ordered so that summing probabilities is reproducible.
type StateMap = BTreeMap<(u32, u32, u8), f64>;

fn apply_strike(states: StateMap, strike: &Strike, by_attacker: bool) -> StateMap {
    let mut next = StateMap::new();
    for ((attacker_hp, defender_hp, flags), p) in states {
        if attacker_hp == 0 || defender_hp == 0 {
            *next.entry((attacker_hp, defender_hp, flags)).or_insert(0.0) += p;
            continue;
        }

        let (slowed, slow_flag, poison_flag) = if by_attacker {
            (flags & SLOWED_ATTACKER != 0, SLOWED_DEFENDER, POISONED_DEFENDER)
        } else {
            (flags & SLOWED_DEFENDER != 0, SLOWED_ATTACKER, POISONED_ATTACKER)
        };
        let damage = if slowed {
            strike.slowed_damage
        } else {
            strike.damage
        };

        let miss = p * (1.0 - strike.chance);
        if miss > 0.0 {
            *next.entry((attacker_hp, defender_hp, flags)).or_insert(0.0) += miss;
        }

        let hit = p * strike.chance;
        if hit > 0.0 {
            let target_hp = if by_attacker { defender_hp } else { attacker_hp };
            let remaining = target_hp.saturating_sub(damage);
            let mut hit_flags = flags;
            if remaining > 0 && strike.slows {
                hit_flags |= slow_flag;
            }
            if remaining > 0 && strike.poisons {
                hit_flags |= poison_flag;
            }
            let key = if by_attacker {
                (attacker_hp, remaining, hit_flags)
            } else {
                (remaining, defender_hp, hit_flags)
            };
            *next.entry(key).or_insert(0.0) += hit;
        }
    }
    next
}

fn summarize(states: &StateMap, attacker_side: bool) -> CombatantOutcome {
    let poison_flag = if attacker_side {
        POISONED_ATTACKER
    } else {
        POISONED_DEFENDER
    };
    let mut outcome = CombatantOutcome::default();
    for ((attacker_hp, defender_hp, flags), p) in states {
        let hp = if attacker_side {
            *attacker_hp
        } else {
            *defender_hp
        };
        if hp == 0 {
            outcome.death_chance += p;
            continue;
        }
        outcome.average_hp += p * hp as f64;
        if flags & poison_flag != 0 {
            outcome.poison_chance += p;
            outcome.poison_damage += p * POISON_AMOUNT.min(hp - 1) as f64;
        }
    }
    outcome
}

/// Expected outcome of `attacker` striking `defender` with fixed weapons
///
/// Strikes alternate, attacker first, until both weapons are spent or one
/// side dies. Without a defender weapon there is no retaliation.
pub fn simulate_exchange(
    attacker: &Combatant,
    defender: &Combatant,
    attacker_weapon: &Attack,
    defender_weapon: Option<&Attack>,
) -> (CombatantOutcome, CombatantOutcome) {
    let offense = Strike::new(attacker_weapon, defender, true);
    let retaliation = defender_weapon.map(|w| Strike::new(w, attacker, false));

    let attacker_strikes = attacker_weapon.strikes;
    let defender_strikes = defender_weapon.map_or(0, |w| w.strikes);

    let mut states = StateMap::new();
    states.insert((attacker.hitpoints, defender.hitpoints, 0), 1.0);
    for round in 0..attacker_strikes.max(defender_strikes) {
        if round < attacker_strikes {
            states = apply_strike(states, &offense, true);
        }
        if let Some(strike) = retaliation.as_ref().filter(|_| round < defender_strikes) {
            states = apply_strike(states, strike, false);
        }
    }

    (summarize(&states, true), summarize(&states, false))
}

/// Is outcome `a` better than `b` for `us`?
///
/// Kill chances first, then hitpoint balance with poison, then the lower
/// remaining hitpoints of the opponent.
pub fn better_combat(
    us_a: &CombatantOutcome,
    them_a: &CombatantOutcome,
    us_b: &CombatantOutcome,
    them_b: &CombatantOutcome,
    harm_weight: f64,
) -> bool {
    let a = them_a.death_chance - us_a.death_chance * harm_weight;
    let b = them_b.death_chance - us_b.death_chance * harm_weight;
    if a - b < -COMPARE_MARGIN {
        return false;
    }
    if a - b > COMPARE_MARGIN {
        return true;
    }

    let a = us_a.average_hp_after_poison() * harm_weight - them_a.average_hp_after_poison();
    let b = us_b.average_hp_after_poison() * harm_weight - them_b.average_hp_after_poison();
    if a - b < -COMPARE_MARGIN {
        return false;
    }
    if a - b > COMPARE_MARGIN {
        return true;
    }

    them_a.average_hp < them_b.average_hp
}

/// `attacker` attacks `defender`, both choosing weapons as best responses
pub fn best_exchange(attacker: &Combatant, defender: &Combatant) -> ExchangeOutcome {
    let mut best: Option<ExchangeOutcome> = None;

    for (a_index, a_weapon) in attacker.unit_type.attacks.iter().enumerate() {
        // Defender answers with its best weapon of the same range
        let mut response: Option<ExchangeOutcome> = None;
        for (d_index, d_weapon) in defender.unit_type.attacks.iter().enumerate() {
            if d_weapon.range != a_weapon.range {
                continue;
            }
            let (att, def) = simulate_exchange(attacker, defender, a_weapon, Some(d_weapon));
            let candidate = ExchangeOutcome {
                attacker: att,
                defender: def,
                attacker_weapon: Some(a_index),
                defender_weapon: Some(d_index),
            };
            let better = response.as_ref().map_or(true, |current| {
                better_combat(
                    &candidate.defender,
                    &candidate.attacker,
                    &current.defender,
                    &current.attacker,
                    1.0,
                )
            });
            if better {
                response = Some(candidate);
            }
        }
        let candidate = response.unwrap_or_else(|| {
            let (att, def) = simulate_exchange(attacker, defender, a_weapon, None);
            ExchangeOutcome {
                attacker: att,
                defender: def,
                attacker_weapon: Some(a_index),
                defender_weapon: None,
            }
        });

        let better = best.as_ref().map_or(true, |current| {
            better_combat(
                &candidate.attacker,
                &candidate.defender,
                &current.attacker,
                &current.defender,
                1.0,
            )
        });
        if better {
            best = Some(candidate);
        }
    }

    best.unwrap_or(ExchangeOutcome {
        attacker: CombatantOutcome::untouched(attacker.hitpoints),
        defender: CombatantOutcome::untouched(defender.hitpoints),
        attacker_weapon: None,
        defender_weapon: None,
    })
}

/// Expected damage (to A, to B) summed over "A attacks B" and "B attacks A"
pub fn exchange_damage(a: &UnitType, b: &UnitType, defense_a: f64, defense_b: f64) -> (f64, f64) {
    let first = Combatant::fresh(a, defense_a);
    let second = Combatant::fresh(b, defense_b);

    let a_attacks = best_exchange(&first, &second);
    let b_attacks = best_exchange(&second, &first);

    let hp_a = a.hitpoints as f64;
    let hp_b = b.hitpoints as f64;
    let damage_to_a = (hp_a - a_attacks.attacker.average_hp_after_poison())
        + (hp_a - b_attacks.defender.average_hp_after_poison());
    let damage_to_b = (hp_b - a_attacks.defender.average_hp_after_poison())
        + (hp_b - b_attacks.attacker.average_hp_after_poison());
    (damage_to_a, damage_to_b)
}

/// Signed comparison of A against B; see the module docs
pub fn compare_unit_types(a: &UnitType, b: &UnitType, defense_a: f64, defense_b: f64) -> f64 {
    let (damage_to_a, damage_to_b) = exchange_damage(a, b, defense_a, defense_b);

    let a_hurt = damage_to_a > NO_DAMAGE;
    let b_hurt = damage_to_b > NO_DAMAGE;
    match (a_hurt, b_hurt) {
        (false, false) => return 1.0,
        (false, true) => return 2.0,
        (true, false) => return 0.5,
        (true, true) => {}
    }

    let cost_a = a.cost.max(1) as f64;
    let cost_b = b.cost.max(1) as f64;
    let max_hp_a = a.hitpoints.max(1) as f64;
    let max_hp_b = b.hitpoints.max(1) as f64;

    let value_of_a = damage_to_b / (max_hp_b * cost_a);
    let value_of_b = damage_to_a / (max_hp_a * cost_b);

    if value_of_a > value_of_b {
        value_of_a / value_of_b
    } else if value_of_a < value_of_b {
        -(value_of_b / value_of_a)
    } else {
        0.0
    }
}

/// A cached comparison at the defenses it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombatSample {
    pub defense_a: f64,
    pub defense_b: f64,
    pub value: f64,
}

/// Comparison results keyed by ordered type pair
///
/// A sample answers a query when both defenses are within the tolerance;
/// the nearest such sample wins. Never invalidated.
#[derive(Debug, Clone, Default)]
pub struct CombatValueCache {
    samples: AHashMap<(UnitTypeId, UnitTypeId), Vec<CombatSample>>,
    hits: u64,
    misses: u64,
}

impl CombatValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(
        &mut self,
        a: &UnitTypeId,
        b: &UnitTypeId,
        defense_a: f64,
        defense_b: f64,
        tolerance: f64,
    ) -> Option<f64> {
        let found = self
            .samples
            .get(&(a.clone(), b.clone()))
            .and_then(|samples| {
                samples
                    .iter()
                    .filter(|s| {
                        (s.defense_a - defense_a).abs() <= tolerance
                            && (s.defense_b - defense_b).abs() <= tolerance
                    })
                    .map(|s| {
                        let distance =
                            (s.defense_a - defense_a).abs() + (s.defense_b - defense_b).abs();
                        (distance, s.value)
                    })
                    .min_by(|x, y| x.0.total_cmp(&y.0))
            })
            .map(|(_, value)| value);

        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        found
    }

    pub fn insert(&mut self, a: UnitTypeId, b: UnitTypeId, sample: CombatSample) {
        self.samples.entry((a, b)).or_default().push(sample);
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Cached `compare_unit_types` on the current terrain profile
#[derive(Debug, Clone)]
pub struct CombatSimulator {
    cache: CombatValueCache,
    tolerance: f64,
}

impl CombatSimulator {
    pub fn new(config: &CombatConfig) -> Self {
        Self {
            cache: CombatValueCache::new(),
            tolerance: config.cache_tolerance,
        }
    }

    pub fn cache(&self) -> &CombatValueCache {
        &self.cache
    }

    /// Signed comparison of `a` against `b`; 0.0 if either type is unknown
    pub fn compare_types(
        &mut self,
        catalog: &dyn UnitCatalog,
        profile: &mut TerrainProfile,
        a: &UnitTypeId,
        b: &UnitTypeId,
    ) -> f64 {
        let (Some(type_a), Some(type_b)) = (catalog.unit_type(a), catalog.unit_type(b)) else {
            tracing::warn!(a = %a, b = %b, "cannot compare unknown unit type");
            return 0.0;
        };

        let defense_a = profile.average_defense(catalog, a);
        let defense_b = profile.average_defense(catalog, b);
        if let Some(value) = self
            .cache
            .lookup(a, b, defense_a, defense_b, self.tolerance)
        {
            return value;
        }

        let value = compare_unit_types(type_a, type_b, defense_a, defense_b);
        tracing::debug!(a = %a, b = %b, defense_a, defense_b, value, "combat comparison");
        self.cache.insert(
            a.clone(),
            b.clone(),
            CombatSample {
                defense_a,
                defense_b,
                value,
            },
        );
        value
    }
}
