//! Unit type definitions and the read-only unit catalog
//!
//! A unit type carries everything the recruitment analysis needs: cost,
//! hitpoints, weapons, per-terrain movement and defense, resistances and the
//! advancement tree.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{Gold, UnitTypeId};
use crate::map::terrain::Terrain;

/// Movement cost meaning "cannot enter"
pub const UNREACHABLE: u32 = 99;

/// Weapon range; defenders can only retaliate with a weapon of the same range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackRange {
    Melee,
    Ranged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Blade,
    Pierce,
    Impact,
    Fire,
    Cold,
    Arcane,
}

/// Weapon specials that matter for the combat approximation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackSpecials {
    pub poison: bool,
    pub backstab: bool,
    pub slow: bool,
    /// Fixed chance to hit, regardless of terrain
    pub magical: bool,
    /// Chance to hit is at least 60% on offense
    pub marksman: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub range: AttackRange,
    pub damage_type: DamageType,
    pub damage: u32,
    pub strikes: u32,
    #[serde(default)]
    pub specials: AttackSpecials,
}

impl Attack {
    pub fn new(
        name: impl Into<String>,
        range: AttackRange,
        damage_type: DamageType,
        damage: u32,
        strikes: u32,
    ) -> Self {
        Self {
            name: name.into(),
            range,
            damage_type,
            damage,
            strikes,
            specials: AttackSpecials::default(),
        }
    }

    pub fn with_specials(mut self, specials: AttackSpecials) -> Self {
        self.specials = specials;
        self
    }

    /// Chance (percent) that one strike hits a target whose chance to be hit is `base`
    pub fn chance_to_hit(&self, base: u32, offense: bool) -> u32 {
        if self.specials.magical {
            70
        } else if self.specials.marksman && offense {
            base.max(60)
        } else {
            base
        }
        .min(100)
    }
}

/// Per-terrain movement cost and chance to be hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementProfile {
    #[serde(default)]
    pub costs: BTreeMap<Terrain, u32>,
    /// Chance to be hit (percent) on each terrain
    #[serde(default)]
    pub defense: BTreeMap<Terrain, u32>,
}

impl MovementProfile {
    /// Cost of entering `terrain`; terrains not listed are unreachable
    pub fn cost(&self, terrain: Terrain) -> u32 {
        self.costs.get(&terrain).copied().unwrap_or(UNREACHABLE)
    }

    /// Chance to be hit on `terrain`; terrains not listed give no defense
    pub fn defense_modifier(&self, terrain: Terrain) -> u32 {
        self.defense.get(&terrain).copied().unwrap_or(100).min(100)
    }

    /// Named movement profiles, so catalogs do not have to spell out every terrain
    pub fn preset(name: &str) -> Option<MovementProfile> {
        use Terrain::*;
        // (terrain, cost, chance to be hit)
        let table: &[(Terrain, u32, u32)] = match name {
            "smallfoot" => &[
                (Flat, 1, 60), (Road, 1, 60), (Forest, 2, 50), (Hills, 2, 50),
                (Mountains, 3, 40), (Village, 1, 40), (Castle, 1, 40), (Keep, 1, 40),
                (ShallowWater, 3, 80), (Swamp, 3, 80), (Sand, 2, 70), (Cave, 2, 60),
            ],
            "elusivefoot" => &[
                (Flat, 1, 40), (Road, 1, 40), (Forest, 2, 30), (Hills, 2, 30),
                (Mountains, 3, 30), (Village, 1, 30), (Castle, 1, 30), (Keep, 1, 30),
                (ShallowWater, 3, 80), (Swamp, 2, 80), (Sand, 2, 60), (Cave, 2, 50),
            ],
            "armoredfoot" => &[
                (Flat, 1, 70), (Road, 1, 70), (Forest, 2, 70), (Hills, 3, 60),
                (Village, 1, 60), (Castle, 1, 50), (Keep, 1, 50),
                (ShallowWater, 4, 90), (Swamp, 4, 90), (Sand, 2, 80), (Cave, 2, 70),
            ],
            "mounted" => &[
                (Flat, 1, 60), (Road, 1, 60), (Forest, 3, 70), (Hills, 2, 60),
                (Village, 1, 60), (Castle, 1, 60), (Keep, 1, 60),
                (ShallowWater, 4, 80), (Swamp, 4, 80), (Sand, 2, 70), (Cave, 4, 80),
            ],
            "woodland" => &[
                (Flat, 1, 60), (Road, 1, 60), (Forest, 1, 30), (Hills, 2, 50),
                (Mountains, 3, 40), (Village, 1, 40), (Castle, 1, 40), (Keep, 1, 40),
                (ShallowWater, 3, 80), (Swamp, 2, 70), (Sand, 2, 70), (Cave, 3, 70),
            ],
            "fly" => &[
                (Flat, 1, 50), (Road, 1, 50), (Forest, 1, 50), (Hills, 1, 50),
                (Mountains, 1, 40), (Village, 1, 50), (Castle, 1, 50), (Keep, 1, 50),
                (ShallowWater, 1, 50), (DeepWater, 1, 50), (Swamp, 1, 50), (Sand, 1, 50),
                (Cave, 3, 80),
            ],
            _ => return None,
        };
        let mut profile = MovementProfile::default();
        for (terrain, cost, defense) in table {
            profile.costs.insert(*terrain, *cost);
            profile.defense.insert(*terrain, *defense);
        }
        Some(profile)
    }
}

/// A recruitable unit type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub cost: Gold,
    pub hitpoints: u32,
    /// Movement points per turn
    pub movement: u32,
    /// Experience needed to advance
    pub experience: u32,
    pub level: u32,
    /// AI role: "fighter", "archer", "mixed fighter", "scout", "healer"
    pub usage: String,
    pub attacks: Vec<Attack>,
    pub movement_profile: MovementProfile,
    /// Damage taken in percent (100 = normal, 80 = 20% resistance)
    pub resistances: BTreeMap<DamageType, i32>,
    pub advances_to: Vec<UnitTypeId>,
    pub abilities: Vec<String>,
    pub unpoisonable: bool,
}

impl UnitType {
    pub fn new(id: impl Into<String>, cost: Gold, hitpoints: u32) -> Self {
        Self {
            id: UnitTypeId::new(id),
            cost,
            hitpoints,
            movement: 5,
            experience: 40,
            level: 1,
            usage: "fighter".to_string(),
            attacks: Vec::new(),
            movement_profile: MovementProfile::preset("smallfoot").unwrap_or_default(),
            resistances: BTreeMap::new(),
            advances_to: Vec::new(),
            abilities: Vec::new(),
            unpoisonable: false,
        }
    }

    pub fn movement_cost(&self, terrain: Terrain) -> u32 {
        self.movement_profile.cost(terrain)
    }

    pub fn defense_modifier(&self, terrain: Terrain) -> u32 {
        self.movement_profile.defense_modifier(terrain)
    }

    /// Damage taken in percent from `attack`
    pub fn resistance_against(&self, attack: &Attack) -> i32 {
        self.resistances
            .get(&attack.damage_type)
            .copied()
            .unwrap_or(100)
    }

    pub fn has_ability(&self, ability: &str) -> bool {
        self.abilities.iter().any(|a| a == ability)
    }
}

/// Read-only unit type database
pub trait UnitCatalog {
    fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitType>;
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: AHashMap<UnitTypeId, UnitType>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit_type: UnitType) {
        self.types.insert(unit_type.id.clone(), unit_type);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type ids in sorted order
    pub fn ids(&self) -> Vec<UnitTypeId> {
        let mut ids: Vec<UnitTypeId> = self.types.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl UnitCatalog for TypeCatalog {
    fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitType> {
        self.types.get(id)
    }
}

impl FromIterator<UnitType> for TypeCatalog {
    fn from_iter<I: IntoIterator<Item = UnitType>>(iter: I) -> Self {
        let mut catalog = TypeCatalog::new();
        for unit_type in iter {
            catalog.insert(unit_type);
        }
        catalog
    }
}
