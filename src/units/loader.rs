//! Load unit catalogs from TOML files
//!
//! Each `[[unit]]` names a movement preset (`movetype`) and may override single
//! terrains through `costs` / `defense` tables.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::error::{MusterError, Result};
use crate::core::types::{Gold, UnitTypeId};
use crate::map::terrain::Terrain;
use crate::units::catalog::{Attack, DamageType, MovementProfile, TypeCatalog, UnitType};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "unit")]
    units: Vec<UnitEntry>,
}

#[derive(Debug, Deserialize)]
struct UnitEntry {
    id: String,
    cost: Gold,
    hitpoints: u32,
    #[serde(default = "default_movement")]
    movement: u32,
    #[serde(default = "default_experience")]
    experience: u32,
    #[serde(default = "default_level")]
    level: u32,
    #[serde(default = "default_usage")]
    usage: String,
    #[serde(default = "default_movetype")]
    movetype: String,
    #[serde(default)]
    costs: BTreeMap<Terrain, u32>,
    #[serde(default)]
    defense: BTreeMap<Terrain, u32>,
    #[serde(default)]
    resistances: BTreeMap<DamageType, i32>,
    #[serde(default)]
    advances_to: Vec<String>,
    #[serde(default)]
    abilities: Vec<String>,
    #[serde(default)]
    unpoisonable: bool,
    #[serde(default, rename = "attack")]
    attacks: Vec<Attack>,
}

fn default_movement() -> u32 {
    5
}

fn default_experience() -> u32 {
    40
}

fn default_level() -> u32 {
    1
}

fn default_usage() -> String {
    "fighter".to_string()
}

fn default_movetype() -> String {
    "smallfoot".to_string()
}

impl UnitEntry {
    fn into_unit_type(self) -> Result<UnitType> {
        let mut movement_profile = MovementProfile::preset(&self.movetype).ok_or_else(|| {
            MusterError::InvalidConfig(format!(
                "unit '{}' uses unknown movetype '{}'",
                self.id, self.movetype
            ))
        })?;
        movement_profile.costs.extend(self.costs);
        movement_profile.defense.extend(self.defense);

        Ok(UnitType {
            id: UnitTypeId::new(self.id),
            cost: self.cost,
            hitpoints: self.hitpoints,
            movement: self.movement,
            experience: self.experience,
            level: self.level,
            usage: self.usage,
            attacks: self.attacks,
            movement_profile,
            resistances: self.resistances,
            advances_to: self.advances_to.into_iter().map(UnitTypeId::new).collect(),
            abilities: self.abilities,
            unpoisonable: self.unpoisonable,
        })
    }
}

/// Parse a catalog from TOML text
pub fn parse_catalog(contents: &str) -> Result<TypeCatalog> {
    let file: CatalogFile = toml::from_str(contents)?;
    let mut catalog = TypeCatalog::new();
    for entry in file.units {
        catalog.insert(entry.into_unit_type()?);
    }
    Ok(catalog)
}

/// Load a catalog from a TOML file
pub fn load_catalog(path: &Path) -> Result<TypeCatalog> {
    let contents = fs::read_to_string(path)?;
    parse_catalog(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::catalog::{AttackRange, UnitCatalog};
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
        [[unit]]
        id = "Spearman"
        cost = 14
        hitpoints = 36
        advances_to = ["Pikeman"]
        resistances = { pierce = 60 }
        defense = { forest = 40 }

        [[unit.attack]]
        name = "spear"
        range = "melee"
        damage_type = "pierce"
        damage = 7
        strikes = 3
        specials = { backstab = false }

        [[unit]]
        id = "Dark Adept"
        cost = 16
        hitpoints = 28
        usage = "mixed fighter"
        movetype = "smallfoot"

        [[unit.attack]]
        name = "chill wave"
        range = "ranged"
        damage_type = "cold"
        damage = 10
        strikes = 2
        specials = { magical = true }
    "#;

    #[test]
    fn test_parse_sample_catalog() {
        let catalog = parse_catalog(SAMPLE).expect("sample should parse");
        assert_eq!(catalog.len(), 2);

        let spearman = catalog.unit_type(&"Spearman".into()).unwrap();
        assert_eq!(spearman.cost, 14);
        assert_eq!(spearman.defense_modifier(Terrain::Forest), 40);
        assert_eq!(spearman.defense_modifier(Terrain::Flat), 60);
        assert_eq!(spearman.resistances.get(&DamageType::Pierce), Some(&60));
        assert_eq!(spearman.advances_to, vec![UnitTypeId::new("Pikeman")]);

        let adept = catalog.unit_type(&"Dark Adept".into()).unwrap();
        assert_eq!(adept.attacks[0].range, AttackRange::Ranged);
        assert!(adept.attacks[0].specials.magical);
        assert_eq!(adept.usage, "mixed fighter");
    }

    #[test]
    fn test_unknown_movetype_is_rejected() {
        let result = parse_catalog(
            r#"
            [[unit]]
            id = "Boat"
            cost = 10
            hitpoints = 10
            movetype = "naval"
            "#,
        );
        assert!(matches!(result, Err(MusterError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_bundled_catalog() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/units/default.toml");
        let catalog = load_catalog(&path).expect("bundled catalog should load");
        assert!(catalog.len() >= 8);
        for id in catalog.ids() {
            let unit = catalog.unit_type(&id).unwrap();
            for next in &unit.advances_to {
                assert!(catalog.unit_type(next).is_some(), "{id} advances to missing {next}");
            }
        }
    }
}
