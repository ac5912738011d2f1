//! Terrain types and the terrain histogram of important hexes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base terrain of a map hex
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Flat,
    Road,
    Forest,
    Hills,
    Mountains,
    Village,
    Castle,
    Keep,
    ShallowWater,
    DeepWater,
    Swamp,
    Sand,
    Cave,
    Impassable,
}

impl Terrain {
    pub fn all() -> [Terrain; 14] {
        [
            Terrain::Flat,
            Terrain::Road,
            Terrain::Forest,
            Terrain::Hills,
            Terrain::Mountains,
            Terrain::Village,
            Terrain::Castle,
            Terrain::Keep,
            Terrain::ShallowWater,
            Terrain::DeepWater,
            Terrain::Swamp,
            Terrain::Sand,
            Terrain::Cave,
            Terrain::Impassable,
        ]
    }

    pub fn is_village(&self) -> bool {
        matches!(self, Terrain::Village)
    }

    /// Keeps count as castle: units can be recruited onto both
    pub fn is_castle(&self) -> bool {
        matches!(self, Terrain::Castle | Terrain::Keep)
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Terrain::Keep)
    }

    /// Villages heal units standing on them at turn start
    pub fn gives_healing(&self) -> bool {
        self.is_village()
    }

    /// Single-character code used by the sandbox map parser
    pub fn from_code(c: char) -> Option<Terrain> {
        Some(match c {
            '.' => Terrain::Flat,
            '=' => Terrain::Road,
            'f' => Terrain::Forest,
            'h' => Terrain::Hills,
            'm' => Terrain::Mountains,
            'v' => Terrain::Village,
            'c' => Terrain::Castle,
            'k' => Terrain::Keep,
            '~' => Terrain::ShallowWater,
            'w' => Terrain::DeepWater,
            's' => Terrain::Swamp,
            'd' => Terrain::Sand,
            'u' => Terrain::Cave,
            'x' => Terrain::Impassable,
            _ => return None,
        })
    }
}

/// Count of hexes per terrain type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainHistogram {
    counts: BTreeMap<Terrain, u32>,
}

impl TerrainHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, terrain: Terrain) {
        *self.counts.entry(terrain).or_insert(0) += 1;
    }

    pub fn count(&self, terrain: Terrain) -> u32 {
        self.counts.get(&terrain).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Terrain, u32)> + '_ {
        self.counts.iter().map(|(t, c)| (*t, *c))
    }
}

impl FromIterator<Terrain> for TerrainHistogram {
    fn from_iter<I: IntoIterator<Item = Terrain>>(iter: I) -> Self {
        let mut histogram = TerrainHistogram::new();
        for terrain in iter {
            histogram.add(terrain);
        }
        histogram
    }
}
