//! Average defense of unit types on the contested ground

use ahash::AHashMap;

use crate::core::types::UnitTypeId;
use crate::map::terrain::TerrainHistogram;
use crate::units::catalog::{UnitCatalog, UnitType};

/// Histogram-weighted mean of `100 - chance to be hit`, in [0, 100]
///
/// An empty histogram gives 0.
pub fn average_defense(histogram: &TerrainHistogram, unit_type: &UnitType) -> f64 {
    let total = histogram.total();
    if total == 0 {
        return 0.0;
    }
    let summed: u64 = histogram
        .iter()
        .map(|(terrain, count)| {
            let defense = 100 - unit_type.defense_modifier(terrain);
            defense as u64 * count as u64
        })
        .sum();
    summed as f64 / total as f64
}

/// Memoized `average_defense` for one planning cycle
#[derive(Debug, Clone, Default)]
pub struct TerrainProfile {
    histogram: TerrainHistogram,
    memo: AHashMap<UnitTypeId, f64>,
}

impl TerrainProfile {
    pub fn new(histogram: TerrainHistogram) -> Self {
        Self {
            histogram,
            memo: AHashMap::new(),
        }
    }

    pub fn histogram(&self) -> &TerrainHistogram {
        &self.histogram
    }

    /// Average defense of `type_id`; 0 for unknown types
    pub fn average_defense(&mut self, catalog: &dyn UnitCatalog, type_id: &UnitTypeId) -> f64 {
        if let Some(defense) = self.memo.get(type_id) {
            return *defense;
        }
        let defense = catalog
            .unit_type(type_id)
            .map(|t| average_defense(&self.histogram, t))
            .unwrap_or(0.0);
        self.memo.insert(type_id.clone(), defense);
        defense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::terrain::Terrain;
    use crate::units::catalog::TypeCatalog;

    #[test]
    fn test_weighted_mean() {
        // smallfoot: flat 60, forest 50 chance to be hit
        let unit = UnitType::new("Spearman", 14, 36);
        let histogram: TerrainHistogram =
            [Terrain::Flat, Terrain::Flat, Terrain::Forest].into_iter().collect();
        let defense = average_defense(&histogram, &unit);
        assert!((defense - (40.0 + 40.0 + 50.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_histogram_is_zero() {
        let unit = UnitType::new("Spearman", 14, 36);
        assert_eq!(average_defense(&TerrainHistogram::new(), &unit), 0.0);
    }

    #[test]
    fn test_unknown_type_is_zero() {
        let catalog: TypeCatalog = [UnitType::new("Spearman", 14, 36)].into_iter().collect();
        let mut profile = TerrainProfile::new([Terrain::Hills].into_iter().collect());
        assert_eq!(profile.average_defense(&catalog, &"Ghost".into()), 0.0);
        assert_eq!(profile.average_defense(&catalog, &"Spearman".into()), 50.0);
    }

    #[test]
    fn test_unreachable_terrain_gives_no_defense() {
        let unit = UnitType::new("Spearman", 14, 36);
        let histogram: TerrainHistogram = [Terrain::DeepWater].into_iter().collect();
        assert_eq!(average_defense(&histogram, &unit), 0.0);
    }
}
