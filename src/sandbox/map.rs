//! Rhombus-shaped in-memory map

use ahash::AHashMap;

use crate::core::types::SideId;
use crate::map::hex::HexCoord;
use crate::map::terrain::Terrain;
use crate::map::SpatialOracle;

/// Map of `width` x `height` axial hexes, `q` in `0..width`, `r` in `0..height`
#[derive(Debug, Clone)]
pub struct SandboxMap {
    width: i32,
    height: i32,
    terrain: Vec<Terrain>,
    village_owners: AHashMap<HexCoord, SideId>,
}

impl SandboxMap {
    pub fn filled(width: i32, height: i32, terrain: Terrain) -> Self {
        let size = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            terrain: vec![terrain; size],
            village_owners: AHashMap::new(),
        }
    }

    /// Parse one string per row using `Terrain::from_code`; unknown codes are flat
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as i32;
        let mut map = SandboxMap::filled(width, height, Terrain::Flat);
        for (r, row) in rows.iter().enumerate() {
            for (q, code) in row.chars().enumerate() {
                let terrain = Terrain::from_code(code).unwrap_or_default();
                map.set_terrain(HexCoord::new(q as i32, r as i32), terrain);
            }
        }
        map
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, hex: HexCoord) -> Option<usize> {
        self.on_board(hex)
            .then(|| (hex.r * self.width + hex.q) as usize)
    }

    pub fn set_terrain(&mut self, hex: HexCoord, terrain: Terrain) {
        if let Some(i) = self.index(hex) {
            self.terrain[i] = terrain;
        }
    }

    pub fn set_village_owner(&mut self, hex: HexCoord, owner: Option<SideId>) {
        match owner {
            Some(side) => {
                self.village_owners.insert(hex, side);
            }
            None => {
                self.village_owners.remove(&hex);
            }
        }
    }

    /// Number of villages owned by `side`
    pub fn villages_of(&self, side: SideId) -> usize {
        self.village_owners.values().filter(|s| **s == side).count()
    }
}

impl SpatialOracle for SandboxMap {
    fn tiles(&self) -> Vec<HexCoord> {
        let mut tiles = Vec::with_capacity(self.terrain.len());
        for r in 0..self.height {
            for q in 0..self.width {
                tiles.push(HexCoord::new(q, r));
            }
        }
        tiles
    }

    fn on_board(&self, hex: HexCoord) -> bool {
        hex.q >= 0 && hex.q < self.width && hex.r >= 0 && hex.r < self.height
    }

    fn terrain_at(&self, hex: HexCoord) -> Option<Terrain> {
        self.index(hex).map(|i| self.terrain[i])
    }

    fn village_owner(&self, hex: HexCoord) -> Option<SideId> {
        self.village_owners.get(&hex).copied()
    }
}
