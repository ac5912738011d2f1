//! Axial hex coordinates
//!
//! `neighbors()` always walks the ring in the same order, so the hex at
//! index `i` and the one at `(i + 3) % 6` face each other across the center.
//! Backstab and surround checks in the attack analysis rely on that.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Offsets of the six neighbors, counter-clockwise starting east
pub const NEIGHBOR_OFFSETS: [HexCoord; 6] = [
    HexCoord { q: 1, r: 0 },
    HexCoord { q: 1, r: -1 },
    HexCoord { q: 0, r: -1 },
    HexCoord { q: -1, r: 0 },
    HexCoord { q: -1, r: 1 },
    HexCoord { q: 0, r: 1 },
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube component; q + r + s == 0
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Number of steps between two hexes
    pub fn distance(&self, other: &Self) -> u32 {
        let delta = *self - *other;
        delta.q.unsigned_abs().max(delta.r.unsigned_abs()).max(delta.s().unsigned_abs())
    }

    pub fn neighbors(&self) -> [HexCoord; 6] {
        NEIGHBOR_OFFSETS.map(|offset| *self + offset)
    }

    /// Every hex at most `radius` steps away, `self` included
    pub fn hexes_in_range(&self, radius: u32) -> Vec<HexCoord> {
        let n = radius as i32;
        (-n..=n)
            .flat_map(|dq| {
                let low = (-n).max(-dq - n);
                let high = n.min(n - dq);
                (low..=high).map(move |dr| HexCoord::new(dq, dr))
            })
            .map(|offset| *self + offset)
            .collect()
    }

    pub fn is_adjacent(&self, other: &Self) -> bool {
        self.distance(other) == 1
    }

    /// The hex on the far side of `center` from `self`
    pub fn mirrored_through(&self, center: HexCoord) -> HexCoord {
        center + (center - *self)
    }
}

impl Add for HexCoord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.q + rhs.q, self.r + rhs.r)
    }
}

impl Sub for HexCoord {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.q - rhs.q, self.r - rhs.r)
    }
}
