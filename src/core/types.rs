//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Simulation time in milliseconds
pub type Time = i64;

/// Player index in the scenario roster
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "player#{}", _0)]
pub struct PlayerId(pub u32);

/// Unit type index in the scenario's unit type table
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "unit_type#{}", _0)]
pub struct UnitTypeId(pub u32);

/// Unit identity, allocated in creation order
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "unit#{}", _0)]
pub struct UnitId(pub u32);

/// Path identity, allocated in creation order
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "path#{}", _0)]
pub struct PathId(pub u32);

/// Index of a segment in the timeline arena
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "segment#{}", _0)]
pub struct SegmentId(pub u32);

/// Index of a shared branch set in the timeline arena
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display(fmt = "branch#{}", _0)]
pub struct BranchId(pub u32);

macro_rules! arena_index {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn new(index: usize) -> Self {
                    Self(index as u32)
                }

                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

arena_index!(PlayerId, UnitTypeId, UnitId, PathId, SegmentId, BranchId);

/// Position on the visibility tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The 3x3 block centred on this tile, including itself
    pub fn neighborhood(self) -> impl Iterator<Item = TilePos> {
        (-1..=1).flat_map(move |dx| (-1..=1).map(move |dy| TilePos::new(self.x + dx, self.y + dy)))
    }

    /// The 8 surrounding tiles
    pub fn neighbors(self) -> impl Iterator<Item = TilePos> {
        self.neighborhood().filter(move |t| *t != self)
    }

    /// Every tile in the square of half-width `radius` around this one
    pub fn square(self, radius: i32) -> impl Iterator<Item = TilePos> {
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius).map(move |dy| TilePos::new(self.x + dx, self.y + dy))
        })
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_excludes_center() {
        let center = TilePos::new(4, 4);
        let neighbors: Vec<_> = center.neighbors().collect();
        assert_eq!(neighbors.len(), 8);
        assert!(!neighbors.contains(&center));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(PathId(3).to_string(), "path#3");
        assert_eq!(PlayerId::new(1).index(), 1);
    }
}
