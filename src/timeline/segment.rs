use serde::{Deserialize, Serialize};

use crate::core::types::{BranchId, PathId, SegmentId, Time, UnitId};

/// One composition of a path, active from `time_start` until the next
/// segment on the same path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub path: PathId,
    /// Position in the owning path's segment list
    pub index: usize,
    pub time_start: Time,
    /// Member units in insertion order
    pub units: Vec<UnitId>,
    /// Whether only the owner could know this composition
    pub unseen: bool,
    /// Set of segments that start at the same merge/split point
    pub branches: BranchId,
}

impl Segment {
    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.contains(&unit)
    }

    /// Remove `unit`, returning the position it occupied
    pub fn remove_unit(&mut self, unit: UnitId) -> Option<usize> {
        let pos = self.units.iter().position(|&u| u == unit)?;
        self.units.remove(pos);
        Some(pos)
    }
}
