//! Branching timeline of unit groups
//!
//! Paths and segments live in flat arenas addressed by integer ids. A
//! segment's merge/split relationships are stored as a shared branch set
//! (a list of segment ids) instead of references between segments, so the
//! graph has no ownership cycles. Segments are never removed from the arena:
//! deleting history empties membership instead.

pub mod formation;
pub mod moves;
pub mod path;
pub mod segment;
pub mod segment_unit;
pub mod unit;

pub use formation::Formation;
pub use moves::Move;
pub use path::{Path, PathTile};
pub use segment::Segment;
pub use segment_unit::SegmentUnit;
pub use unit::{Unit, UnitType};

use serde::{Deserialize, Serialize};

use crate::core::fp::FpVector;
use crate::core::types::{BranchId, PathId, PlayerId, SegmentId, Time, UnitId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    pub paths: Vec<Path>,
    pub segments: Vec<Segment>,
    pub branch_sets: Vec<Vec<SegmentId>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segment(&self, id: SegmentId) -> &Segment {
        &self.segments[id.index()]
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.segments[id.index()]
    }

    pub fn path(&self, id: PathId) -> Option<&Path> {
        self.paths.get(id.index())
    }

    pub fn path_mut(&mut self, id: PathId) -> Option<&mut Path> {
        self.paths.get_mut(id.index())
    }

    /// Path owning a segment
    pub fn path_of(&self, segment: SegmentId) -> &Path {
        &self.paths[self.segment(segment).path.index()]
    }

    pub fn path_ids(&self) -> impl Iterator<Item = PathId> {
        (0..self.paths.len()).map(PathId::new)
    }

    /// Append a new path with a single segment and a stationary move
    #[allow(clippy::too_many_arguments)]
    pub fn add_path(
        &mut self,
        player: PlayerId,
        speed: i64,
        units: Vec<UnitId>,
        time: Time,
        pos: FpVector,
        unseen: bool,
        time_sim_past: Option<Time>,
    ) -> PathId {
        let id = PathId::new(self.paths.len());
        let segment = self.push_segment(id, 0, time, units, unseen);
        self.paths.push(Path::new(id, player, speed, segment, time, pos, time_sim_past));
        id
    }

    fn push_segment(
        &mut self,
        path: PathId,
        index: usize,
        time: Time,
        units: Vec<UnitId>,
        unseen: bool,
    ) -> SegmentId {
        let id = SegmentId::new(self.segments.len());
        let branches = BranchId::new(self.branch_sets.len());
        self.branch_sets.push(vec![id]);
        self.segments.push(Segment {
            id,
            path,
            index,
            time_start: time,
            units,
            unseen,
            branches,
        });
        id
    }

    pub fn active_segment(&self, path: PathId, time: Time) -> Option<SegmentId> {
        let path = self.path(path)?;
        path.segments
            .iter()
            .rev()
            .copied()
            .find(|&s| time >= self.segment(s).time_start)
    }

    pub fn latest_segment(&self, path: PathId) -> Option<SegmentId> {
        self.path(path)?.segments.last().copied()
    }

    /// Segment starting exactly at `time`, splitting the active one if needed
    pub fn insert_segment(&mut self, path: PathId, time: Time) -> Option<SegmentId> {
        let active = self.active_segment(path, time)?;
        let (index, units, unseen) = {
            let seg = self.segment(active);
            if seg.time_start == time {
                return Some(active);
            }
            (seg.index + 1, seg.units.clone(), seg.unseen)
        };
        let id = self.push_segment(path, index, time, units, unseen);
        let p = &mut self.paths[path.index()];
        p.segments.insert(index, id);
        let later: Vec<SegmentId> = p.segments[index + 1..].to_vec();
        for (offset, seg) in later.into_iter().enumerate() {
            self.segments[seg.index()].index = index + 1 + offset;
        }
        Some(id)
    }

    pub fn next_on_path(&self, segment: SegmentId) -> Option<SegmentId> {
        let seg = self.segment(segment);
        self.paths[seg.path.index()].segments.get(seg.index + 1).copied()
    }

    pub fn prev_on_path(&self, segment: SegmentId) -> Option<SegmentId> {
        let seg = self.segment(segment);
        if seg.index == 0 {
            return None;
        }
        self.paths[seg.path.index()].segments.get(seg.index - 1).copied()
    }

    pub fn branches(&self, segment: SegmentId) -> &[SegmentId] {
        &self.branch_sets[self.segment(segment).branches.index()]
    }

    /// Segments merging onto the start of this segment
    pub fn prev(&self, segment: SegmentId) -> Vec<SegmentId> {
        self.branches(segment)
            .iter()
            .filter_map(|&b| self.prev_on_path(b))
            .collect()
    }

    /// Segments branching off the end of this segment
    pub fn next(&self, segment: SegmentId) -> Vec<SegmentId> {
        match self.next_on_path(segment) {
            Some(next) => self.branches(next).to_vec(),
            None => Vec::new(),
        }
    }

    /// Unify the branch sets of two paths at `time`, returning the first
    /// path's segment at that instant
    pub fn connect(&mut self, time: Time, a: PathId, b: PathId) -> Option<SegmentId> {
        let seg_a = self.insert_segment(a, time)?;
        let seg_b = self.insert_segment(b, time)?;
        let set_a = self.segment(seg_a).branches;
        let set_b = self.segment(seg_b).branches;
        if set_a != set_b {
            let moved = std::mem::take(&mut self.branch_sets[set_b.index()]);
            for &seg in &moved {
                self.segments[seg.index()].branches = set_a;
            }
            self.branch_sets[set_a.index()].extend(moved);
        }
        Some(seg_a)
    }

    /// Every segment unit of one segment, in member order
    pub fn segment_units(&self, segment: SegmentId) -> Vec<SegmentUnit> {
        self.segment(segment)
            .units
            .iter()
            .map(|&unit| SegmentUnit::new(segment, unit))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline_with_paths(n: usize) -> Timeline {
        let mut timeline = Timeline::new();
        for i in 0..n {
            timeline.add_path(
                PlayerId(0),
                10,
                vec![UnitId(i as u32)],
                0,
                FpVector::ZERO,
                false,
                None,
            );
        }
        timeline
    }

    #[test]
    fn test_insert_segment_splits_and_renumbers() {
        let mut timeline = timeline_with_paths(1);
        let path = PathId(0);
        let late = timeline.insert_segment(path, 500).unwrap();
        let mid = timeline.insert_segment(path, 200).unwrap();
        assert_eq!(timeline.insert_segment(path, 200), Some(mid));
        let segments = &timeline.path(path).unwrap().segments;
        assert_eq!(segments.len(), 3);
        assert_eq!(timeline.segment(mid).index, 1);
        assert_eq!(timeline.segment(late).index, 2);
        assert_eq!(timeline.segment(late).units, vec![UnitId(0)]);
        assert_eq!(timeline.active_segment(path, 300), Some(mid));
        assert_eq!(timeline.active_segment(path, -1), None);
    }

    #[test]
    fn test_connect_links_both_directions() {
        let mut timeline = timeline_with_paths(2);
        let seg = timeline.connect(100, PathId(0), PathId(1)).unwrap();
        let other = timeline.active_segment(PathId(1), 100).unwrap();
        assert_eq!(timeline.branches(seg), timeline.branches(other));
        assert_eq!(timeline.prev(seg).len(), 2);

        let first = timeline.path(PathId(1)).unwrap().segments[0];
        let next = timeline.next(first);
        assert!(next.contains(&seg) && next.contains(&other));
    }

    #[test]
    fn test_connect_union_is_transitive() {
        let mut timeline = timeline_with_paths(3);
        timeline.connect(100, PathId(0), PathId(1));
        timeline.connect(100, PathId(2), PathId(1));
        let seg = timeline.active_segment(PathId(0), 100).unwrap();
        assert_eq!(timeline.branches(seg).len(), 3);
    }
}
