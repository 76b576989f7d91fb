//! Cursor over one unit's presence in one segment
//!
//! `prev`/`next` follow the same unit across merge and split points;
//! `parents`/`children` follow production (a new unit has no `prev`, and its
//! parents are the units on the segments merging onto its first segment that
//! could have made it).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::{SegmentId, Time, UnitId};
use crate::sim::{Sim, SimEvent};
use crate::timeline::PathTile;
use crate::visibility::TileTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentUnit {
    pub segment: SegmentId,
    pub unit: UnitId,
}

/// Membership removed during one deletion, in removal order
type Removed = Vec<(SegmentId, usize, UnitId)>;

impl SegmentUnit {
    pub fn new(segment: SegmentId, unit: UnitId) -> Self {
        Self { segment, unit }
    }

    pub fn is_present(&self, sim: &Sim) -> bool {
        sim.timeline.segment(self.segment).contains(self.unit)
    }

    /// Same unit on the segments merging onto the start of this one
    pub fn prev(&self, sim: &Sim) -> Vec<SegmentUnit> {
        self.with_unit(sim, sim.timeline.prev(self.segment))
    }

    /// Same unit on the segments branching off the end of this one
    pub fn next(&self, sim: &Sim) -> Vec<SegmentUnit> {
        self.with_unit(sim, sim.timeline.next(self.segment))
    }

    fn with_unit(&self, sim: &Sim, segments: Vec<SegmentId>) -> Vec<SegmentUnit> {
        segments
            .into_iter()
            .filter(|&s| sim.timeline.segment(s).contains(self.unit))
            .map(|s| SegmentUnit::new(s, self.unit))
            .collect()
    }

    /// Units that could have produced this unit here
    pub fn parents(&self, sim: &Sim) -> Vec<SegmentUnit> {
        if !self.prev(sim).is_empty() {
            return Vec::new();
        }
        let type_id = sim.unit_type_of(self.unit).id;
        sim.timeline
            .prev(self.segment)
            .into_iter()
            .flat_map(|s| sim.timeline.segment_units(s))
            .filter(|su| sim.unit_type_of(su.unit).can_make(type_id))
            .collect()
    }

    /// Units this unit could have produced at the end of this segment
    pub fn children(&self, sim: &Sim) -> Vec<SegmentUnit> {
        let maker = sim.unit_type_of(self.unit);
        sim.timeline
            .next(self.segment)
            .into_iter()
            .flat_map(|s| sim.timeline.segment_units(s))
            .filter(|su| {
                maker.can_make(sim.unit_type_of(su.unit).id) && su.prev(sim).is_empty()
            })
            .collect()
    }

    /// Whether this presence and everything descending from it is known
    /// only to the owner
    pub fn unseen_after(&self, sim: &Sim) -> bool {
        let mut stack = vec![*self];
        let mut visited = BTreeSet::new();
        while let Some(su) = stack.pop() {
            if !visited.insert(su) {
                continue;
            }
            if !sim.timeline.segment(su.segment).unseen {
                return false;
            }
            stack.extend(su.next(sim));
            stack.extend(su.children(sim));
        }
        true
    }

    /// Whether a unit produced by this one at `time` would have exactly one
    /// possible parent
    pub fn can_be_unambiguous_parent(&self, sim: &Sim, time: Time) -> bool {
        let segment = sim.timeline.segment(self.segment);
        segment.time_start < time
            || sim
                .timeline
                .prev_on_path(self.segment)
                .map_or(false, |p| sim.timeline.segment(p).contains(self.unit))
    }

    /// Remove this unit from this segment and everything that follows from
    /// it, unless that would contradict something a rival may have seen
    ///
    /// Either the whole removal happens or none of it does.
    pub fn delete(self, sim: &mut Sim) -> bool {
        self.delete_with(sim, false)
    }

    /// Like [`SegmentUnit::delete`], but a time-traveling branch holding the
    /// same unit counts as a surviving version of it, so a live path can
    /// hand the unit over to that branch
    pub fn hand_over(self, sim: &mut Sim) -> bool {
        self.delete_with(sim, true)
    }

    fn delete_with(self, sim: &mut Sim, non_live_heirs: bool) -> bool {
        if !self.is_present(sim) {
            return true;
        }
        let unit = self.unit;
        let mut earliest_child = Time::MAX;

        // walk back to the segments removal must start from
        let mut ancestors = vec![self];
        let mut i = 0;
        while i < ancestors.len() {
            let cur = ancestors[i];
            let prev = cur.prev(sim);
            if !prev.is_empty() {
                let cur_live = sim.timeline.path_of(cur.segment).is_live();
                let has_sibling = sim.timeline.branches(cur.segment).iter().any(|&seg| {
                    let sibling = SegmentUnit::new(seg, unit);
                    sim.timeline.segment(seg).contains(unit)
                        && !ancestors.contains(&sibling)
                        && (non_live_heirs || sim.timeline.path_of(seg).is_live() || !cur_live)
                });
                if !has_sibling {
                    ancestors.remove(i);
                    for p in prev {
                        if !ancestors.contains(&p) {
                            ancestors.push(p);
                        }
                    }
                    continue;
                }
            } else if !sim.timeline.prev(cur.segment).is_empty() {
                // a produced unit: its parent's resources are affected from here
                earliest_child = earliest_child.min(sim.timeline.segment(cur.segment).time_start);
            } else {
                // scenario start is public knowledge
                return false;
            }
            i += 1;
        }

        let mut removed = Removed::new();
        let mut ok = ancestors
            .iter()
            .all(|&a| a.delete_after(sim, &mut removed, &mut earliest_child));

        let player = sim.units[unit.index()].player;
        if ok && earliest_child != Time::MAX {
            ok = sim
                .check_negative_resources_since(player, earliest_child, false)
                .is_none();
        }
        if !ok {
            for &(segment, index, unit) in removed.iter().rev() {
                sim.timeline.segment_mut(segment).units.insert(index, unit);
            }
            tracing::debug!(%unit, segment = %self.segment, "deletion rolled back");
            return false;
        }

        let emptied: BTreeSet<SegmentId> = removed
            .iter()
            .map(|&(s, _, _)| s)
            .filter(|&s| sim.timeline.segment(s).units.is_empty())
            .collect();
        for segment in emptied {
            let path = sim.timeline.path_of(segment);
            let is_latest = path.segments.last() == Some(&segment);
            if is_latest && path.is_live() && path.tile != PathTile::Gone {
                let path = path.id;
                sim.events.schedule(
                    sim.time_sim,
                    SimEvent::TileMove {
                        path,
                        target: TileTarget::OffMap,
                    },
                );
            }
        }
        true
    }

    fn delete_after(self, sim: &mut Sim, removed: &mut Removed, earliest_child: &mut Time) -> bool {
        let mut stack = vec![self];
        while let Some(su) = stack.pop() {
            let segment = sim.timeline.segment(su.segment);
            if !segment.contains(su.unit) {
                continue;
            }
            if !segment.unseen && segment.time_start < sim.time_sim {
                return false;
            }

            let mut follow = Vec::new();
            let sole_prev = match sim.timeline.next_on_path(su.segment) {
                None => true,
                Some(next) => SegmentUnit::new(next, su.unit).prev(sim).len() == 1,
            };
            if sole_prev {
                follow.extend(su.next(sim));
                for child in su.children(sim) {
                    if child.parents(sim).len() == 1 {
                        *earliest_child =
                            (*earliest_child).min(sim.timeline.segment(child.segment).time_start);
                        follow.push(child);
                    }
                }
            }

            if let Some(index) = sim.timeline.segment_mut(su.segment).remove_unit(su.unit) {
                removed.push((su.segment, index, su.unit));
            }
            stack.extend(follow.into_iter().rev());
        }
        true
    }
}

impl Sim {
    /// Remove the given units from every alternative branch that, if seen,
    /// would contradict their presence where they are
    pub fn delete_other_paths(&mut self, units: &[SegmentUnit]) -> bool {
        let mut ancestors = BTreeSet::new();
        let mut prev = BTreeSet::new();
        let mut live_to_non_live = BTreeSet::new();

        let mut stack: Vec<SegmentUnit> = units.to_vec();
        while let Some(su) = stack.pop() {
            if !ancestors.insert(su) {
                continue;
            }
            let su_live = self.timeline.path_of(su.segment).is_live();
            for p in su.prev(self) {
                if !su_live && self.timeline.path_of(p.segment).is_live() {
                    live_to_non_live.insert(p);
                } else {
                    prev.insert(p);
                }
                stack.push(p);
            }
            stack.extend(su.parents(self));
        }

        let mut doomed = Vec::new();
        for ancestor in &prev {
            for su in ancestor.next(self) {
                if !ancestors.contains(&su) {
                    doomed.push(su);
                }
            }
        }
        for ancestor in &live_to_non_live {
            for su in ancestor.next(self) {
                if !self.timeline.path_of(su.segment).is_live() && !ancestors.contains(&su) {
                    doomed.push(su);
                }
            }
        }

        let mut success = true;
        for su in doomed {
            success &= su.delete(self);
        }
        success
    }

    /// Versions of the given presences active at `time`, found by
    /// following each unit forwards or backwards through splits and merges
    pub fn active_segment_units(&self, units: &[SegmentUnit], time: Time) -> Vec<SegmentUnit> {
        let mut found = BTreeSet::new();
        let mut visited = BTreeSet::new();
        let mut stack = units.to_vec();
        while let Some(su) = stack.pop() {
            if !visited.insert(su) {
                continue;
            }
            let next_start = self
                .timeline
                .next_on_path(su.segment)
                .map(|n| self.timeline.segment(n).time_start);
            if next_start.map_or(false, |t| time >= t) {
                stack.extend(su.next(self));
            } else if time < self.timeline.segment(su.segment).time_start {
                stack.extend(su.prev(self));
            } else {
                found.insert(su);
            }
        }
        found.into_iter().collect()
    }
}
