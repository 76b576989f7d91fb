//! Paths: groups of same-speed, same-owner units moving together
//!
//! A path is live when it is part of authoritative history, or non-live
//! (time traveling) while its owner edits its past. Non-live paths must stay
//! on tiles their owner held exclusively; [`Sim::update_past`] checks this.

use serde::{Deserialize, Serialize};

use crate::core::error::{Rejection, Result, SimError};
use crate::core::fp::{self, FpVector};
use crate::core::types::{PathId, PlayerId, SegmentId, Time, TilePos, UnitId, UnitTypeId};
use crate::sim::{Sim, SimEvent};
use crate::timeline::moves::Move;
use crate::timeline::segment_unit::SegmentUnit;
use crate::visibility::TileTarget;

/// Where a path currently registers on the visibility grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathTile {
    /// Not yet placed
    Pending,
    At(TilePos),
    /// Removed for good
    Gone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub id: PathId,
    pub player: PlayerId,
    /// Raw position units per millisecond, shared by every member
    pub speed: i64,
    /// Composition history, earliest first
    pub segments: Vec<SegmentId>,
    /// Motion history, earliest first
    pub moves: Vec<Move>,
    pub tile: PathTile,
    /// `None` for live paths; otherwise the latest verified instant of a
    /// time-traveling path
    pub time_sim_past: Option<Time>,
}

impl Path {
    pub(crate) fn new(
        id: PathId,
        player: PlayerId,
        speed: i64,
        first_segment: SegmentId,
        time: Time,
        pos: FpVector,
        time_sim_past: Option<Time>,
    ) -> Self {
        Self {
            id,
            player,
            speed,
            segments: vec![first_segment],
            moves: vec![Move::stationary(time, pos)],
            tile: PathTile::Pending,
            time_sim_past,
        }
    }

    pub fn is_live(&self) -> bool {
        self.time_sim_past.is_none()
    }

    /// Index of the move in effect at `time`
    pub fn active_move(&self, time: Time) -> Option<usize> {
        self.moves.iter().rposition(|m| m.time_start <= time)
    }

    pub fn pos_at(&self, time: Time) -> FpVector {
        match self.active_move(time) {
            Some(i) => self.moves[i].pos_at(time),
            None => self.moves.first().map_or(FpVector::ZERO, |m| m.start),
        }
    }

    pub fn tile_at(&self, time: Time) -> TilePos {
        let pos = self.pos_at(time);
        TilePos::new(fp::to_tile(pos.x), fp::to_tile(pos.y))
    }

    /// Time the latest move finishes
    pub fn moves_end(&self) -> Time {
        self.moves.last().map_or(Time::MIN, |m| m.time_end)
    }

    /// Tile boundary crossings between `t_min` and `t_max`, in time order
    ///
    /// Fixed-point rounding can put a crossing slightly outside the window;
    /// such times are clamped into it.
    pub fn tile_move_events(&self, t_min: Time, t_max: Time) -> Vec<(Time, TileTarget)> {
        let mut events = Vec::new();
        let Some(first) = self.moves.first() else {
            return events;
        };
        if t_max < first.time_start {
            return events;
        }
        let move_last = self.active_move(t_min).unwrap_or(0);
        let Some(move_end) = self.active_move(t_max) else {
            return events;
        };
        for i in move_last..=move_end {
            let m = &self.moves[i];
            let pos_last = if i == move_last {
                m.pos_at(t_min.max(first.time_start))
            } else {
                m.start
            };
            let pos = if i == move_end {
                m.pos_at(t_max)
            } else {
                self.moves[i + 1].start
            };

            if m.start.x != m.end.x {
                let dir = if pos.x >= pos_last.x { 0 } else { -1 };
                let lo = fp::to_tile(pos.x.min(pos_last.x)) + 1;
                let hi = fp::to_tile(pos.x.max(pos_last.x));
                for tx in lo..=hi {
                    let t = m.time_at_x(fp::from_int(tx as i64));
                    events.push((t, TileTarget::Column(tx + dir)));
                }
            }
            if m.start.y != m.end.y {
                let dir = if pos.y >= pos_last.y { 0 } else { -1 };
                let lo = fp::to_tile(pos.y.min(pos_last.y)) + 1;
                let hi = fp::to_tile(pos.y.max(pos_last.y));
                for ty in lo..=hi {
                    let t = m.time_at_y(fp::from_int(ty as i64));
                    events.push((t, TileTarget::Row(ty + dir)));
                }
            }
        }
        for event in &mut events {
            event.0 = event.0.clamp(t_min, t_max);
        }
        events.sort_by_key(|&(t, _)| t);
        events
    }
}

impl Sim {
    /// Whether the given units may share one path
    pub fn stack_allowed(&self, units: &[UnitId], speed: i64, player: PlayerId) -> bool {
        units.iter().all(|&u| {
            self.units.get(u.index()).map_or(false, |unit| {
                unit.player == player && self.unit_types[unit.type_id.index()].speed == speed
            })
        })
    }

    /// Check whether `path` could spin off a new path holding `units` at `time`
    ///
    /// Units already on the path must have been there strictly before `time`
    /// so the parent is unambiguous. Units not on the path are new units the
    /// path must be able to produce and the player must be able to afford at
    /// every later observation point.
    pub fn can_make_path(
        &self,
        path_id: PathId,
        time: Time,
        units: &[UnitId],
    ) -> std::result::Result<(), Rejection> {
        if units.is_empty() {
            return Err(Rejection::EmptySelection);
        }
        let path = self.timeline.path(path_id).ok_or(Rejection::NoActiveSegment)?;
        let segment = self
            .timeline
            .active_segment(path_id, time)
            .ok_or(Rejection::NoActiveSegment)?;
        let first = self.units.get(units[0].index()).ok_or(Rejection::StackNotAllowed)?;
        let speed = self.unit_types[first.type_id.index()].speed;
        if !self.stack_allowed(units, speed, path.player) {
            return Err(Rejection::StackNotAllowed);
        }

        let n_rsc = self.rules.resource_names.len();
        let mut cost = vec![0i64; n_rsc];
        for &unit in units {
            let su = SegmentUnit::new(segment, unit);
            if self.timeline.segment(segment).contains(unit) {
                if !su.can_be_unambiguous_parent(self, time) {
                    return Err(Rejection::AmbiguousParent(unit));
                }
                if time < self.time_sim && !su.unseen_after(self) {
                    return Err(Rejection::Observed(unit));
                }
            } else {
                let type_id = self.units[unit.index()].type_id;
                if !self.can_make_unit_type(path_id, time, type_id) {
                    return Err(Rejection::CannotMakeType(type_id));
                }
                for (total, c) in cost.iter_mut().zip(&self.unit_types[type_id.index()].cost) {
                    *total += c;
                }
            }
        }

        if cost.iter().any(|&c| c > 0) {
            let include_non_live = !(time >= self.time_sim && path.is_live());
            let mut checkpoints = vec![time];
            checkpoints.extend(
                self.player_paths(path.player)
                    .map(|p| self.first_segment_time(p))
                    .filter(|&t| t >= time),
            );
            for (rsc, &c) in cost.iter().enumerate() {
                if c <= 0 {
                    continue;
                }
                for &t in &checkpoints {
                    if self.resource(path.player, t, rsc, include_non_live) < c {
                        return Err(Rejection::InsufficientResources);
                    }
                }
            }
        }
        Ok(())
    }

    /// Whether some unit on `path` can produce `unit_type` at `time`
    pub fn can_make_unit_type(&self, path_id: PathId, time: Time, unit_type: UnitTypeId) -> bool {
        let Some(segment) = self.timeline.active_segment(path_id, time) else {
            return false;
        };
        self.timeline.segment(segment).units.iter().any(|&unit| {
            let su = SegmentUnit::new(segment, unit);
            self.unit_type_of(unit).can_make(unit_type)
                && su.can_be_unambiguous_parent(self, time)
                && (time >= self.time_sim || su.unseen_after(self))
        })
    }

    /// Spin off a new path holding `units`, linked to `path` at `time`
    pub fn make_path(&mut self, path_id: PathId, time: Time, units: &[UnitId]) -> Result<PathId> {
        self.can_make_path(path_id, time, units)?;
        let path = self
            .timeline
            .path(path_id)
            .ok_or(SimError::UnknownPath(path_id))?;
        let player = path.player;
        let source_live = path.is_live();
        let pos = path.pos_at(time);
        let speed = self.unit_type_of(units[0]).speed;

        let segment = self
            .timeline
            .insert_segment(path_id, time)
            .ok_or(Rejection::NoActiveSegment)?;
        let unseen = self.timeline.segment(segment).unseen;
        let time_sim_past = if time >= self.time_sim && source_live {
            None
        } else {
            Some(time)
        };
        let new_path = self.timeline.add_path(
            player,
            speed,
            units.to_vec(),
            time,
            pos,
            unseen,
            time_sim_past,
        );
        self.timeline.connect(time, path_id, new_path);

        if time_sim_past.is_none() {
            let tile = TilePos::new(fp::to_tile(pos.x), fp::to_tile(pos.y));
            self.events.schedule(
                time,
                SimEvent::TileMove {
                    path: new_path,
                    target: TileTarget::Tile(tile),
                },
            );
        } else {
            self.players[player.index()].has_non_live_paths = true;
        }
        tracing::debug!(
            source = %path_id,
            path = %new_path,
            time,
            units = units.len(),
            live = time_sim_past.is_none(),
            "made path"
        );
        Ok(new_path)
    }

    /// Move a subset of a path's units towards `pos` starting at `time`,
    /// returning the path that actually moves
    pub fn move_units(
        &mut self,
        path_id: PathId,
        time: Time,
        units: &[UnitId],
        pos: FpVector,
    ) -> Result<PathId> {
        let segment = self
            .timeline
            .active_segment(path_id, time)
            .ok_or(Rejection::NoActiveSegment)?;
        let moving_all = self
            .timeline
            .segment(segment)
            .units
            .iter()
            .all(|u| units.contains(u));

        let moved = if time < self.time_sim || !moving_all {
            self.make_path(path_id, time, units)?
        } else {
            path_id
        };

        if moved != path_id {
            self.remove_units_from(path_id, moved, time, units);
        }
        self.move_to(moved, time, pos)?;
        Ok(moved)
    }

    /// Try to take `units` off `path` from `time` on now that `split` holds
    /// them; units that another player may already have seen there stay
    ///
    /// A live path splitting into the past hands its units over to the
    /// time-traveling split, unless none would be left on it: a whole path
    /// sent back keeps its units, and its sight, until the split goes live.
    pub(crate) fn remove_units_from(
        &mut self,
        path_id: PathId,
        split: PathId,
        time: Time,
        units: &[UnitId],
    ) {
        let Some(segment) = self.timeline.active_segment(path_id, time) else {
            return;
        };
        let hand_over = self.timeline.paths[path_id.index()].is_live()
            && !self.timeline.paths[split.index()].is_live();
        if hand_over
            && self
                .timeline
                .segment(segment)
                .units
                .iter()
                .all(|u| units.contains(u))
        {
            return;
        }
        for &unit in units {
            let su = SegmentUnit::new(segment, unit);
            let removed = if hand_over {
                su.hand_over(self)
            } else {
                su.delete(self)
            };
            if !removed {
                tracing::debug!(path = %path_id, %unit, time, "unit stays on source path");
            }
        }
    }

    /// Move the whole path towards `pos` starting at `time`
    pub fn move_to(&mut self, path_id: PathId, time: Time, pos: FpVector) -> Result<()> {
        let goal = pos.clamp_to(self.rules.map_size);
        let path = self
            .timeline
            .path_mut(path_id)
            .ok_or(SimError::UnknownPath(path_id))?;
        let current = path.pos_at(time);
        path.moves.retain(|m| m.time_start < time);
        path.moves.push(Move::from_speed(time, path.speed, current, goal));
        let live = path.is_live();

        if live {
            // crossings computed from the replaced motion are stale
            self.events.void_where(|t, event| {
                t > time
                    && matches!(event, SimEvent::TileMove { path, target }
                        if *path == path_id && target.is_crossing())
            });
            let window_end = self.time_update_evt + self.rules.update_interval;
            self.schedule_tile_crossings(path_id, time, window_end);
        }
        Ok(())
    }

    /// Whether the path may be given a new move at `time`
    pub fn can_move(&self, path_id: PathId, time: Time) -> bool {
        let Some(path) = self.timeline.path(path_id) else {
            return false;
        };
        let starts = path.moves.first().map_or(Time::MAX, |m| m.time_start);
        if time < starts || path.speed <= 0 {
            return false;
        }
        if time < self.time_sim {
            let Some(segment) = self.timeline.active_segment(path_id, time) else {
                return false;
            };
            return self
                .timeline
                .segment_units(segment)
                .iter()
                .all(|su| su.unseen_after(self));
        }
        true
    }

    pub(crate) fn schedule_tile_crossings(&mut self, path_id: PathId, t_min: Time, t_max: Time) {
        if t_max < t_min {
            return;
        }
        let Some(path) = self.timeline.path(path_id) else {
            return;
        };
        if path.tile == PathTile::Gone {
            return;
        }
        for (time, target) in path.tile_move_events(t_min, t_max) {
            self.events.schedule(
                time,
                SimEvent::TileMove {
                    path: path_id,
                    target,
                },
            );
        }
    }

    /// Make a time-traveling path authoritative from the current time on
    pub fn go_live(&mut self, path_id: PathId) {
        let time = self.time_sim;
        let has_units = self.path_has_units(path_id);
        let Some(path) = self.timeline.path_mut(path_id) else {
            return;
        };
        path.time_sim_past = None;
        if !has_units {
            path.tile = PathTile::Gone;
            return;
        }
        let tile = path.tile_at(time);
        self.events.schedule(
            time,
            SimEvent::TileMove {
                path: path_id,
                target: TileTarget::Tile(tile),
            },
        );
        let window_end = self.time_update_evt + self.rules.update_interval;
        self.schedule_tile_crossings(path_id, time, window_end);
    }

    /// The path's composition from `time` on is known only to its owner
    pub fn be_unseen(&mut self, path_id: PathId, time: Time) {
        if let Some(segment) = self.timeline.insert_segment(path_id, time) {
            self.timeline.segment_mut(segment).unseen = true;
        }
    }

    /// The path's composition from `time` on may be known to rivals, so any
    /// alternative history for its units must go
    ///
    /// Failing to remove an alternative means a rival already saw two
    /// versions of the same unit, which the game state cannot recover from.
    pub fn be_seen(&mut self, path_id: PathId, time: Time) -> Result<()> {
        let Some(segment) = self.timeline.insert_segment(path_id, time) else {
            return Ok(());
        };
        self.timeline.segment_mut(segment).unseen = false;
        let seen = self.timeline.segment_units(segment);
        if !self.delete_other_paths(&seen) {
            tracing::error!(path = %path_id, time, "failed to delete other paths of seen path");
            return Err(SimError::Invariant(format!(
                "alternatives of {} seen at {} could not be deleted",
                path_id, time
            )));
        }
        Ok(())
    }

    /// Verify a time-traveling path stayed on tiles exclusive to its owner
    /// since its last verified instant, collapsing it if not
    pub fn update_past(&mut self, path_id: PathId, cur_time: Time) {
        let Some(path) = self.timeline.path(path_id) else {
            return;
        };
        let Some(time_past) = path.time_sim_past else {
            return;
        };
        if cur_time <= time_past || !self.path_has_units(path_id) {
            return;
        }
        let player = path.player.index();
        let time_next = cur_time.min(self.time_sim);
        let mut tile = path.tile_at(time_past);
        let crossings = path.tile_move_events(time_past, time_next);

        let first_check = crossings.first().map_or(cur_time, |&(t, _)| t - 1);
        let held = self
            .tiles
            .get(tile)
            .and_then(|t| t.exclusive[player].on_since(first_check))
            .map_or(false, |since| since <= time_past);
        if !held {
            self.decohere(path_id, time_past);
            return;
        }

        for (time, target) in crossings {
            match target {
                TileTarget::Column(x) => tile.x = x,
                TileTarget::Row(y) => tile.y = y,
                TileTarget::Tile(t) => tile = t,
                TileTarget::OffMap => continue,
            }
            let held = self.tiles.get(tile).map_or(false, |t| {
                let log = &t.exclusive[player];
                log.when(time) && log.next_toggle_after(time).map_or(true, |t| t > time_next)
            });
            if !held {
                self.decohere(path_id, time);
                return;
            }
        }

        if let Some(path) = self.timeline.path_mut(path_id) {
            path.time_sim_past = Some(time_next);
        }
    }

    /// Collapse a time-traveling path whose existence became inconsistent
    /// with what a rival could infer
    fn decohere(&mut self, path_id: PathId, time: Time) {
        let Some(segment) = self.timeline.latest_segment(path_id) else {
            return;
        };
        let player = self.timeline.paths[path_id.index()].player;
        tracing::info!(path = %path_id, %player, time, "path decohered");

        for su in self.timeline.segment_units(segment) {
            su.delete(self);
        }
        let remaining = std::mem::take(&mut self.timeline.segment_mut(segment).units);
        if !remaining.is_empty() {
            tracing::debug!(path = %path_id, units = remaining.len(), "forced segment empty");
        }
        self.players[player.index()].last_decoherence = Some(time);
    }
}
