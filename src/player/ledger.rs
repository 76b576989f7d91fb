//! Resource and population accounting
//!
//! A player's balance at time `t` is its starting amount plus what every new
//! unit collected while alive, minus what each one cost to make. Units that
//! started on a scenario path were free. Only new units count: a unit that
//! moves between paths keeps collecting on its original record.

use serde::{Deserialize, Serialize};

use crate::core::types::{PathId, PlayerId, Time};
use crate::sim::Sim;
use crate::timeline::SegmentUnit;

/// Band of possible resource amounts while time travel is unresolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRange {
    pub min: i64,
    pub max: i64,
}

impl ResourceRange {
    pub fn is_exact(&self) -> bool {
        self.min == self.max
    }
}

impl Sim {
    pub(crate) fn player_paths(&self, player: PlayerId) -> impl Iterator<Item = PathId> + '_ {
        self.timeline
            .paths
            .iter()
            .filter(move |p| p.player == player)
            .map(|p| p.id)
    }

    pub(crate) fn first_segment_time(&self, path: PathId) -> Time {
        self.timeline.paths[path.index()]
            .segments
            .first()
            .map_or(Time::MAX, |&s| self.timeline.segment(s).time_start)
    }

    /// Presence of every unit the player made, on the path it was made on
    pub fn new_unit_segments(&self, player: PlayerId, include_non_live: bool) -> Vec<SegmentUnit> {
        let mut out = Vec::new();
        for path in &self.timeline.paths {
            if path.player != player || !(include_non_live || path.is_live()) {
                continue;
            }
            let Some(&first) = path.segments.first() else {
                continue;
            };
            out.extend(
                self.timeline
                    .segment_units(first)
                    .into_iter()
                    .filter(|su| su.prev(self).is_empty()),
            );
        }
        out
    }

    /// Fixed-point amount of resource `rsc` the player has at `time`
    pub fn resource(&self, player: PlayerId, time: Time, rsc: usize, include_non_live: bool) -> i64 {
        let p = &self.players[player.index()];
        let mut total = p.start_resources.get(rsc).copied().unwrap_or(0);
        for su in self.new_unit_segments(player, include_non_live) {
            let unit = &self.units[su.unit.index()];
            let unit_type = &self.unit_types[unit.type_id.index()];
            let path = self.timeline.segment(su.segment).path;
            let until = if unit.health_when(time) == 0 {
                unit.death_time().unwrap_or(time)
            } else {
                time
            };
            let alive = until - self.first_segment_time(path);
            if alive < 0 {
                continue;
            }
            total += unit_type.collect_rate.get(rsc).copied().unwrap_or(0) * alive;
            if path.index() >= self.n_root_paths {
                total -= unit_type.cost.get(rsc).copied().unwrap_or(0);
            }
        }
        total
    }

    pub fn resource_range(&self, player: PlayerId, time: Time, rsc: usize) -> ResourceRange {
        let live = self.resource(player, time, rsc, false);
        let all = self.resource(player, time, rsc, true);
        ResourceRange {
            min: live.min(all),
            max: live.max(all),
        }
    }

    /// Earliest path-creation time since `time_min` at which the player was
    /// in debt for some resource
    pub fn check_negative_resources_since(
        &self,
        player: PlayerId,
        time_min: Time,
        include_non_live: bool,
    ) -> Option<Time> {
        let n_rsc = self.rules.resource_names.len();
        self.creation_times_since(player, time_min).find(|&t| {
            (0..n_rsc).any(|rsc| self.resource(player, t, rsc, include_non_live) < 0)
        })
    }

    /// Earliest path-creation time since `time_min` at which the player
    /// exceeded its population limit, counting non-live units
    pub fn check_population_since(&self, player: PlayerId, time_min: Time) -> Option<Time> {
        let limit = self.players[player.index()].population_limit?;
        self.creation_times_since(player, time_min)
            .find(|&t| self.population(player, t) > limit)
    }

    /// Mobile units of the player alive at `time`, counting non-live ones
    pub fn population(&self, player: PlayerId, time: Time) -> u32 {
        self.new_unit_segments(player, true)
            .into_iter()
            .filter(|su| {
                let unit = &self.units[su.unit.index()];
                let path = self.timeline.segment(su.segment).path;
                time >= self.first_segment_time(path)
                    && unit.health_when(time) > 0
                    && self.unit_types[unit.type_id.index()].speed > 0
            })
            .count() as u32
    }

    fn creation_times_since(&self, player: PlayerId, time_min: Time) -> impl Iterator<Item = Time> {
        let mut times: Vec<Time> = self
            .player_paths(player)
            .map(|p| self.first_segment_time(p))
            .filter(|&t| t >= time_min && t != Time::MAX)
            .collect();
        times.sort_unstable();
        times.dedup();
        times.into_iter()
    }
}
