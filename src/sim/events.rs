//! Event kinds and how each one changes the simulation

use crate::command::{Command, CommandExecutor, ExecutionResult};
use crate::core::error::Result;
use crate::core::types::{PathId, PlayerId, SegmentId, Time, TilePos, UnitId};
use crate::sim::Sim;
use crate::timeline::{PathTile, SegmentUnit};
use crate::visibility::TileTarget;

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Apply a player command
    Command(Command),
    /// Periodic bookkeeping; reschedules itself
    Update,
    /// A live path enters a tile or leaves the map
    TileMove { path: PathId, target: TileTarget },
    /// A player may stop generally seeing a tile
    PlayerVisRemove { player: PlayerId, tile: TilePos },
    /// Merge co-located paths
    Stack { paths: Vec<PathId> },
    /// Health loss from an earlier attack
    Attack { target: UnitId, damage: u32 },
}

impl SimEvent {
    pub fn tag(&self) -> u8 {
        match self {
            SimEvent::Command(_) => 0,
            SimEvent::Update => 1,
            SimEvent::TileMove { .. } => 2,
            SimEvent::PlayerVisRemove { .. } => 3,
            SimEvent::Stack { .. } => 4,
            SimEvent::Attack { .. } => 5,
        }
    }
}

impl Sim {
    pub(crate) fn apply(&mut self, event: SimEvent, time: Time) -> Result<()> {
        match event {
            SimEvent::Command(cmd) => {
                let player = cmd.player;
                let tag = cmd.kind.tag();
                match CommandExecutor::execute(self, &cmd) {
                    ExecutionResult::Applied { paths } => {
                        tracing::debug!(%player, tag, time, paths = paths.len(), "command applied");
                    }
                    ExecutionResult::Rejected(reason) => {
                        tracing::debug!(%player, tag, time, %reason, "command rejected");
                    }
                    ExecutionResult::Failed(err) => return Err(err),
                }
            }
            SimEvent::Update => self.apply_update(time),
            SimEvent::TileMove { path, target } => self.apply_tile_move(path, target, time)?,
            SimEvent::PlayerVisRemove { player, tile } => {
                self.apply_player_vis_remove(player, tile, time)?
            }
            SimEvent::Stack { paths } => self.apply_stack(&paths, time),
            SimEvent::Attack { target, damage } => self.apply_attack(target, damage, time),
        }
        Ok(())
    }

    fn apply_update(&mut self, time: Time) {
        self.time_update_evt = time;
        self.record_state_digest(time);
        let snapshot = self.checksum.value();
        self.checksum_trace.insert(time, snapshot);
        self.lockstep.verify(time, snapshot);

        self.passive_targeting(time);

        for cmd in self.lockstep.take_due(time) {
            self.events.schedule(time, SimEvent::Command(cmd));
        }

        let window_end = time + self.rules.update_interval;
        for path in self.timeline.path_ids() {
            let p = &self.timeline.paths[path.index()];
            if p.is_live() && matches!(p.tile, PathTile::At(_)) {
                self.schedule_tile_crossings(path, time, window_end);
            }
        }
        self.events.schedule(window_end, SimEvent::Update);
    }

    /// Fold what peers must agree on into the checksum
    fn record_state_digest(&mut self, time: Time) {
        for path in &self.timeline.paths {
            let members = self
                .timeline
                .active_segment(path.id, time)
                .map_or(0, |s| self.timeline.segment(s).units.len());
            let pos = path.pos_at(time);
            self.checksum.record_value(path.id.0 as u64);
            self.checksum.record_value(members as u64);
            self.checksum.record_value(pos.x as u64);
            self.checksum.record_value(pos.y as u64);
        }
        for unit in &self.units {
            self.checksum.record_value(unit.health_when(time) as u64);
        }
    }

    /// Every armed live unit off reload attacks the closest enemy path in
    /// range, hitting each unit on it that its weapon can damage
    fn passive_targeting(&mut self, time: Time) {
        let live: Vec<PathId> = self
            .timeline
            .paths
            .iter()
            .filter(|p| p.is_live() && matches!(p.tile, PathTile::At(_)))
            .map(|p| p.id)
            .collect();

        for &path in &live {
            let Some(segment) = self.timeline.active_segment(path, time) else {
                continue;
            };
            let owner = self.timeline.paths[path.index()].player;
            let pos = self.timeline.paths[path.index()].pos_at(time);
            let members = self.timeline.segment(segment).units.clone();

            for attacker in members {
                let unit_type = self.unit_type_of(attacker);
                let (range, reload, type_id) = (unit_type.range, unit_type.reload, unit_type.id);
                let unit = &self.units[attacker.index()];
                if !unit_type.is_armed()
                    || unit.health_when(time) == 0
                    || !unit.can_attack_at(time, reload)
                {
                    continue;
                }
                let range_sq = (range as i128) * (range as i128);
                let weapon = &self.unit_types[type_id.index()];

                let mut best: Option<(i128, PathId, SegmentId)> = None;
                for &other in &live {
                    let other_path = &self.timeline.paths[other.index()];
                    if !self.players[owner.index()].can_attack(other_path.player) {
                        continue;
                    }
                    let dist = (other_path.pos_at(time) - pos).length_sq();
                    if dist > range_sq || best.map_or(false, |(d, _, _)| dist >= d) {
                        continue;
                    }
                    let Some(other_seg) = self.timeline.active_segment(other, time) else {
                        continue;
                    };
                    let hittable = self.timeline.segment(other_seg).units.iter().any(|&u| {
                        let victim = &self.units[u.index()];
                        victim.health_latest() > 0 && weapon.damage_to(victim.type_id) > 0
                    });
                    if hittable {
                        best = Some((dist, other, other_seg));
                    }
                }
                let Some((_, target_path, target_seg)) = best else {
                    continue;
                };

                let hits: Vec<(UnitId, u32)> = self
                    .timeline
                    .segment(target_seg)
                    .units
                    .iter()
                    .map(|&u| (u, weapon.damage_to(self.units[u.index()].type_id)))
                    .filter(|&(u, damage)| damage > 0 && self.units[u.index()].health_latest() > 0)
                    .collect();
                for &(target, damage) in &hits {
                    // one millisecond later so earlier victims get no head start
                    self.events
                        .schedule(time + 1, SimEvent::Attack { target, damage });
                }
                self.units[attacker.index()].time_attack = Some(time);
                tracing::debug!(%attacker, target = %target_path, hits = hits.len(), time, "attack");

                // every version of the attacker the victims could have seen
                let target_pos = self.timeline.paths[target_path.index()].pos_at(time);
                let mut origin = SegmentUnit::new(segment, attacker);
                while let Some(&earlier) = origin.prev(self).first() {
                    origin = earlier;
                }
                let exposed: Vec<SegmentUnit> = self
                    .active_segment_units(&[origin], time)
                    .into_iter()
                    .filter(|su| {
                        let at = self.timeline.path_of(su.segment).pos_at(time);
                        (target_pos - at).length_sq() <= range_sq
                    })
                    .collect();
                if !self.delete_other_paths(&exposed) {
                    tracing::debug!(%attacker, "attacker alternatives kept");
                }
            }
        }
    }

    fn apply_attack(&mut self, target: UnitId, damage: u32, time: Time) {
        for _ in 0..damage {
            if self.units[target.index()].take_health(time) {
                self.remove_dead_unit(target, time);
                break;
            }
        }
    }

    /// Take a dead unit off every path from its time of death on
    fn remove_dead_unit(&mut self, unit: UnitId, time: Time) {
        tracing::info!(%unit, time, "unit destroyed");
        for path in self.timeline.path_ids() {
            let holds = self
                .timeline
                .active_segment(path, time)
                .map_or(false, |s| self.timeline.segment(s).contains(unit));
            if !holds {
                continue;
            }
            let Some(segment) = self.timeline.insert_segment(path, time) else {
                continue;
            };
            let from = self.timeline.segment(segment).index;
            let later = self.timeline.paths[path.index()].segments[from..].to_vec();
            for s in later {
                self.timeline.segment_mut(s).remove_unit(unit);
            }
            let p = &self.timeline.paths[path.index()];
            if p.is_live() && p.tile != PathTile::Gone && !self.path_has_units(path) {
                self.events.schedule(
                    time,
                    SimEvent::TileMove {
                        path,
                        target: TileTarget::OffMap,
                    },
                );
            }
        }
    }

    /// Ask for `paths` to be merged once each has stopped moving
    pub(crate) fn add_stack_events(&mut self, paths: &[PathId]) {
        if paths.len() < 2 {
            return;
        }
        for &path in paths {
            let Some(p) = self.timeline.path(path) else {
                continue;
            };
            let at = p.moves_end().max(self.time_sim);
            self.events.schedule(
                at,
                SimEvent::Stack {
                    paths: paths.to_vec(),
                },
            );
        }
    }

    fn apply_stack(&mut self, paths: &[PathId], time: Time) {
        let mut sorted: Vec<PathId> = paths
            .iter()
            .copied()
            .filter(|&p| self.timeline.path(p).is_some())
            .collect();
        sorted.sort();
        sorted.dedup();

        let waiting = sorted
            .iter()
            .copied()
            .find(|&p| !self.timeline.paths[p.index()].is_live());
        if let Some(waiting) = waiting {
            let player = self.timeline.paths[waiting.index()].player;
            self.players[player.index()]
                .go_live_stack_paths
                .extend(sorted.iter().copied());
            return;
        }

        let ready: Vec<PathId> = sorted
            .into_iter()
            .filter(|&p| {
                let path = &self.timeline.paths[p.index()];
                path.moves_end() <= time && self.path_has_units(p)
            })
            .collect();
        let mut merged = vec![false; ready.len()];
        for i in 0..ready.len() {
            if merged[i] {
                continue;
            }
            for j in i + 1..ready.len() {
                if merged[j] {
                    continue;
                }
                let (a, b) = (&self.timeline.paths[ready[i].index()], &self.timeline.paths[ready[j].index()]);
                if a.player == b.player && a.speed == b.speed && a.pos_at(time) == b.pos_at(time) {
                    self.merge_paths(ready[i], ready[j], time);
                    merged[j] = true;
                }
            }
        }
    }

    /// Move every unit of `from` onto `into` at `time`
    fn merge_paths(&mut self, into: PathId, from: PathId, time: Time) {
        let Some(seg_into) = self.timeline.connect(time, into, from) else {
            return;
        };
        let Some(seg_from) = self.timeline.active_segment(from, time) else {
            return;
        };
        let arriving = self.timeline.segment(seg_from).units.clone();

        let start = self.timeline.segment(seg_into).index;
        for s in self.timeline.paths[into.index()].segments[start..].to_vec() {
            let seg = self.timeline.segment_mut(s);
            for &u in &arriving {
                if !seg.contains(u) {
                    seg.units.push(u);
                }
            }
        }
        let start = self.timeline.segment(seg_from).index;
        for s in self.timeline.paths[from.index()].segments[start..].to_vec() {
            self.timeline.segment_mut(s).units.clear();
        }
        self.events.schedule(
            time,
            SimEvent::TileMove {
                path: from,
                target: TileTarget::OffMap,
            },
        );
        tracing::debug!(%into, %from, time, units = arriving.len(), "paths stacked");
    }
}
