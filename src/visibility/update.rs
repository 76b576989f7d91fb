//! Visibility propagation driven by tile-crossing events

use crate::core::error::Result;
use crate::core::types::{PathId, PlayerId, Time, TilePos};
use crate::sim::{Sim, SimEvent};
use crate::timeline::PathTile;
use crate::visibility::TileTarget;

impl Sim {
    /// Move a live path between tiles, updating everyone's visibility
    pub(crate) fn apply_tile_move(
        &mut self,
        path_id: PathId,
        target: TileTarget,
        time: Time,
    ) -> Result<()> {
        let Some(path) = self.timeline.path(path_id) else {
            return Ok(());
        };
        if !path.is_live() {
            return Ok(());
        }
        let player = path.player;
        let prev = match path.tile {
            PathTile::Gone => return Ok(()),
            PathTile::Pending => None,
            PathTile::At(tile) => Some(tile),
        };
        let next = match (target, prev) {
            (TileTarget::Tile(tile), _) => Some(tile),
            (TileTarget::Column(x), Some(p)) => Some(TilePos::new(x, p.y)),
            (TileTarget::Row(y), Some(p)) => Some(TilePos::new(p.x, y)),
            (TileTarget::Column(_) | TileTarget::Row(_), None) => return Ok(()),
            (TileTarget::OffMap, _) => None,
        };
        if next.is_some() && next == prev {
            return Ok(());
        }
        if let Some(path) = self.timeline.path_mut(path_id) {
            path.tile = next.map_or(PathTile::Gone, PathTile::At);
        }
        tracing::trace!(path = %path_id, ?prev, ?next, time, "tile move");

        let radius = self.rules.tile_vis_radius;
        if let Some(n) = next {
            for t in n.square(radius) {
                if self.sees(n, t) && !prev.map_or(false, |p| self.sees(p, t)) {
                    self.vis_add(path_id, player, t, time)?;
                }
            }
        }
        if let Some(p) = prev {
            for t in p.square(radius) {
                if self.sees(p, t) && !next.map_or(false, |n| self.sees(n, t)) {
                    self.vis_remove(path_id, player, t, time);
                }
            }
        }

        if let Some(n) = next.filter(|&n| self.tiles.contains(n)) {
            self.sync_path_seen(path_id, n, time)?;
            if let Some(p) = prev.filter(|&p| self.tiles.contains(p)) {
                // moved out of a rival's direct sight: the rival can no longer
                // vouch for the area it last saw this path in
                for rival in self.player_ids() {
                    if rival == player {
                        continue;
                    }
                    let was_seen = self.tiles.get(p).map_or(false, |t| t.direct_latest(rival));
                    let now_seen = self.tiles.get(n).map_or(false, |t| t.direct_latest(rival));
                    if was_seen && !now_seen {
                        self.schedule_vis_remove_around(rival, n, time);
                    }
                }
            }
        }

        if let Some(p) = prev.filter(|&p| self.tiles.contains(p)) {
            let watched: Vec<PathId> = self
                .tiles
                .get(p)
                .map(|tile| {
                    tile.path_vis
                        .iter()
                        .filter(|(_, log)| log.latest())
                        .map(|(&id, _)| id)
                        .collect()
                })
                .unwrap_or_default();
            for other in watched {
                let Some(other_path) = self.timeline.path(other) else {
                    continue;
                };
                if other_path.player == player || !self.path_has_units(other) {
                    continue;
                }
                let PathTile::At(other_tile) = other_path.tile else {
                    continue;
                };
                let still_seen = self
                    .tiles
                    .get(other_tile)
                    .map_or(true, |t| t.direct_latest(player));
                if !still_seen {
                    self.schedule_vis_remove_around(player, other_tile, time);
                }
            }
        }
        Ok(())
    }

    /// Whether a unit standing on `from` sees `to`
    fn sees(&self, from: TilePos, to: TilePos) -> bool {
        self.rules.in_vis(to.x - from.x, to.y - from.y)
    }

    fn schedule_vis_remove_around(&mut self, player: PlayerId, center: TilePos, time: Time) {
        for t in center.neighborhood() {
            if self.tiles.contains(t) {
                self.events
                    .schedule(time, SimEvent::PlayerVisRemove { player, tile: t });
            }
        }
    }

    fn vis_add(&mut self, path: PathId, player: PlayerId, pos: TilePos, time: Time) -> Result<()> {
        let p = player.index();
        let Some(tile) = self.tiles.get_mut(pos) else {
            return Ok(());
        };
        let log = tile.path_vis.entry(path).or_default();
        debug_assert!(!log.latest(), "{} already sees tile {}", path, pos);
        log.toggle(time);
        tile.viewers[p] += 1;
        if tile.viewers[p] == 1 {
            tile.direct[p].toggle(time);
        }
        if !tile.general[p].latest() {
            tile.general[p].toggle(time);
            self.recompute_exclusive_around(pos, time)?;
        }
        Ok(())
    }

    fn vis_remove(&mut self, path: PathId, player: PlayerId, pos: TilePos, time: Time) {
        let p = player.index();
        let Some(tile) = self.tiles.get_mut(pos) else {
            return;
        };
        if let Some(log) = tile.path_vis.get_mut(&path) {
            debug_assert!(log.latest(), "{} already doesn't see tile {}", path, pos);
            log.toggle(time);
        }
        tile.viewers[p] = tile.viewers[p].saturating_sub(1);
        if tile.viewers[p] == 0 && tile.direct[p].latest() {
            tile.direct[p].toggle(time);
        }
        if !tile.general[p].latest() || tile.direct[p].latest() {
            return;
        }

        // the tile stays generally visible until an invisible neighbour could
        // have delivered a hidden unit into it
        let mut time_lost = Time::MAX;
        for n in pos.neighbors() {
            if let Some(neighbor) = self.tiles.get(n) {
                if !neighbor.general[p].latest() {
                    let lost = neighbor.general[p].last_toggle().unwrap_or(Time::MIN);
                    time_lost = time_lost.min(lost);
                }
            }
        }
        if time_lost != Time::MAX {
            let at = time.max(time_lost.saturating_add(self.rules.tile_cross_time()));
            self.events
                .schedule(at, SimEvent::PlayerVisRemove { player, tile: pos });
        }
    }

    /// A player stops generally seeing a tile it no longer directly sees
    pub(crate) fn apply_player_vis_remove(
        &mut self,
        player: PlayerId,
        pos: TilePos,
        time: Time,
    ) -> Result<()> {
        let p = player.index();
        let Some(tile) = self.tiles.get_mut(pos) else {
            return Ok(());
        };
        if !tile.general[p].latest() || tile.direct[p].latest() {
            return Ok(());
        }
        tile.general[p].toggle(time);
        self.recompute_exclusive_around(pos, time)?;

        let delay = self.rules.tile_cross_time();
        for n in pos.neighbors() {
            if self.tiles.get(n).map_or(false, |t| t.general[p].latest()) {
                self.events
                    .schedule(time + delay, SimEvent::PlayerVisRemove { player, tile: n });
            }
        }
        Ok(())
    }

    fn recompute_exclusive_around(&mut self, center: TilePos, time: Time) -> Result<()> {
        let radius = self.rules.tile_vis_radius;
        for player in self.player_ids() {
            for t in center.square(radius) {
                let Some(tile) = self.tiles.get(t) else {
                    continue;
                };
                let current = tile.exclusive_latest(player);
                let wanted = self.calc_exclusive(player, t);
                if current != wanted {
                    self.set_exclusive(player, t, wanted, time)?;
                }
            }
        }
        Ok(())
    }

    /// The player generally sees every tile in sight range of `pos`, and no
    /// rival generally sees `pos`
    fn calc_exclusive(&self, player: PlayerId, pos: TilePos) -> bool {
        let radius = self.rules.tile_vis_radius;
        for t in pos.square(radius) {
            if let Some(tile) = self.tiles.get(t) {
                if self.sees(pos, t) && !tile.general_latest(player) {
                    return false;
                }
            }
        }
        let Some(tile) = self.tiles.get(pos) else {
            return false;
        };
        self.player_ids()
            .all(|rival| rival == player || !tile.general_latest(rival))
    }

    fn set_exclusive(&mut self, player: PlayerId, pos: TilePos, on: bool, time: Time) -> Result<()> {
        if let Some(tile) = self.tiles.get_mut(pos) {
            tile.exclusive[player.index()].toggle(time);
        }
        let here: Vec<PathId> = self
            .timeline
            .paths
            .iter()
            .filter(|p| p.player == player && p.is_live() && p.tile == PathTile::At(pos))
            .map(|p| p.id)
            .collect();
        tracing::trace!(%player, %pos, on, paths = here.len(), "exclusivity changed");
        for path in here {
            self.sync_path_seen(path, pos, time)?;
        }
        Ok(())
    }

    /// Mark a live path unseen while it stands on a tile exclusive to its
    /// owner, and seen otherwise
    fn sync_path_seen(&mut self, path_id: PathId, pos: TilePos, time: Time) -> Result<()> {
        let Some(path) = self.timeline.path(path_id) else {
            return Ok(());
        };
        let player = path.player;
        let Some(segment) = self.timeline.active_segment(path_id, time) else {
            return Ok(());
        };
        let segment = self.timeline.segment(segment);
        if segment.units.is_empty() {
            return Ok(());
        }
        let exclusive = self
            .tiles
            .get(pos)
            .map_or(false, |t| t.exclusive_latest(player));
        if exclusive && !segment.unseen {
            self.be_unseen(path_id, time);
        } else if !exclusive && segment.unseen {
            self.be_seen(path_id, time)?;
        }
        Ok(())
    }
}
