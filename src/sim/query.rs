//! Read-only views for presentation layers

use crate::core::error::{Result, SimError};
use crate::core::fp::FpVector;
use crate::core::types::{PathId, PlayerId, Time, TilePos, UnitId};
use crate::player::{PlayerStatus, ResourceRange};
use crate::sim::Sim;
use crate::visibility::TileVisibility;

impl Sim {
    /// What `player` knew about `tile` at `time`; `None` off the map
    pub fn tile_visibility(&self, player: PlayerId, tile: TilePos, time: Time) -> Option<TileVisibility> {
        let t = self.tiles.get(tile)?;
        let p = player.index();
        if p >= self.players.len() {
            return None;
        }
        Some(TileVisibility {
            direct: t.direct[p].when(time),
            general: t.general[p].when(time),
            exclusive: t.exclusive[p].when(time),
        })
    }

    pub fn path_position_at(&self, path: PathId, time: Time) -> Result<FpVector> {
        self.timeline
            .path(path)
            .map(|p| p.pos_at(time))
            .ok_or(SimError::UnknownPath(path))
    }

    pub fn unit_health_at(&self, unit: UnitId, time: Time) -> Result<u32> {
        self.units
            .get(unit.index())
            .map(|u| u.health_when(time))
            .ok_or(SimError::UnknownUnit(unit))
    }

    /// Members of `path` at `time`
    pub fn path_units_at(&self, path: PathId, time: Time) -> Result<Vec<UnitId>> {
        if self.timeline.path(path).is_none() {
            return Err(SimError::UnknownPath(path));
        }
        Ok(self
            .timeline
            .active_segment(path, time)
            .map(|s| self.timeline.segment(s).units.clone())
            .unwrap_or_default())
    }

    pub fn player_resource_range(&self, player: PlayerId, rsc: usize, time: Time) -> Result<ResourceRange> {
        if player.index() >= self.players.len() {
            return Err(SimError::UnknownPlayer(player));
        }
        Ok(self.resource_range(player, time, rsc))
    }

    pub fn player_status(&self, player: PlayerId) -> Result<PlayerStatus> {
        self.players
            .get(player.index())
            .map(|p| p.status())
            .ok_or(SimError::UnknownPlayer(player))
    }
}
