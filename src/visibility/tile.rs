use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::{PathId, PlayerId, TilePos};
use crate::visibility::toggle::ToggleLog;

/// Visibility history of one map cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    /// Direct sight by each path that ever saw this tile
    pub path_vis: BTreeMap<PathId, ToggleLog>,
    /// Per player: at least one of their live paths sees the tile
    pub direct: Vec<ToggleLog>,
    /// Per player: number of their paths currently seeing the tile
    pub viewers: Vec<u32>,
    /// Per player: direct or inferred visibility
    pub general: Vec<ToggleLog>,
    /// Per player: no rival could currently observe the tile
    pub exclusive: Vec<ToggleLog>,
}

impl Tile {
    pub fn new(n_players: usize) -> Self {
        Self {
            path_vis: BTreeMap::new(),
            direct: vec![ToggleLog::new(); n_players],
            viewers: vec![0; n_players],
            general: vec![ToggleLog::new(); n_players],
            exclusive: vec![ToggleLog::new(); n_players],
        }
    }

    pub fn path_sees(&self, path: PathId) -> bool {
        self.path_vis.get(&path).map_or(false, ToggleLog::latest)
    }

    pub fn direct_latest(&self, player: PlayerId) -> bool {
        self.direct[player.index()].latest()
    }

    pub fn general_latest(&self, player: PlayerId) -> bool {
        self.general[player.index()].latest()
    }

    pub fn exclusive_latest(&self, player: PlayerId) -> bool {
        self.exclusive[player.index()].latest()
    }
}

/// Square grid of tiles, one tile per fixed-point map unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    len: i32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(len: i32, n_players: usize) -> Self {
        let count = (len.max(0) as usize).pow(2);
        Self {
            len,
            tiles: vec![Tile::new(n_players); count],
        }
    }

    pub fn len(&self) -> i32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.x < self.len && pos.y >= 0 && pos.y < self.len
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        if self.contains(pos) {
            self.tiles.get(self.offset(pos))
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        if self.contains(pos) {
            let offset = self.offset(pos);
            self.tiles.get_mut(offset)
        } else {
            None
        }
    }

    fn offset(&self, pos: TilePos) -> usize {
        pos.x as usize * self.len as usize + pos.y as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_bounds() {
        let grid = TileGrid::new(4, 2);
        assert!(grid.get(TilePos::new(3, 3)).is_some());
        assert!(grid.get(TilePos::new(4, 0)).is_none());
        assert!(grid.get(TilePos::new(-1, 0)).is_none());
    }
}
