//! Tile-based fog of war
//!
//! Each tile keeps per-player toggle logs for three kinds of visibility:
//! direct (a live unit of the player is in range), general (direct, or
//! inferred from seeing every neighbour recently enough that nobody could
//! have slipped in), and exclusive (the player sees everything around the
//! tile and no rival sees the tile itself). Logs only grow, so history can be
//! queried at any past time.

pub mod tile;
pub mod toggle;
mod update;

pub use tile::{Tile, TileGrid};
pub use toggle::ToggleLog;

use serde::{Deserialize, Serialize};

/// Destination of a tile-crossing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileTarget {
    /// Place the path on a tile
    Tile(crate::core::types::TilePos),
    /// Cross into a new column, keeping the current row
    Column(i32),
    /// Cross into a new row, keeping the current column
    Row(i32),
    /// Remove the path from the map
    OffMap,
}

impl TileTarget {
    pub fn is_crossing(&self) -> bool {
        matches!(self, TileTarget::Column(_) | TileTarget::Row(_))
    }
}

/// Snapshot of one player's visibility of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileVisibility {
    pub direct: bool,
    pub general: bool,
    pub exclusive: bool,
}
