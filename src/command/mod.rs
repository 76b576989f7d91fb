//! Player commands
//!
//! Commands are versioned serde records carrying two times: when the player
//! issued them (`time`) and the instant in game history they act on
//! (`time_cmd`, possibly in the past). The pipeline is:
//! Command -> SelectionResolver -> ResolvedSelection -> CommandExecutor

pub mod executor;
pub mod resolver;

pub use executor::{CommandExecutor, ExecutionResult};
pub use resolver::{ResolvedSelection, SelectionResolver};

use serde::{Deserialize, Serialize};

use crate::core::fp::FpVector;
use crate::core::types::{PathId, PlayerId, Time, UnitId, UnitTypeId};
use crate::timeline::Formation;

/// Wire format version understood by this build
pub const COMMAND_VERSION: u32 = 1;

/// Units picked by the player, grouped by the path they were picked on
///
/// Kept as a list of pairs so it survives the buffering serde does for
/// internally tagged enums.
pub type Selection = Vec<(PathId, Vec<UnitId>)>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default = "default_version")]
    pub version: u32,
    pub player: PlayerId,
    /// When the command was issued
    pub time: Time,
    /// When in game history the command takes effect
    pub time_cmd: Time,
    #[serde(flatten)]
    pub kind: CommandKind,
}

fn default_version() -> u32 {
    COMMAND_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum CommandKind {
    Move {
        paths: Selection,
        pos: FpVector,
        #[serde(default)]
        formation: Formation,
    },
    MakeUnit {
        paths: Selection,
        unit_type: UnitTypeId,
        #[serde(default)]
        pos: Option<FpVector>,
    },
    MakePath {
        paths: Selection,
        #[serde(default)]
        pos: Option<FpVector>,
    },
    DeletePath {
        paths: Selection,
    },
    DeleteOtherPaths {
        paths: Selection,
    },
    Stack {
        paths: Selection,
    },
    GoLive,
}

impl CommandKind {
    pub fn tag(&self) -> &'static str {
        match self {
            CommandKind::Move { .. } => "move",
            CommandKind::MakeUnit { .. } => "make_unit",
            CommandKind::MakePath { .. } => "make_path",
            CommandKind::DeletePath { .. } => "delete_path",
            CommandKind::DeleteOtherPaths { .. } => "delete_other_paths",
            CommandKind::Stack { .. } => "stack",
            CommandKind::GoLive => "go_live",
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            CommandKind::Move { paths, .. }
            | CommandKind::MakeUnit { paths, .. }
            | CommandKind::MakePath { paths, .. }
            | CommandKind::DeletePath { paths }
            | CommandKind::DeleteOtherPaths { paths }
            | CommandKind::Stack { paths } => Some(paths),
            CommandKind::GoLive => None,
        }
    }
}

impl Command {
    /// Command acting at the moment it is issued
    pub fn now(player: PlayerId, time: Time, kind: CommandKind) -> Self {
        Self {
            version: COMMAND_VERSION,
            player,
            time,
            time_cmd: time,
            kind,
        }
    }

    /// Command issued at `time` that edits history at `time_cmd`
    pub fn at(player: PlayerId, time: Time, time_cmd: Time, kind: CommandKind) -> Self {
        Self {
            version: COMMAND_VERSION,
            player,
            time,
            time_cmd,
            kind,
        }
    }

    /// Key identifying exact duplicates
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Selection of whole paths, each with the given units
pub fn select<I>(entries: I) -> Selection
where
    I: IntoIterator<Item = (PathId, Vec<UnitId>)>,
{
    entries.into_iter().collect()
}
