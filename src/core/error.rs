use thiserror::Error;

use crate::core::types::{PathId, PlayerId, Time, UnitId, UnitTypeId};

/// Why a command or structural edit was refused
///
/// Rejections leave the simulation untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("no units selected")]
    EmptySelection,

    #[error("path has no segment active at the requested time")]
    NoActiveSegment,

    #[error("{0} did not exist on the path before the requested time")]
    AmbiguousParent(UnitId),

    #[error("{0} may later be seen by another player")]
    Observed(UnitId),

    #[error("no unit on the path can make {0}")]
    CannotMakeType(UnitTypeId),

    #[error("not enough resources")]
    InsufficientResources,

    #[error("units may not share a path")]
    StackNotAllowed,

    #[error("path cannot move at the requested time")]
    CannotMove,

    #[error("command time {0} is earlier than the last synchronized time")]
    LateCommand(Time),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unknown path: {0}")]
    UnknownPath(PathId),

    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),

    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Command rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("Unsupported command version {0}")]
    UnsupportedCommandVersion(u32),

    #[error("Invalid scenario: {0}")]
    Config(String),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scenario parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
