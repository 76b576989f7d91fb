//! Player state
//!
//! Resource totals are never stored; see [`ledger`] for how they are
//! reconstructed from the timeline.

pub mod ledger;
pub mod reconcile;

pub use ledger::ResourceRange;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::{PathId, PlayerId, Time};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Whether a person plays this side
    pub is_user: bool,
    pub population_limit: Option<u32>,
    /// Fixed-point amount of each resource at game start
    pub start_resources: Vec<i64>,
    /// Indexed by target player
    pub can_attack: Vec<bool>,
    /// May be stale-true; never stale-false
    pub has_non_live_paths: bool,
    pub time_go_live_failed_attempt: Option<Time>,
    /// Time going live would first break the rules
    pub time_go_live_problem: Option<Time>,
    /// Stack requests waiting for the player's paths to go live
    pub go_live_stack_paths: BTreeSet<PathId>,
    pub last_decoherence: Option<Time>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        is_user: bool,
        population_limit: Option<u32>,
        start_resources: Vec<i64>,
        can_attack: Vec<bool>,
    ) -> Self {
        Self {
            id,
            name,
            is_user,
            population_limit,
            start_resources,
            can_attack,
            has_non_live_paths: false,
            time_go_live_failed_attempt: None,
            time_go_live_problem: None,
            go_live_stack_paths: BTreeSet::new(),
            last_decoherence: None,
        }
    }

    pub fn can_attack(&self, other: PlayerId) -> bool {
        self.can_attack.get(other.index()).copied().unwrap_or(false)
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            has_non_live_paths: self.has_non_live_paths,
            go_live_problem: self.time_go_live_problem,
            last_decoherence: self.last_decoherence,
        }
    }
}

/// What the interface shows about a player's time travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub has_non_live_paths: bool,
    /// Standing warning while going live is blocked
    pub go_live_problem: Option<Time>,
    pub last_decoherence: Option<Time>,
}
