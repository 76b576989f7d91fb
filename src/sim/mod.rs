//! Simulation context and event loop
//!
//! [`Sim`] owns every piece of game state and is passed by reference into
//! every operation. Time only moves forward through [`Sim::advance`], which
//! drains the [`EventQueue`] in `(time, sequence)` order.

pub mod events;
pub mod query;
pub mod scheduler;
pub mod sync;

pub use events::SimEvent;
pub use scheduler::EventQueue;
pub use sync::{Lockstep, PeerSync, SyncAck};

use std::collections::BTreeMap;

use crate::command::{Command, COMMAND_VERSION};
use crate::core::checksum::Checksum;
use crate::core::config::{Rules, Scenario, ScenarioConfig};
use crate::core::error::{Result, SimError};
use crate::core::fp;
use crate::core::types::{PathId, PlayerId, Time, TilePos, UnitId, UnitTypeId};
use crate::player::Player;
use crate::timeline::{Timeline, Unit, UnitType};
use crate::visibility::{TileGrid, TileTarget};

pub struct Sim {
    pub rules: Rules,
    pub unit_types: Vec<UnitType>,
    pub players: Vec<Player>,
    pub units: Vec<Unit>,
    pub timeline: Timeline,
    pub tiles: TileGrid,
    pub events: EventQueue,
    /// Latest instant of authoritative history
    pub time_sim: Time,
    /// Time of the latest update event
    pub time_update_evt: Time,
    /// Paths placed by the scenario; units made on them were free
    pub n_root_paths: usize,
    pub checksum: Checksum,
    /// Checksum snapshot taken at each update event
    pub checksum_trace: BTreeMap<Time, u64>,
    pub lockstep: Lockstep,
    stalled: bool,
}

impl Sim {
    /// Single-machine game: submitted commands apply directly
    pub fn new(config: &ScenarioConfig) -> Result<Self> {
        let scenario = config.build()?;
        Ok(Self::from_scenario(scenario, Lockstep::solo()))
    }

    /// One peer of a lockstep game; every user player is a peer
    pub fn networked(config: &ScenarioConfig, local: PlayerId) -> Result<Self> {
        let scenario = config.build()?;
        if local.index() >= scenario.players.len() {
            return Err(SimError::UnknownPlayer(local));
        }
        let peers = scenario
            .players
            .iter()
            .filter(|p| p.is_user)
            .map(|p| p.id)
            .collect();
        Ok(Self::from_scenario(scenario, Lockstep::networked(local, peers)))
    }

    fn from_scenario(scenario: Scenario, lockstep: Lockstep) -> Self {
        let Scenario {
            rules,
            unit_types,
            players,
            paths,
        } = scenario;
        let tiles = TileGrid::new(rules.tile_len(), players.len());
        let mut sim = Self {
            rules,
            unit_types,
            players,
            units: Vec::new(),
            timeline: Timeline::new(),
            tiles,
            events: EventQueue::new(),
            time_sim: 0,
            time_update_evt: 0,
            n_root_paths: paths.len(),
            checksum: Checksum::new(),
            checksum_trace: BTreeMap::new(),
            lockstep,
            stalled: false,
        };

        for initial in paths {
            let units: Vec<UnitId> = initial
                .units
                .iter()
                .map(|&type_id| sim.push_unit(type_id, initial.player))
                .collect();
            let speed = sim.unit_types[initial.units[0].index()].speed;
            let pos = initial.pos.clamp_to(sim.rules.map_size);
            let path = sim
                .timeline
                .add_path(initial.player, speed, units, 0, pos, false, None);
            let tile = TilePos::new(fp::to_tile(pos.x), fp::to_tile(pos.y));
            sim.events.schedule(
                0,
                SimEvent::TileMove {
                    path,
                    target: TileTarget::Tile(tile),
                },
            );
        }
        sim.events.schedule(0, SimEvent::Update);
        tracing::info!(
            players = sim.players.len(),
            paths = sim.n_root_paths,
            tiles = sim.tiles.len(),
            "simulation created"
        );
        sim
    }

    pub(crate) fn push_unit(&mut self, type_id: UnitTypeId, player: PlayerId) -> UnitId {
        let id = UnitId::new(self.units.len());
        let unit = Unit::new(id, &self.unit_types[type_id.index()], player);
        self.units.push(unit);
        id
    }

    pub fn unit_type_of(&self, unit: UnitId) -> &UnitType {
        &self.unit_types[self.units[unit.index()].type_id.index()]
    }

    /// Every player id, detached from `self` so callers may mutate while
    /// iterating
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> {
        (0..self.players.len()).map(PlayerId::new)
    }

    pub fn path_has_units(&self, path: PathId) -> bool {
        self.timeline
            .latest_segment(path)
            .map_or(false, |s| !self.timeline.segment(s).units.is_empty())
    }

    pub fn is_synced(&self) -> bool {
        self.lockstep.synced
    }

    /// Whether the last advance was held back waiting for a peer
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Accept a command from the local player
    ///
    /// Returns the command as it should be sent to the other peers, or
    /// `None` for an exact duplicate.
    pub fn submit(&mut self, mut cmd: Command) -> Result<Option<Command>> {
        self.check_incoming(&cmd)?;
        if !self.lockstep.first_sight(&cmd) {
            tracing::debug!(player = %cmd.player, tag = cmd.kind.tag(), "duplicate command ignored");
            return Ok(None);
        }
        if self.lockstep.is_solo() {
            cmd.time = cmd.time.max(self.time_sim);
            self.events.schedule(cmd.time, SimEvent::Command(cmd.clone()));
        } else {
            cmd.time = cmd.time.max(self.lockstep.local_sent_through);
            self.lockstep.enqueue(cmd.clone())?;
        }
        Ok(Some(cmd))
    }

    /// Accept a command delivered from another peer
    pub fn receive(&mut self, cmd: Command) -> Result<()> {
        self.check_incoming(&cmd)?;
        if !self.lockstep.first_sight(&cmd) {
            return Ok(());
        }
        self.lockstep.enqueue(cmd)
    }

    fn check_incoming(&self, cmd: &Command) -> Result<()> {
        if cmd.version != COMMAND_VERSION {
            return Err(SimError::UnsupportedCommandVersion(cmd.version));
        }
        if cmd.player.index() >= self.players.len() {
            return Err(SimError::UnknownPlayer(cmd.player));
        }
        Ok(())
    }

    /// A peer promises no commands issued before `through` remain in flight
    pub fn all_commands_sent(
        &mut self,
        peer: PlayerId,
        through: Time,
        checksum: Option<(Time, u64)>,
    ) -> Result<()> {
        self.lockstep.mark_sent(peer, through)?;
        if let Some((time, value)) = checksum {
            self.lockstep.compare(peer, time, value, &self.checksum_trace);
        }
        Ok(())
    }

    /// Acknowledgement this peer should transmit now
    pub fn outgoing_ack(&mut self) -> Option<SyncAck> {
        let player = self.lockstep.local?;
        self.lockstep.mark_local_sent(self.time_sim + 1);
        let checksum = self
            .checksum_trace
            .iter()
            .next_back()
            .map(|(&t, &v)| (t, v));
        Some(SyncAck {
            player,
            through: self.lockstep.local_sent_through,
            checksum,
        })
    }

    /// Apply every event due by `target`, then reconcile time travel
    ///
    /// In a networked game an update event is only applied once every peer
    /// has promised its commands for that instant; until then time is held
    /// just before it.
    pub fn advance(&mut self, target: Time) -> Result<()> {
        let target = target.max(self.time_sim);
        let mut stalled = false;
        while let Some((time, event)) = self.events.peek() {
            if time > target {
                break;
            }
            if matches!(event, SimEvent::Update) && !self.lockstep.ready(time) {
                self.time_sim = self.time_sim.max(time - 1);
                stalled = true;
                break;
            }
            let Some((time, event)) = self.events.pop() else {
                break;
            };
            self.time_sim = self.time_sim.max(time);
            self.checksum.record(event.tag(), time);
            tracing::trace!(time, tag = event.tag(), "apply event");
            self.apply(event, time)?;
        }
        if !stalled {
            self.time_sim = target;
        }
        self.stalled = stalled;

        let now = self.time_sim;
        for player in self.player_ids() {
            self.reconcile(player, now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    const DUEL: &str = r#"
        map_size = 16.0
        update_interval = 100
        visibility_radius = 2.0

        [[players]]
        name = "Red"

        [[players]]
        name = "Blue"

        [[unit_types]]
        name = "scout"
        max_health = 2
        speed = 0.004

        [[paths]]
        player = "Red"
        units = ["scout"]
        pos = [2.0, 2.0]

        [[paths]]
        player = "Blue"
        units = ["scout"]
        pos = [12.0, 12.0]
    "#;

    fn duel_config() -> ScenarioConfig {
        ScenarioConfig::from_toml_str(DUEL).unwrap()
    }

    #[test]
    fn test_advance_reaches_target() {
        let mut sim = Sim::new(&duel_config()).unwrap();
        sim.advance(1_000).unwrap();
        assert_eq!(sim.time_sim, 1_000);
        assert!(!sim.is_stalled());
        assert_eq!(sim.checksum_trace.len(), 11);
    }

    #[test]
    fn test_time_never_rewinds() {
        let mut sim = Sim::new(&duel_config()).unwrap();
        sim.advance(500).unwrap();
        sim.advance(100).unwrap();
        assert_eq!(sim.time_sim, 500);
    }

    #[test]
    fn test_duplicate_submission_ignored() {
        let mut sim = Sim::new(&duel_config()).unwrap();
        let cmd = Command::now(PlayerId(0), 0, CommandKind::GoLive);
        assert!(sim.submit(cmd.clone()).unwrap().is_some());
        assert!(sim.submit(cmd).unwrap().is_none());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut sim = Sim::new(&duel_config()).unwrap();
        let mut cmd = Command::now(PlayerId(0), 0, CommandKind::GoLive);
        cmd.version = 9;
        assert!(matches!(
            sim.submit(cmd),
            Err(SimError::UnsupportedCommandVersion(9))
        ));
    }

    #[test]
    fn test_networked_peer_stalls_without_ack() {
        let mut sim = Sim::networked(&duel_config(), PlayerId(0)).unwrap();
        sim.advance(250).unwrap();
        assert!(sim.is_stalled());
        assert_eq!(sim.time_sim, 99);

        sim.all_commands_sent(PlayerId(1), 300, None).unwrap();
        sim.advance(250).unwrap();
        assert!(!sim.is_stalled());
        assert_eq!(sim.time_sim, 250);
    }
}
