//! Lockstep barrier between peers
//!
//! Every command is held in its issuer's inbox until the update event after
//! its issue time, and that update only runs once every remote peer has
//! promised (via [`SyncAck`]) that nothing older is still in flight. A
//! command meant for the moment it was issued then acts at that update, so
//! peers apply it as a live edit rather than an edit of the past.

use std::collections::BTreeMap;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::core::error::{Rejection, Result, SimError};
use crate::core::types::{PlayerId, Time};

/// "All my commands issued before `through` have been sent"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub player: PlayerId,
    pub through: Time,
    /// Sender's checksum snapshot at one of its update events
    pub checksum: Option<(Time, u64)>,
}

#[derive(Debug, Clone)]
pub struct PeerSync {
    pub player: PlayerId,
    /// Commands not yet folded into the event queue, in arrival order
    pub inbox: Vec<Command>,
    pub time_sync: Time,
    /// Reported snapshots for updates this peer has not reached yet
    pending_checksums: BTreeMap<Time, u64>,
}

impl PeerSync {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            inbox: Vec::new(),
            time_sync: 0,
            pending_checksums: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lockstep {
    /// `None` in a solo game
    pub local: Option<PlayerId>,
    pub peers: Vec<PeerSync>,
    /// Cleared for good on the first checksum mismatch
    pub synced: bool,
    /// Local commands are never stamped earlier than this
    pub local_sent_through: Time,
    /// Fingerprints of accepted commands, by issue time
    seen: BTreeMap<Time, AHashSet<String>>,
}

impl Lockstep {
    pub fn solo() -> Self {
        Self {
            local: None,
            peers: Vec::new(),
            synced: true,
            local_sent_through: 0,
            seen: BTreeMap::new(),
        }
    }

    pub fn networked(local: PlayerId, mut peers: Vec<PlayerId>) -> Self {
        if !peers.contains(&local) {
            peers.push(local);
        }
        peers.sort();
        Self {
            local: Some(local),
            peers: peers.into_iter().map(PeerSync::new).collect(),
            ..Self::solo()
        }
    }

    pub fn is_solo(&self) -> bool {
        self.local.is_none()
    }

    /// Record a command, returning false if an identical one was seen before
    pub fn first_sight(&mut self, cmd: &Command) -> bool {
        self.seen
            .entry(cmd.time)
            .or_default()
            .insert(cmd.fingerprint())
    }

    /// Number of fingerprints still remembered
    pub fn seen_len(&self) -> usize {
        self.seen.values().map(|s| s.len()).sum()
    }

    /// Forget fingerprints of commands no peer can still send
    fn prune_seen(&mut self) {
        if self.is_solo() {
            return;
        }
        let floor = self
            .peers
            .iter()
            .filter(|p| Some(p.player) != self.local)
            .map(|p| p.time_sync)
            .min()
            .unwrap_or(Time::MAX)
            .min(self.local_sent_through);
        self.seen = self.seen.split_off(&floor);
    }

    fn peer_mut(&mut self, player: PlayerId) -> Result<&mut PeerSync> {
        self.peers
            .iter_mut()
            .find(|p| p.player == player)
            .ok_or(SimError::UnknownPlayer(player))
    }

    pub(crate) fn enqueue(&mut self, cmd: Command) -> Result<()> {
        let remote = self.local != Some(cmd.player);
        let peer = self.peer_mut(cmd.player)?;
        if remote && cmd.time < peer.time_sync {
            return Err(Rejection::LateCommand(cmd.time).into());
        }
        peer.inbox.push(cmd);
        Ok(())
    }

    pub(crate) fn mark_sent(&mut self, player: PlayerId, through: Time) -> Result<()> {
        let peer = self.peer_mut(player)?;
        peer.time_sync = peer.time_sync.max(through);
        self.prune_seen();
        Ok(())
    }

    pub(crate) fn mark_local_sent(&mut self, through: Time) {
        self.local_sent_through = self.local_sent_through.max(through);
        self.prune_seen();
    }

    /// Whether every remote peer has sent all commands issued before `time`
    pub fn ready(&self, time: Time) -> bool {
        self.peers
            .iter()
            .filter(|p| Some(p.player) != self.local)
            .all(|p| p.time_sync >= time)
    }

    /// Remove the commands issued before `time`, in peer then arrival order
    ///
    /// Commands that act at (or after) their issue time are restamped to act
    /// at `time`.
    pub(crate) fn take_due(&mut self, time: Time) -> Vec<Command> {
        let mut due = Vec::new();
        for peer in &mut self.peers {
            let (ready, waiting): (Vec<_>, Vec<_>) =
                peer.inbox.drain(..).partition(|cmd| cmd.time < time);
            peer.inbox = waiting;
            due.extend(ready);
        }
        for cmd in &mut due {
            if cmd.time_cmd >= cmd.time {
                cmd.time_cmd = time;
            }
        }
        due
    }

    /// Compare a peer's reported snapshot with ours, deferring the check if
    /// we have not reached that update yet
    pub(crate) fn compare(
        &mut self,
        player: PlayerId,
        time: Time,
        value: u64,
        trace: &BTreeMap<Time, u64>,
    ) {
        match trace.get(&time) {
            Some(&local) => self.check(player, time, local, value),
            None => {
                if let Some(peer) = self.peers.iter_mut().find(|p| p.player == player) {
                    peer.pending_checksums.insert(time, value);
                }
            }
        }
    }

    /// Settle deferred comparisons for the update at `time`
    pub(crate) fn verify(&mut self, time: Time, local: u64) {
        let reported: Vec<(PlayerId, u64)> = self
            .peers
            .iter_mut()
            .filter_map(|p| p.pending_checksums.remove(&time).map(|v| (p.player, v)))
            .collect();
        for (player, value) in reported {
            self.check(player, time, local, value);
        }
    }

    fn check(&mut self, player: PlayerId, time: Time, local: u64, remote: u64) {
        if local != remote && self.synced {
            self.synced = false;
            tracing::error!(peer = %player, time, local, remote, "desync detected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn test_barrier_waits_for_remote_peers_only() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(0), PlayerId(1)]);
        assert!(lockstep.ready(0));
        assert!(!lockstep.ready(100));
        lockstep.mark_sent(PlayerId(1), 100).unwrap();
        assert!(lockstep.ready(100));
    }

    #[test]
    fn test_take_due_keeps_later_commands() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(1)]);
        lockstep
            .enqueue(Command::now(PlayerId(1), 50, CommandKind::GoLive))
            .unwrap();
        lockstep
            .enqueue(Command::now(PlayerId(0), 150, CommandKind::GoLive))
            .unwrap();
        lockstep
            .enqueue(Command::now(PlayerId(0), 20, CommandKind::GoLive))
            .unwrap();
        let due = lockstep.take_due(100);
        let players: Vec<_> = due.iter().map(|c| c.player).collect();
        assert_eq!(players, vec![PlayerId(0), PlayerId(1)]);
        assert_eq!(lockstep.take_due(200).len(), 1);
    }

    #[test]
    fn test_take_due_restamps_present_commands() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(1)]);
        lockstep
            .enqueue(Command::now(PlayerId(1), 150, CommandKind::GoLive))
            .unwrap();
        lockstep
            .enqueue(Command::at(PlayerId(1), 160, 40, CommandKind::GoLive))
            .unwrap();
        let due = lockstep.take_due(200);
        let acts_at: Vec<_> = due.iter().map(|c| c.time_cmd).collect();
        assert_eq!(acts_at, vec![200, 40]);
        assert_eq!(due[0].time, 150);
    }

    #[test]
    fn test_fingerprints_dropped_below_sync_floor() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(1)]);
        let old = Command::now(PlayerId(1), 50, CommandKind::GoLive);
        let recent = Command::now(PlayerId(1), 250, CommandKind::GoLive);
        assert!(lockstep.first_sight(&old));
        assert!(lockstep.first_sight(&recent));
        assert!(!lockstep.first_sight(&old));
        assert_eq!(lockstep.seen_len(), 2);

        // the local peer has not promised anything yet
        lockstep.mark_sent(PlayerId(1), 300).unwrap();
        assert_eq!(lockstep.seen_len(), 2);

        lockstep.mark_local_sent(200);
        assert_eq!(lockstep.seen_len(), 1);
        assert!(!lockstep.first_sight(&recent));
    }

    #[test]
    fn test_late_remote_command_rejected() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(1)]);
        lockstep.mark_sent(PlayerId(1), 200).unwrap();
        let late = Command::now(PlayerId(1), 150, CommandKind::GoLive);
        assert!(matches!(
            lockstep.enqueue(late),
            Err(SimError::Rejected(Rejection::LateCommand(150)))
        ));
    }

    #[test]
    fn test_mismatch_clears_synced_for_good() {
        let mut lockstep = Lockstep::networked(PlayerId(0), vec![PlayerId(1)]);
        let mut trace = BTreeMap::new();
        trace.insert(100, 7);
        lockstep.compare(PlayerId(1), 100, 7, &trace);
        assert!(lockstep.synced);
        lockstep.compare(PlayerId(1), 200, 9, &trace);
        lockstep.verify(200, 8);
        assert!(!lockstep.synced);
        lockstep.compare(PlayerId(1), 100, 7, &trace);
        assert!(!lockstep.synced);
    }
}
