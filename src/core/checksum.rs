//! Rolling state checksum
//!
//! Every applied event folds its kind and time into an FNV-1a state. Peers
//! compare snapshots of this value to detect desynchronization.

use serde::{Deserialize, Serialize};

use crate::core::types::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    state: u64,
}

impl Checksum {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }

    pub fn value(&self) -> u64 {
        self.state
    }

    /// Fold one applied event into the checksum
    pub fn record(&mut self, tag: u8, time: Time) {
        self.write(&[tag]);
        self.write(&time.to_le_bytes());
    }

    /// Fold an arbitrary value, used for event payloads that matter to sync
    pub fn record_value(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}
