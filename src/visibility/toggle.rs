use serde::{Deserialize, Serialize};

use crate::core::types::Time;

/// Monotonic log of boolean flips, starting from false
///
/// Timestamps are strictly increasing. Toggling twice at the same instant
/// cancels out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleLog(Vec<Time>);

impl ToggleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, time: Time) {
        match self.0.last() {
            Some(&last) if last == time => {
                self.0.pop();
            }
            last => {
                debug_assert!(last.map_or(true, |&l| l < time), "toggle went back in time");
                self.0.push(time);
            }
        }
    }

    /// Set the value from `time` on, toggling only if it changes
    pub fn set(&mut self, value: bool, time: Time) {
        if self.latest() != value {
            self.toggle(time);
        }
    }

    pub fn when(&self, time: Time) -> bool {
        self.0.partition_point(|&t| t <= time) % 2 == 1
    }

    pub fn latest(&self) -> bool {
        self.0.len() % 2 == 1
    }

    /// Index of the latest toggle at or before `time`
    pub fn index_when(&self, time: Time) -> Option<usize> {
        self.0.partition_point(|&t| t <= time).checked_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<Time> {
        self.0.get(index).copied()
    }

    pub fn last_toggle(&self) -> Option<Time> {
        self.0.last().copied()
    }

    /// Time the current run of `true` started, if on at `time`
    pub fn on_since(&self, time: Time) -> Option<Time> {
        if !self.when(time) {
            return None;
        }
        self.index_when(time).and_then(|i| self.get(i))
    }

    /// First toggle strictly after `time`
    pub fn next_toggle_after(&self, time: Time) -> Option<Time> {
        self.get(self.0.partition_point(|&t| t <= time))
    }

    pub fn times(&self) -> &[Time] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odd_count_is_true() {
        let mut log = ToggleLog::new();
        log.toggle(10);
        log.toggle(20);
        log.toggle(30);
        assert!(!log.when(9));
        assert!(log.when(10));
        assert!(log.when(19));
        assert!(!log.when(20));
        assert!(log.when(1_000));
        assert!(log.latest());
        assert_eq!(log.on_since(35), Some(30));
        assert_eq!(log.next_toggle_after(10), Some(20));
    }

    #[test]
    fn test_same_time_toggle_cancels() {
        let mut log = ToggleLog::new();
        log.toggle(5);
        log.toggle(5);
        assert_eq!(log.times(), &[] as &[Time]);
        assert!(!log.when(5));
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut log = ToggleLog::new();
        log.set(true, 1);
        log.set(true, 2);
        assert_eq!(log.times(), &[1]);
        log.set(false, 3);
        assert_eq!(log.times(), &[1, 3]);
    }
}
