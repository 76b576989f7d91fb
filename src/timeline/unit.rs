//! Unit identity and health history
//!
//! Units never store where they are; membership in path segments does that.

use serde::{Deserialize, Serialize};

use crate::core::types::{PlayerId, Time, UnitId, UnitTypeId};

/// Static description of one kind of unit, in fixed point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    pub max_health: u32,
    /// Raw position units per millisecond
    pub speed: i64,
    pub reload: Time,
    pub range: i64,
    pub tight_spacing: i64,
    /// Health removed per attack, indexed by target unit type
    pub damage: Vec<u32>,
    pub cost: Vec<i64>,
    pub collect_rate: Vec<i64>,
    pub can_make: Vec<bool>,
}

impl UnitType {
    pub fn can_make(&self, other: UnitTypeId) -> bool {
        self.can_make.get(other.index()).copied().unwrap_or(false)
    }

    pub fn damage_to(&self, other: UnitTypeId) -> u32 {
        self.damage.get(other.index()).copied().unwrap_or(0)
    }

    /// Whether this type deals damage to anything
    pub fn is_armed(&self) -> bool {
        self.range > 0 && self.damage.iter().any(|&d| d > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub type_id: UnitTypeId,
    pub player: PlayerId,
    max_health: u32,
    /// Times at which successive health increments were removed
    health_times: Vec<Time>,
    /// Latest time this unit attacked
    pub time_attack: Option<Time>,
}

impl Unit {
    pub fn new(id: UnitId, unit_type: &UnitType, player: PlayerId) -> Self {
        Self {
            id,
            type_id: unit_type.id,
            player,
            max_health: unit_type.max_health,
            health_times: Vec::with_capacity(unit_type.max_health as usize),
            time_attack: None,
        }
    }

    /// Remove one health increment at `time`; returns true if this killed the unit
    pub fn take_health(&mut self, time: Time) -> bool {
        if self.health_times.len() as u32 >= self.max_health {
            return false;
        }
        debug_assert!(self.health_times.last().map_or(true, |&t| t <= time));
        self.health_times.push(time);
        self.health_times.len() as u32 == self.max_health
    }

    pub fn health_latest(&self) -> u32 {
        self.max_health - self.health_times.len() as u32
    }

    pub fn health_when(&self, time: Time) -> u32 {
        let taken = self.health_times.partition_point(|&t| t <= time);
        self.max_health - taken as u32
    }

    /// Time the last health increment was removed, if the unit is dead
    pub fn death_time(&self) -> Option<Time> {
        if self.health_latest() == 0 {
            self.health_times.last().copied()
        } else {
            None
        }
    }

    pub fn can_attack_at(&self, time: Time, reload: Time) -> bool {
        self.time_attack.map_or(true, |last| time >= last + reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soldier() -> UnitType {
        UnitType {
            id: UnitTypeId(0),
            name: "soldier".into(),
            max_health: 3,
            speed: 10,
            reload: 100,
            range: 1 << 16,
            tight_spacing: 0,
            damage: vec![1],
            cost: vec![],
            collect_rate: vec![],
            can_make: vec![false],
        }
    }

    #[test]
    fn test_health_steps_down() {
        let mut unit = Unit::new(UnitId(0), &soldier(), PlayerId(0));
        assert!(!unit.take_health(100));
        assert!(!unit.take_health(200));
        assert!(unit.take_health(300));
        assert_eq!(unit.health_when(50), 3);
        assert_eq!(unit.health_when(100), 2);
        assert_eq!(unit.health_when(250), 1);
        assert_eq!(unit.health_when(300), 0);
        assert_eq!(unit.health_when(10_000), 0);
        assert_eq!(unit.death_time(), Some(300));
    }

    #[test]
    fn test_health_never_negative() {
        let mut unit = Unit::new(UnitId(0), &soldier(), PlayerId(0));
        for t in 1..=5 {
            unit.take_health(t);
        }
        assert_eq!(unit.health_latest(), 0);
        assert_eq!(unit.death_time(), Some(3));
    }

    #[test]
    fn test_reload() {
        let mut unit = Unit::new(UnitId(0), &soldier(), PlayerId(0));
        assert!(unit.can_attack_at(0, 100));
        unit.time_attack = Some(0);
        assert!(!unit.can_attack_at(99, 100));
        assert!(unit.can_attack_at(100, 100));
    }
}
