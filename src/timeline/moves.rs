use serde::{Deserialize, Serialize};

use crate::core::fp::{self, FpVector};
use crate::core::types::Time;

/// Linear motion between two positions over a time interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub time_start: Time,
    pub time_end: Time,
    pub start: FpVector,
    pub end: FpVector,
}

impl Move {
    /// Standing still at `pos` from `time` on
    pub fn stationary(time: Time, pos: FpVector) -> Self {
        Self {
            time_start: time,
            time_end: time + 1,
            start: pos,
            end: pos,
        }
    }

    /// Move from `start` to `end` at `speed` raw units per millisecond
    pub fn from_speed(time: Time, speed: i64, start: FpVector, end: FpVector) -> Self {
        if speed <= 0 || start == end {
            return Self::stationary(time, start);
        }
        let duration = ((end - start).length() / speed).max(1);
        Self {
            time_start: time,
            time_end: time + duration,
            start,
            end,
        }
    }

    pub fn pos_at(&self, time: Time) -> FpVector {
        if time >= self.time_end {
            return self.end;
        }
        if time <= self.time_start {
            return self.start;
        }
        FpVector::new(
            fp::line_calc(self.time_start, self.start.x, self.time_end, self.end.x, time),
            fp::line_calc(self.time_start, self.start.y, self.time_end, self.end.y, time),
        )
    }

    /// Time at which the move reaches x coordinate `x`
    pub fn time_at_x(&self, x: i64) -> Time {
        fp::line_calc(self.start.x, self.time_start, self.end.x, self.time_end, x)
    }

    /// Time at which the move reaches y coordinate `y`
    pub fn time_at_y(&self, y: i64) -> Time {
        fp::line_calc(self.start.y, self.time_start, self.end.y, self.time_end, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fp::from_int;

    #[test]
    fn test_from_speed_duration() {
        let start = FpVector::new(0, 0);
        let end = FpVector::new(from_int(10), 0);
        let m = Move::from_speed(1000, from_int(1) / 100, start, end);
        assert_eq!(m.time_end, 2000);
        assert_eq!(m.pos_at(1500), FpVector::new(from_int(5), 0));
        assert_eq!(m.pos_at(5000), end);
        assert_eq!(m.time_at_x(from_int(3)), 1300);
    }

    #[test]
    fn test_zero_speed_is_stationary() {
        let pos = FpVector::new(from_int(2), from_int(2));
        let m = Move::from_speed(10, 0, pos, FpVector::new(0, 0));
        assert_eq!(m.pos_at(1_000_000), pos);
    }
}
