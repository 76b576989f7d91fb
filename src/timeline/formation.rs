//! Formation layout
//!
//! Pure geometry: given a goal point and a number of members, produce one
//! goal per member in the order the members were given.

use serde::{Deserialize, Serialize};

use crate::core::fp::{self, FpVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formation {
    /// Square grid at each type's tight spacing
    #[default]
    Tight,
    /// Square grid spaced so sight ranges just overlap
    Loose,
    /// Evenly spaced on a circle
    Ring,
}

/// Goals for `count` members laid out around `goal`, clamped to the map
pub fn layout(
    formation: Formation,
    goal: FpVector,
    count: usize,
    spacing: i64,
    map_size: i64,
) -> Vec<FpVector> {
    if count == 0 {
        return Vec::new();
    }
    match formation {
        Formation::Tight | Formation::Loose => grid(goal, count, spacing, map_size),
        Formation::Ring => ring(goal, count, spacing, map_size),
    }
}

fn grid(goal: FpVector, count: usize, spacing: i64, map_size: i64) -> Vec<FpVector> {
    let cols = fp::ceil_sqrt(count as i64).max(1);
    let rows = (count as i64 + cols - 1) / cols;
    let offset = FpVector::new((cols - 1) * spacing / 2, (rows - 1) * spacing / 2);
    let center = FpVector::new(
        clamp_center(goal.x, offset.x, map_size),
        clamp_center(goal.y, offset.y, map_size),
    );
    (0..count as i64)
        .map(|i| {
            let cell = FpVector::new((i % cols) * spacing, (i / cols) * spacing);
            (center - offset + cell).clamp_to(map_size)
        })
        .collect()
}

fn ring(goal: FpVector, count: usize, spacing: i64, map_size: i64) -> Vec<FpVector> {
    if count == 1 {
        return vec![goal.clamp_to(map_size)];
    }
    let n = count as i64;
    // chord between neighbours equals spacing: r = (spacing / 2) / sin(pi / n)
    let (_, half_sin) = fp::cos_sin_turn(1, 2 * n);
    let radius = if half_sin > 0 {
        fp::div(spacing / 2, half_sin)
    } else {
        spacing
    };
    let center = FpVector::new(
        clamp_center(goal.x, radius, map_size),
        clamp_center(goal.y, radius, map_size),
    );
    (0..n)
        .map(|i| {
            let (cos, sin) = fp::cos_sin_turn(i, n);
            let offset = FpVector::new(fp::mul(radius, cos), fp::mul(radius, sin));
            (center + offset).clamp_to(map_size)
        })
        .collect()
}

/// Keep a formation of half-extent `extent` on the map when possible
fn clamp_center(v: i64, extent: i64, map_size: i64) -> i64 {
    let margin = extent.min(map_size / 2);
    v.clamp(margin, map_size - margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fp::{from_int, ONE};

    const MAP: i64 = 64 << 16;

    #[test]
    fn test_single_member_goes_to_goal() {
        let goal = FpVector::new(from_int(10), from_int(10));
        for formation in [Formation::Tight, Formation::Loose, Formation::Ring] {
            assert_eq!(layout(formation, goal, 1, ONE, MAP), vec![goal]);
        }
    }

    #[test]
    fn test_grid_is_centred() {
        let goal = FpVector::new(from_int(10), from_int(10));
        let goals = layout(Formation::Tight, goal, 4, ONE, MAP);
        assert_eq!(goals.len(), 4);
        assert_eq!(goals[0], FpVector::new(from_int(10) - ONE / 2, from_int(10) - ONE / 2));
        assert_eq!(goals[3], FpVector::new(from_int(10) + ONE / 2, from_int(10) + ONE / 2));
    }

    #[test]
    fn test_grid_stays_on_map() {
        let goals = layout(Formation::Loose, FpVector::ZERO, 9, from_int(2), MAP);
        assert!(goals.iter().all(|g| g.x >= 0 && g.y >= 0));
        assert_eq!(goals[0], FpVector::ZERO);
    }

    #[test]
    fn test_ring_members_are_spaced() {
        let goal = FpVector::new(from_int(20), from_int(20));
        let goals = layout(Formation::Ring, goal, 6, from_int(2), MAP);
        // hexagon: radius equals side length
        let side = (goals[1] - goals[0]).length();
        assert!((side - from_int(2)).abs() < 64, "side {}", side);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let goal = FpVector::new(from_int(30), from_int(5));
        let a = layout(Formation::Ring, goal, 7, ONE, MAP);
        let b = layout(Formation::Ring, goal, 7, ONE, MAP);
        assert_eq!(a, b);
    }
}
