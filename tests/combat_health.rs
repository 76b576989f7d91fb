//! Attacks and health loss through the event loop

use decoherence::core::types::{PathId, PlayerId, UnitId};
use decoherence::core::{ScenarioConfig, SimError};
use decoherence::sim::Sim;

const SIEGE: &str = r#"
    map_size = 16.0
    update_interval = 100
    visibility_radius = 3.0

    [[players]]
    name = "Red"
    can_attack = ["Blue"]

    [[players]]
    name = "Blue"

    [[unit_types]]
    name = "archer"
    max_health = 2
    speed = 0.002
    reload = 100
    range = 2.0
    damage = { wall = 1 }

    [[unit_types]]
    name = "wall"
    max_health = 3
    speed = 0.0

    [[paths]]
    player = "Red"
    units = ["archer"]
    pos = [4.5, 4.5]

    [[paths]]
    player = "Blue"
    units = ["wall"]
    pos = [5.5, 4.5]
"#;

const ARCHER: UnitId = UnitId(0);
const WALL: UnitId = UnitId(1);

fn siege() -> Sim {
    Sim::new(&ScenarioConfig::from_toml_str(SIEGE).unwrap()).unwrap()
}

#[test]
fn test_health_steps_down_then_unit_leaves_path() {
    let mut sim = siege();
    sim.advance(1_000).unwrap();

    // hits land one millisecond after the update that fired them
    assert_eq!(sim.unit_health_at(WALL, 0).unwrap(), 3);
    assert_eq!(sim.unit_health_at(WALL, 1).unwrap(), 2);
    assert_eq!(sim.unit_health_at(WALL, 100).unwrap(), 2);
    assert_eq!(sim.unit_health_at(WALL, 101).unwrap(), 1);
    assert_eq!(sim.unit_health_at(WALL, 200).unwrap(), 1);
    assert_eq!(sim.unit_health_at(WALL, 201).unwrap(), 0);
    assert_eq!(sim.unit_health_at(WALL, 1_000).unwrap(), 0);

    assert_eq!(sim.path_units_at(PathId(1), 200).unwrap(), vec![WALL]);
    assert!(sim.path_units_at(PathId(1), 201).unwrap().is_empty());
}

#[test]
fn test_targets_limited_by_attack_permissions() {
    let mut sim = siege();
    sim.advance(1_000).unwrap();
    assert_eq!(sim.unit_health_at(ARCHER, 1_000).unwrap(), 2);
}

#[test]
fn test_unknown_unit_reported() {
    let sim = siege();
    assert!(matches!(
        sim.unit_health_at(UnitId(42), 0),
        Err(SimError::UnknownUnit(UnitId(42)))
    ));
    assert!(matches!(
        sim.player_status(PlayerId(3)),
        Err(SimError::UnknownPlayer(PlayerId(3)))
    ));
}

/// Two walls and a banner share one path; arrows only hurt walls
const RAMPART: &str = r#"
    map_size = 16.0
    update_interval = 100
    visibility_radius = 3.0

    [[players]]
    name = "Red"
    can_attack = ["Blue"]

    [[players]]
    name = "Blue"

    [[unit_types]]
    name = "archer"
    max_health = 2
    speed = 0.002
    reload = 100
    range = 2.0
    damage = { wall = 1 }

    [[unit_types]]
    name = "wall"
    max_health = 2
    speed = 0.0

    [[unit_types]]
    name = "banner"
    max_health = 1
    speed = 0.0

    [[paths]]
    player = "Red"
    units = ["archer"]
    pos = [4.5, 4.5]

    [[paths]]
    player = "Blue"
    units = ["wall", "wall", "banner"]
    pos = [5.5, 4.5]
"#;

#[test]
fn test_attack_hits_every_damageable_unit_on_target_path() {
    let mut sim = Sim::new(&ScenarioConfig::from_toml_str(RAMPART).unwrap()).unwrap();
    sim.advance(1_000).unwrap();
    let (first_wall, second_wall, banner) = (UnitId(1), UnitId(2), UnitId(3));

    for wall in [first_wall, second_wall] {
        assert_eq!(sim.unit_health_at(wall, 0).unwrap(), 2);
        assert_eq!(sim.unit_health_at(wall, 1).unwrap(), 1);
        assert_eq!(sim.unit_health_at(wall, 101).unwrap(), 0);
    }
    assert_eq!(sim.unit_health_at(banner, 1_000).unwrap(), 1);
    assert_eq!(sim.path_units_at(PathId(1), 1_000).unwrap(), vec![banner]);
    // nothing left worth shooting at
    assert_eq!(sim.units[ARCHER.index()].time_attack, Some(100));
}
