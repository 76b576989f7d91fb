//! Fog of war integration tests

use decoherence::command::{select, Command, CommandKind};
use decoherence::core::fp::FpVector;
use decoherence::core::types::{PathId, PlayerId, TilePos};
use decoherence::core::ScenarioConfig;
use decoherence::sim::Sim;
use decoherence::timeline::Formation;

const FACE_OFF: &str = r#"
    map_size = 24.0
    update_interval = 100
    visibility_radius = 2.0

    [[players]]
    name = "Red"

    [[players]]
    name = "Blue"

    [[unit_types]]
    name = "scout"
    max_health = 1
    speed = 0.004

    [[paths]]
    player = "Red"
    units = ["scout"]
    pos = [2.5, 2.5]

    [[paths]]
    player = "Blue"
    units = ["scout"]
    pos = [4.5, 2.5]
"#;

const RED: PlayerId = PlayerId(0);
const BLUE: PlayerId = PlayerId(1);

fn face_off() -> Sim {
    Sim::new(&ScenarioConfig::from_toml_str(FACE_OFF).unwrap()).unwrap()
}

fn order_move(sim: &mut Sim, player: PlayerId, path: u32, x: f64, y: f64) {
    let time = sim.time_sim;
    let cmd = Command::now(
        player,
        time,
        CommandKind::Move {
            paths: select([(PathId(path), vec![])]),
            pos: FpVector::from_f64(x, y),
            formation: Formation::Tight,
        },
    );
    sim.submit(cmd).unwrap();
}

/// Check the ordering between the three kinds of visibility on every tile
fn assert_layered(sim: &Sim, time: i64) {
    let len = sim.tiles.len();
    for x in 0..len {
        for y in 0..len {
            let tile = TilePos::new(x, y);
            let red = sim.tile_visibility(RED, tile, time).unwrap();
            let blue = sim.tile_visibility(BLUE, tile, time).unwrap();
            for vis in [red, blue] {
                assert!(!vis.direct || vis.general, "direct without general at {} t={}", tile, time);
                assert!(!vis.exclusive || vis.general, "exclusive without general at {} t={}", tile, time);
            }
            assert!(!(red.exclusive && blue.general), "red exclusive at {} t={}", tile, time);
            assert!(!(blue.exclusive && red.general), "blue exclusive at {} t={}", tile, time);
        }
    }
}

#[test]
fn test_units_in_sight_of_each_other_are_not_exclusive() {
    let mut sim = face_off();
    sim.advance(100).unwrap();

    let red_tile = TilePos::new(2, 2);
    let red = sim.tile_visibility(RED, red_tile, 100).unwrap();
    let blue = sim.tile_visibility(BLUE, red_tile, 100).unwrap();
    assert!(red.direct && red.general);
    assert!(blue.direct);
    assert!(!red.exclusive);

    // out of both units' range
    let far = sim.tile_visibility(RED, TilePos::new(20, 20), 100).unwrap();
    assert!(!far.direct && !far.general && !far.exclusive);
}

#[test]
fn test_off_map_tiles_have_no_visibility() {
    let sim = face_off();
    assert!(sim.tile_visibility(RED, TilePos::new(-1, 0), 0).is_none());
    assert!(sim.tile_visibility(RED, TilePos::new(0, 400), 0).is_none());
    assert!(sim.tile_visibility(PlayerId(7), TilePos::new(0, 0), 0).is_none());
}

#[test]
fn test_visibility_layers_hold_while_units_move() {
    let mut sim = face_off();
    sim.advance(100).unwrap();
    order_move(&mut sim, RED, 0, 12.0, 12.0);
    order_move(&mut sim, BLUE, 1, 20.0, 3.0);

    let mut time = 100;
    while time <= 6_000 {
        sim.advance(time).unwrap();
        assert_layered(&sim, time);
        time += 250;
    }
    // history stays queryable after the fact
    assert_layered(&sim, 1_234);
}

#[test]
fn test_general_visibility_fades_after_leaving() {
    let mut sim = face_off();
    sim.advance(100).unwrap();
    order_move(&mut sim, RED, 0, 20.0, 20.0);
    sim.advance(10_000).unwrap();

    let start = TilePos::new(2, 2);
    let early = sim.tile_visibility(RED, start, 100).unwrap();
    assert!(early.direct && early.general);
    let late = sim.tile_visibility(RED, start, 10_000).unwrap();
    assert!(!late.direct);
    assert!(!late.general);
    assert!(!late.exclusive);

    let arrived = sim.tile_visibility(RED, TilePos::new(20, 20), 10_000).unwrap();
    assert!(arrived.direct && arrived.general && arrived.exclusive);
}
