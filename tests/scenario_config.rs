//! Scenario file loading and validation

use decoherence::core::fp;
use decoherence::core::types::PlayerId;
use decoherence::core::{ScenarioConfig, SimError};
use decoherence::sim::Sim;

fn duel_path() -> String {
    format!("{}/scenarios/duel.toml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_bundled_scenario_loads() {
    let config = ScenarioConfig::load(duel_path()).unwrap();
    assert_eq!(config.players.len(), 2);
    assert_eq!(config.paths.len(), 4);

    let scenario = config.build().unwrap();
    assert_eq!(scenario.rules.update_interval, 100);
    assert_eq!(scenario.rules.resource_names, vec!["gold".to_string()]);
    assert_eq!(scenario.unit_types[1].cost, vec![fp::from_int(8)]);
    assert!(scenario.unit_types[0].can_make(scenario.unit_types[1].id));
    assert!(scenario.players[0].can_attack(scenario.players[1].id));
    assert_eq!(scenario.players[1].population_limit, Some(12));
}

#[test]
fn test_bundled_scenario_runs() {
    let config = ScenarioConfig::load(duel_path()).unwrap();
    let mut sim = Sim::new(&config).unwrap();
    sim.advance(2_000).unwrap();
    assert_eq!(sim.time_sim, 2_000);
    let red = sim.player_resource_range(PlayerId(0), 0, 2_000).unwrap();
    assert!(red.is_exact());
    // two workers gathering for two seconds
    assert!(red.min > fp::from_int(23));
    assert!(red.min < fp::from_int(25));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = ScenarioConfig::load("/nonexistent/scenario.toml");
    assert!(matches!(result, Err(SimError::Io(_))));
}

#[test]
fn test_unknown_key_is_parse_error() {
    let text = r#"
        map_size = 8.0
        update_interval = 100
        visibility_radius = 1.0
        fog = true

        [[players]]
        name = "Red"

        [[unit_types]]
        name = "scout"
        max_health = 1
        speed = 0.01
    "#;
    assert!(matches!(
        ScenarioConfig::from_toml_str(text),
        Err(SimError::Toml(_))
    ));
}

#[test]
fn test_inconsistent_scenarios_rejected() {
    let base = |extra: &str| {
        format!(
            r#"
            map_size = 8.0
            update_interval = 100
            visibility_radius = 1.0
            resources = ["gold"]

            [[players]]
            name = "Red"

            [[unit_types]]
            name = "scout"
            max_health = 1
            speed = 0.01

            [[unit_types]]
            name = "tank"
            max_health = 4
            speed = 0.001
            {extra}
            "#
        )
    };

    let cases = [
        "cost = { wood = 1.0 }",
        "can_make = [\"plane\"]",
        "[[paths]]\nplayer = \"Red\"\nunits = [\"scout\", \"tank\"]\npos = [1.0, 1.0]",
        "[[paths]]\nplayer = \"Blue\"\nunits = [\"scout\"]\npos = [1.0, 1.0]",
        "[[paths]]\nplayer = \"Red\"\nunits = [\"scout\"]\npos = [9.0, 1.0]",
    ];
    for extra in cases {
        let result = ScenarioConfig::from_toml_str(&base(extra));
        assert!(
            matches!(result, Err(SimError::Config(_))),
            "accepted scenario with {}",
            extra
        );
    }
}
