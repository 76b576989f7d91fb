//! Decoherence - headless runner
//!
//! Loads a scenario, replays an optional command log and prints a JSON
//! summary of the resulting state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use decoherence::command::Command;
use decoherence::core::error::Result;
use decoherence::core::fp;
use decoherence::core::types::Time;
use decoherence::core::ScenarioConfig;
use decoherence::player::PlayerStatus;
use decoherence::sim::Sim;

#[derive(Parser, Debug)]
#[command(name = "decoherence")]
#[command(about = "Run a scenario headless and print a JSON summary")]
struct Args {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Command log: a JSON array of commands
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Simulation time to advance to, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    until: Time,

    /// Advance in steps of this many milliseconds
    #[arg(long, default_value_t = 100)]
    step: Time,
}

#[derive(Serialize)]
struct Summary {
    time: Time,
    synced: bool,
    /// Events already scheduled past the final time
    pending_events: usize,
    checksums: BTreeMap<Time, u64>,
    players: Vec<PlayerSummary>,
}

#[derive(Serialize)]
struct PlayerSummary {
    name: String,
    resources: BTreeMap<String, (f64, f64)>,
    status: PlayerStatus,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decoherence=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ScenarioConfig::load(&args.scenario)?;
    let mut sim = Sim::new(&config)?;

    let mut commands: Vec<Command> = match &args.commands {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    commands.sort_by_key(|c| c.time);
    tracing::info!(commands = commands.len(), until = args.until, "replaying");

    let step = args.step.max(1);
    let mut pending = commands.into_iter().peekable();
    let mut time = 0;
    while time <= args.until {
        while let Some(cmd) = pending.next_if(|c| c.time <= time) {
            sim.submit(cmd)?;
        }
        sim.advance(time)?;
        time += step;
    }

    let summary = Summary {
        time: sim.time_sim,
        synced: sim.is_synced(),
        pending_events: sim.events.len(),
        checksums: sim.checksum_trace.clone(),
        players: sim
            .player_ids()
            .map(|id| {
                let player = &sim.players[id.index()];
                let resources = sim
                    .rules
                    .resource_names
                    .iter()
                    .enumerate()
                    .map(|(rsc, name)| {
                        let range = sim.resource_range(id, sim.time_sim, rsc);
                        (name.clone(), (fp::to_f64(range.min), fp::to_f64(range.max)))
                    })
                    .collect();
                PlayerSummary {
                    name: player.name.clone(),
                    resources,
                    status: player.status(),
                }
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
