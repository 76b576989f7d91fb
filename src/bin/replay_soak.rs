//! Replay soak test
//!
//! Generates random command streams from a seed, replays each one through
//! several independent simulations in parallel, and checks every replica
//! ends with the same checksum trace.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use decoherence::command::{select, Command, CommandKind};
use decoherence::core::error::Result;
use decoherence::core::fp::FpVector;
use decoherence::core::types::{PathId, PlayerId, Time, UnitTypeId};
use decoherence::core::ScenarioConfig;
use decoherence::sim::Sim;
use decoherence::timeline::Formation;

/// Milliseconds between checks for newly due commands
const STEP: Time = 50;

#[derive(Parser, Debug)]
#[command(name = "replay_soak")]
#[command(about = "Replay random command streams and compare checksum traces")]
struct Args {
    /// Scenario file (TOML)
    scenario: PathBuf,

    /// Number of random streams
    #[arg(long, default_value_t = 8)]
    streams: u64,

    /// Independent replays per stream
    #[arg(long, default_value_t = 4)]
    replicas: usize,

    /// Commands per stream
    #[arg(long, default_value_t = 200)]
    commands: usize,

    /// Simulated milliseconds per stream
    #[arg(long, default_value_t = 20_000)]
    until: Time,

    #[arg(long, default_value_t = 7)]
    seed: u64,
}

#[derive(Serialize)]
struct StreamReport {
    seed: u64,
    commands: usize,
    replicas_agree: bool,
    final_checksum: Option<u64>,
}

fn random_stream(config: &ScenarioConfig, seed: u64, count: usize, until: Time) -> Vec<Command> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n_players = config.players.len() as u32;
    let n_types = config.unit_types.len() as u32;
    let map = config.map_size;
    let mut commands: Vec<Command> = (0..count)
        .map(|_| {
            let player = PlayerId(rng.gen_range(0..n_players));
            let time = rng.gen_range(0..until.max(1));
            let time_cmd = if rng.gen_bool(0.2) {
                (time - rng.gen_range(0..2_000)).max(0)
            } else {
                time
            };
            // path ids beyond the current count are filtered out on resolve
            let paths = select([(PathId(rng.gen_range(0..16)), vec![])]);
            let kind = match rng.gen_range(0..6) {
                0 | 1 => CommandKind::Move {
                    paths,
                    pos: FpVector::from_f64(rng.gen_range(0.0..map), rng.gen_range(0.0..map)),
                    formation: Formation::Tight,
                },
                2 => CommandKind::MakeUnit {
                    paths,
                    unit_type: UnitTypeId(rng.gen_range(0..n_types.max(1))),
                    pos: None,
                },
                3 => CommandKind::MakePath { paths, pos: None },
                4 => CommandKind::DeleteOtherPaths { paths },
                _ => CommandKind::GoLive,
            };
            Command::at(player, time, time_cmd, kind)
        })
        .collect();
    commands.sort_by_key(|c| c.time);
    commands
}

fn replay(config: &ScenarioConfig, commands: &[Command], until: Time) -> Result<BTreeMap<Time, u64>> {
    let mut sim = Sim::new(config)?;
    let mut next = 0;
    let mut time = 0;
    while time <= until {
        while next < commands.len() && commands[next].time <= time {
            sim.submit(commands[next].clone())?;
            next += 1;
        }
        sim.advance(time)?;
        time += STEP;
    }
    Ok(sim.checksum_trace)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decoherence=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ScenarioConfig::load(&args.scenario)?;

    let reports: Vec<StreamReport> = (0..args.streams)
        .map(|i| {
            let seed = args.seed.wrapping_add(i);
            let commands = random_stream(&config, seed, args.commands, args.until);
            let traces: Vec<_> = (0..args.replicas)
                .into_par_iter()
                .map(|_| replay(&config, &commands, args.until))
                .collect::<Result<_>>()?;
            let replicas_agree = traces.windows(2).all(|w| w[0] == w[1]);
            if !replicas_agree {
                tracing::error!(seed, "replicas diverged");
            }
            Ok(StreamReport {
                seed,
                commands: commands.len(),
                replicas_agree,
                final_checksum: traces
                    .first()
                    .and_then(|t| t.values().next_back().copied()),
            })
        })
        .collect::<Result<_>>()?;

    let all_agree = reports.iter().all(|r| r.replicas_agree);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    if !all_agree {
        std::process::exit(1);
    }
    Ok(())
}
