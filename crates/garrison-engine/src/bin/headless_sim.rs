//! Headless simulation harness.
//!
//! Builds a world from a config file (or the built-in defaults), places one
//! base per player, feeds a scripted stream of build orders and prints every
//! non-empty state delta as a JSON line.
//!
//! Usage: `garrison-sim [--config <path>] [--ticks <n>] [--players <n>] [--replay-check]`

use std::env;

use anyhow::Context;
use garrison_engine::prelude::*;
use garrison_engine::{build_tick_loop, logging};
use tracing::info;

struct Args {
    config: Option<String>,
    ticks: u64,
    players: u32,
    replay_check: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        ticks: 60,
        players: 2,
        replay_check: false,
    };
    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?),
            "--ticks" => {
                args.ticks = it
                    .next()
                    .context("--ticks needs a number")?
                    .parse()
                    .context("--ticks must be a non-negative integer")?;
            }
            "--players" => {
                args.players = it
                    .next()
                    .context("--players needs a number")?
                    .parse()
                    .context("--players must be a non-negative integer")?;
            }
            "--replay-check" => args.replay_check = true,
            other => anyhow::bail!(
                "unknown argument '{other}'\nusage: garrison-sim [--config <path>] [--ticks <n>] [--players <n>] [--replay-check]"
            ),
        }
    }
    Ok(args)
}

/// A fresh loop with one base per player spread along the map diagonal.
fn setup(config: &GameConfig, players: u32) -> anyhow::Result<TickLoop> {
    let mut tick_loop = build_tick_loop(config)?;
    let map_info = *tick_loop.world().singleton::<MapInfo>()?.1;
    for player in 1..=players {
        let offset = (player as u64 * map_info.width.min(map_info.height) as u64 / (players as u64 + 1)) as i32;
        spawn_base(
            tick_loop.world_mut(),
            &map_info,
            Position {
                x: offset,
                y: offset,
            },
            player,
            200,
        )?;
    }
    Ok(tick_loop)
}

/// Scripted orders: every player cycles through the catalog, one order
/// every few ticks.
fn scripted_input(tick: u64, players: u32, unit_types: &[String]) -> InputFrame {
    let mut frame = InputFrame::new();
    if unit_types.is_empty() || tick % 4 != 0 {
        return frame;
    }
    for player in 1..=players {
        let pick = (tick / 4 + player as u64) as usize % unit_types.len();
        frame.push(build(player, &unit_types[pick]));
    }
    frame
}

fn main() -> Result<(), anyhow::Error> {
    logging::init("info");
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => GameConfig::from_path(path).with_context(|| format!("loading {path}"))?,
        None => GameConfig::default(),
    };
    let unit_types: Vec<String> = config.units.keys().cloned().collect();

    let mut tick_loop = setup(&config, args.players)?;
    let mut recorder = ReplayRecorder::start(&tick_loop, 10)?;
    recorder.set_config_fingerprint(config.fingerprint()?);

    // Initial state for clients that join at tick 0.
    let initial = tick_loop.drain_delta()?;
    println!("{}", serde_json::to_string(&initial)?);

    let mut produced = 0usize;
    let mut failed = 0usize;
    for _ in 0..args.ticks {
        let tick = tick_loop.tick_count();
        let input = scripted_input(tick, args.players, &unit_types);
        tick_loop.set_input(input);
        recorder.record(&tick_loop)?;

        let report = tick_loop.tick()?;
        for event in &report.events {
            match event {
                GameEvent::UnitProduced { .. } => produced += 1,
                GameEvent::BuildFailed { .. } => failed += 1,
                GameEvent::OrderRejected { .. } => {}
            }
        }

        let delta = tick_loop.drain_delta()?;
        if !delta.is_empty() {
            println!("{}", serde_json::to_string(&delta)?);
        }
    }

    info!(
        ticks = tick_loop.tick_count(),
        sim_time = tick_loop.sim_time(),
        entities = tick_loop.world().entity_count(),
        produced,
        failed,
        "simulation finished"
    );

    if args.replay_check {
        let log = recorder.finish();
        let mut fresh = setup(&config, args.players)?;
        let result = replay(&mut fresh, &log)?;
        match &result.first_divergence {
            None => info!(ticks = result.ticks_replayed, "replay matched"),
            Some(d) => anyhow::bail!(
                "replay diverged at tick {}: expected {}, got {}",
                d.tick,
                d.expected_hash,
                d.actual_hash
            ),
        }
    }

    Ok(())
}
