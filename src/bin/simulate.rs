use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use campus_relay::collision::{CollisionGrid, MapRegistry};
use campus_relay::constants::DEFAULT_MAP;
use campus_relay::pursuit::Target;
use campus_relay::session::GameSession;
use campus_relay::types::{AgentMode, Difficulty, GridPos};
use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

const WALKER_STEPS: [(i32, i32); 5] = [(0, 0), (0, -1), (0, 1), (-1, 0), (1, 0)];

/// Runs a pursuit session headless against scripted walkers.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value = DEFAULT_MAP)]
    map: String,
    #[arg(long, default_value_t = 1)]
    difficulty: i64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long, default_value_t = 200)]
    ticks: u64,
    #[arg(long, default_value_t = 2)]
    players: usize,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct CaptureRecord {
    tick: u64,
    player: String,
    zombie: String,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    map: String,
    difficulty: Difficulty,
    seed: u64,
    ticks: u64,
    #[serde(rename = "agentCount")]
    agent_count: usize,
    #[serde(rename = "chasingTicks")]
    chasing_ticks: u64,
    captures: Vec<CaptureRecord>,
    #[serde(rename = "legalityViolations")]
    legality_violations: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let maps = match MapRegistry::builtin() {
        Ok(maps) => maps,
        Err(err) => {
            eprintln!("failed to load maps: {err}");
            std::process::exit(2);
        }
    };
    let Some(grid) = maps.get(&cli.map) else {
        eprintln!(
            "unknown map `{}` (known: {})",
            cli.map,
            maps.names().collect::<Vec<_>>().join(", ")
        );
        std::process::exit(2);
    };

    let summary = run(
        grid,
        Difficulty::from_level(cli.difficulty),
        cli.seed,
        cli.ticks,
        cli.players,
    );

    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("failed to encode summary: {err}"),
    }
    if let Some(path) = cli.summary_out.as_deref() {
        if let Err(err) = write_summary(path, &summary) {
            eprintln!("failed to write summary to {}: {err}", path.display());
        }
    }
    if !summary.legality_violations.is_empty() {
        std::process::exit(1);
    }
}

fn run(
    grid: &CollisionGrid,
    difficulty: Difficulty,
    seed: u64,
    ticks: u64,
    players: usize,
) -> RunSummary {
    let mut walker_rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut walkers: Vec<Target> = (0..players)
        .map(|idx| Target {
            id: format!("walker_{}", idx + 1),
            pos: grid.spawn,
        })
        .collect();

    let mut session = GameSession::new(&grid.name);
    let spawn_around: Vec<GridPos> = walkers.iter().map(|walker| walker.pos).collect();
    session.start(difficulty, grid, &spawn_around, StdRng::seed_from_u64(seed));

    let mut summary = RunSummary {
        map: grid.name.clone(),
        difficulty,
        seed,
        ticks,
        agent_count: session.status().agent_count,
        chasing_ticks: 0,
        captures: Vec::new(),
        legality_violations: Vec::new(),
    };

    let mut now_ms = 0;
    for tick in 0..ticks {
        for walker in walkers.iter_mut() {
            walker.pos = step_walker(grid, walker.pos, &mut walker_rng);
        }
        now_ms += session.tick_ms();
        let Some(report) = session.tick(grid, &walkers, now_ms) else {
            break;
        };
        for agent in &report.agents {
            if !grid.is_agent_walkable(agent.pos()) {
                let message = format!("tick {tick}: {} off path at ({}, {})", agent.id, agent.x, agent.y);
                warn!("{message}");
                summary.legality_violations.push(message);
            }
            if agent.mode == AgentMode::Chasing {
                summary.chasing_ticks += 1;
            }
        }
        for capture in report.captures {
            info!("tick {tick}: {} caught {}", capture.zombie, capture.player);
            summary.captures.push(CaptureRecord {
                tick,
                player: capture.player,
                zombie: capture.zombie,
            });
        }
    }
    session.stop();
    summary
}

fn step_walker(grid: &CollisionGrid, pos: GridPos, rng: &mut StdRng) -> GridPos {
    let (dx, dy) = WALKER_STEPS[rng.random_range(0..WALKER_STEPS.len())];
    let next = pos.offset(dx, dy);
    if grid.is_player_walkable(next) {
        next
    } else {
        pos
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(name: &str) -> CollisionGrid {
        MapRegistry::builtin()
            .expect("builtin maps should load")
            .get(name)
            .cloned()
            .expect("map exists")
    }

    #[test]
    fn run_keeps_agents_on_paths() {
        for name in ["campus", "cafeteria", "library"] {
            let summary = run(&grid(name), Difficulty::Hard, 3, 150, 3);
            assert_eq!(summary.agent_count, 5);
            assert!(summary.legality_violations.is_empty(), "{name}");
        }
    }

    #[test]
    fn run_is_reproducible_for_a_seed() {
        let grid = grid("cafeteria");
        let first = run(&grid, Difficulty::Medium, 11, 120, 2);
        let second = run(&grid, Difficulty::Medium, 11, 120, 2);
        assert_eq!(first.chasing_ticks, second.chasing_ticks);
        assert_eq!(first.captures.len(), second.captures.len());
    }

    #[test]
    fn walkers_stay_on_player_cells() {
        let grid = grid("library");
        let mut rng = StdRng::seed_from_u64(5);
        let mut pos = grid.spawn;
        for _ in 0..500 {
            pos = step_walker(&grid, pos, &mut rng);
            assert!(grid.is_player_walkable(pos));
        }
    }

    #[test]
    fn write_summary_fails_for_missing_parent() {
        let summary = run(&grid("campus"), Difficulty::Easy, 1, 5, 1);
        let path = std::env::temp_dir()
            .join("campus-relay-missing-dir")
            .join("nested")
            .join("summary.json");
        assert!(write_summary(&path, &summary).is_err());
    }
}
