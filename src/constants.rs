use crate::types::Difficulty;

pub const GRID_WIDTH: i32 = 32;
pub const GRID_HEIGHT: i32 = 20;

pub const DEFAULT_MAP: &str = "campus";

pub const RECONNECT_GRACE_MS: u64 = 5_000;
pub const HEARTBEAT_MS: u64 = 30_000;
pub const MIN_UPDATE_INTERVAL_MS: u64 = 50;

pub const CATCH_RADIUS: f64 = 1.5;
pub const CAPTURE_COOLDOWN_MS: u64 = 5_000;
pub const DIAGONAL_CHANCE: f64 = 0.4;
pub const SLOWDOWN_FACTOR: u64 = 2;
pub const SLOWDOWN_MS: u64 = 5_000;

/// Outward ring search radius used when correcting an illegal position.
pub const CORRECTION_SEARCH_RADIUS: i32 = 6;
pub const SPAWN_ATTEMPTS: usize = 24;

pub const REMOTE_SUFFIX: &str = "_remote";
pub const REMOTE_COLOR: &str = "#9e9e9e";
pub const PLAYER_PALETTE: [&str; 8] = [
    "#e53935", "#1e88e5", "#43a047", "#fdd835", "#8e24aa", "#fb8c00", "#00acc1", "#6d4c41",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultyProfile {
    pub agent_count: usize,
    pub tick_ms: u64,
    pub detection_radius: f64,
    pub diagonal: bool,
    pub greedy: bool,
}

pub fn get_difficulty_profile(difficulty: Difficulty) -> DifficultyProfile {
    match difficulty {
        Difficulty::Easy => DifficultyProfile {
            agent_count: 2,
            tick_ms: 800,
            detection_radius: 6.0,
            diagonal: false,
            greedy: false,
        },
        Difficulty::Medium => DifficultyProfile {
            agent_count: 3,
            tick_ms: 600,
            detection_radius: 9.0,
            diagonal: true,
            greedy: false,
        },
        Difficulty::Hard => DifficultyProfile {
            agent_count: 5,
            tick_ms: 400,
            detection_radius: 12.0,
            diagonal: true,
            greedy: true,
        },
    }
}

pub fn slowed_tick_ms(baseline_ms: u64) -> u64 {
    baseline_ms.saturating_mul(SLOWDOWN_FACTOR)
}

pub fn palette_color(index: usize) -> &'static str {
    PLAYER_PALETTE[index % PLAYER_PALETTE.len()]
}
