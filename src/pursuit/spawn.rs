use rand::Rng;

use crate::collision::CollisionGrid;
use crate::constants::{CORRECTION_SEARCH_RADIUS, SPAWN_ATTEMPTS};
use crate::types::GridPos;

/// Minimum squared distance between a fresh agent and any player.
const SPAWN_CLEARANCE_SQ: i64 = 9;

pub(super) fn spawn_positions(
    grid: &CollisionGrid,
    count: usize,
    players: &[GridPos],
    rng: &mut impl Rng,
) -> Vec<GridPos> {
    let mut placed: Vec<GridPos> = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = pick_spawn(grid, &placed, players, rng).unwrap_or(grid.safe_agent);
        placed.push(pos);
    }
    placed
}

fn pick_spawn(
    grid: &CollisionGrid,
    placed: &[GridPos],
    players: &[GridPos],
    rng: &mut impl Rng,
) -> Option<GridPos> {
    let acceptable = |pos: GridPos| {
        grid.is_agent_walkable(pos)
            && !placed.contains(&pos)
            && players
                .iter()
                .all(|player| player.distance_sq(pos) >= SPAWN_CLEARANCE_SQ)
    };

    for _ in 0..SPAWN_ATTEMPTS {
        let anchor = GridPos::new(
            rng.random_range(0..grid.width),
            rng.random_range(0..grid.height),
        );
        if acceptable(anchor) {
            return Some(anchor);
        }
        if let Some(found) = grid.nearest_matching(anchor, CORRECTION_SEARCH_RADIUS, acceptable) {
            return Some(found);
        }
    }
    None
}
