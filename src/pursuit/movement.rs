use rand::Rng;

use crate::collision::CollisionGrid;
use crate::constants::DIAGONAL_CHANCE;
use crate::types::GridPos;

pub(super) const CARDINALS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChaseRules {
    pub diagonal: bool,
    pub greedy: bool,
}

/// Preference-ordered chase steps from `from` toward `target`: the larger
/// delta axis first, then the other axis, then sideways and reverse steps.
/// An eligible diagonal goes in front.
pub(super) fn chase_candidates(
    from: GridPos,
    target: GridPos,
    grid: &CollisionGrid,
    rules: ChaseRules,
    rng: &mut impl Rng,
) -> Vec<GridPos> {
    let dx = target.x - from.x;
    let dy = target.y - from.y;
    let sx = dx.signum();
    let sy = dy.signum();
    let horizontal_first = dx.abs() >= dy.abs();

    let (primary, secondary) = if horizontal_first {
        ((sx, 0), (0, sy))
    } else {
        ((0, sy), (sx, 0))
    };

    let mut steps: Vec<(i32, i32)> = Vec::with_capacity(5);
    for step in [primary, secondary] {
        if step != (0, 0) {
            steps.push(step);
        }
    }
    for step in reverse_steps(secondary, !horizontal_first) {
        push_unique(&mut steps, step);
    }
    for step in reverse_steps(primary, horizontal_first) {
        push_unique(&mut steps, step);
    }

    if rules.diagonal && sx != 0 && sy != 0 {
        let horizontal = from.offset(sx, 0);
        let vertical = from.offset(0, sy);
        let diagonal = from.offset(sx, sy);
        if grid.is_agent_walkable(horizontal)
            && grid.is_agent_walkable(vertical)
            && grid.is_agent_walkable(diagonal)
            && rng.random_bool(DIAGONAL_CHANCE)
        {
            steps.insert(0, (sx, sy));
        }
    }

    steps
        .into_iter()
        .map(|(ox, oy)| from.offset(ox, oy))
        .collect()
}

fn reverse_steps(toward: (i32, i32), horizontal: bool) -> Vec<(i32, i32)> {
    match (toward, horizontal) {
        ((0, 0), true) => vec![(1, 0), (-1, 0)],
        ((0, 0), false) => vec![(0, 1), (0, -1)],
        ((x, y), _) => vec![(-x, -y)],
    }
}

fn push_unique(steps: &mut Vec<(i32, i32)>, step: (i32, i32)) {
    if !steps.contains(&step) {
        steps.push(step);
    }
}

pub(super) fn choose_chase_move(
    from: GridPos,
    target: GridPos,
    grid: &CollisionGrid,
    rules: ChaseRules,
    rng: &mut impl Rng,
) -> Option<GridPos> {
    if from == target {
        return Some(from);
    }

    let legal: Vec<GridPos> = chase_candidates(from, target, grid, rules, rng)
        .into_iter()
        .filter(|pos| grid.is_agent_walkable(*pos))
        .collect();

    if rules.greedy {
        let sx = (target.x - from.x).signum();
        let sy = (target.y - from.y).signum();
        let both_axes_open = sx != 0
            && sy != 0
            && grid.is_agent_walkable(from.offset(sx, 0))
            && grid.is_agent_walkable(from.offset(0, sy));
        if both_axes_open {
            // min_by_key keeps the first of equal keys, so ties follow list order.
            return legal.into_iter().min_by_key(|pos| pos.distance_sq(target));
        }
    }

    legal.into_iter().next()
}

pub(super) fn wander_move(from: GridPos, grid: &CollisionGrid, rng: &mut impl Rng) -> GridPos {
    let options: Vec<GridPos> = CARDINALS
        .iter()
        .map(|(ox, oy)| from.offset(*ox, *oy))
        .filter(|pos| grid.is_agent_walkable(*pos))
        .collect();
    if options.is_empty() {
        return from;
    }
    options[rng.random_range(0..options.len())]
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::collision::MapRegistry;

    const PLAIN: ChaseRules = ChaseRules {
        diagonal: false,
        greedy: false,
    };

    fn cafeteria() -> CollisionGrid {
        MapRegistry::builtin()
            .expect("builtin maps should load")
            .get("cafeteria")
            .cloned()
            .expect("cafeteria exists")
    }

    #[test]
    fn larger_axis_comes_first_then_reverse_fallbacks() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(1);
        let from = GridPos::new(15, 9);
        let candidates = chase_candidates(from, GridPos::new(20, 7), &grid, PLAIN, &mut rng);
        assert_eq!(
            candidates,
            vec![
                GridPos::new(16, 9),
                GridPos::new(15, 8),
                GridPos::new(15, 10),
                GridPos::new(14, 9),
            ]
        );
    }

    #[test]
    fn zero_delta_axis_offers_both_sideways_steps() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(1);
        let from = GridPos::new(15, 5);
        let candidates = chase_candidates(from, GridPos::new(15, 9), &grid, PLAIN, &mut rng);
        assert_eq!(
            candidates,
            vec![
                GridPos::new(15, 6),
                GridPos::new(16, 5),
                GridPos::new(14, 5),
                GridPos::new(15, 4),
            ]
        );
    }

    #[test]
    fn blocked_toward_step_falls_through_to_next_legal() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(7);
        // Walking along the row 9 corridor toward a target above it: the
        // vertical step is off-path, so the horizontal step wins.
        let from = GridPos::new(10, 9);
        let target = GridPos::new(12, 4);
        let chosen = choose_chase_move(from, target, &grid, PLAIN, &mut rng);
        assert_eq!(chosen, Some(GridPos::new(11, 9)));
    }

    #[test]
    fn no_legal_candidate_yields_none() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(3);
        let chosen = choose_chase_move(
            GridPos::new(6, 5),
            GridPos::new(12, 8),
            &grid,
            PLAIN,
            &mut rng,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn greedy_ranking_picks_closest_with_stable_ties() {
        let grid = cafeteria();
        let rules = ChaseRules {
            diagonal: false,
            greedy: true,
        };
        // Junction of the row 9 corridor and the column 15 corridor.
        let from = GridPos::new(15, 9);
        let target = GridPos::new(17, 11);
        for seed in 0..16u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = choose_chase_move(from, target, &grid, rules, &mut rng);
            // Both steps end sqrt(5) away; list order prefers the horizontal one.
            assert_eq!(chosen, Some(GridPos::new(16, 9)));
        }
    }

    #[test]
    fn diagonal_is_gated_by_rule_and_roll() {
        let grid = cafeteria();
        let diagonal = ChaseRules {
            diagonal: true,
            greedy: false,
        };
        // The plaza around (15, 9) is a block of path cells.
        let from = GridPos::new(15, 9);
        let target = GridPos::new(20, 14);
        let mut offered = 0;
        for seed in 0..64u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let candidates = chase_candidates(from, target, &grid, diagonal, &mut rng);
            if candidates.first() == Some(&GridPos::new(16, 10)) {
                offered += 1;
            }

            let mut rng = StdRng::seed_from_u64(seed);
            let without = chase_candidates(from, target, &grid, PLAIN, &mut rng);
            assert!(!without.contains(&GridPos::new(16, 10)));
        }
        assert!(offered > 0);
        assert!(offered < 64);
    }

    #[test]
    fn diagonal_requires_both_orthogonal_steps_open() {
        let grid = cafeteria();
        let diagonal = ChaseRules {
            diagonal: true,
            greedy: true,
        };
        // From the row 9 corridor the upward step at x = 10 is open floor.
        let from = GridPos::new(10, 9);
        let target = GridPos::new(14, 5);
        for seed in 0..32u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let candidates = chase_candidates(from, target, &grid, diagonal, &mut rng);
            assert!(!candidates.contains(&GridPos::new(11, 8)));
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = choose_chase_move(from, target, &grid, diagonal, &mut rng);
            assert_eq!(chosen, Some(GridPos::new(11, 9)));
        }
    }

    #[test]
    fn wander_only_uses_path_cells() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(11);
        let mut pos = GridPos::new(15, 9);
        for _ in 0..500 {
            pos = wander_move(pos, &grid, &mut rng);
            assert!(grid.is_agent_walkable(pos));
        }
    }

    #[test]
    fn wander_without_exits_stays_put() {
        let grid = cafeteria();
        let mut rng = StdRng::seed_from_u64(5);
        let enclosed = GridPos::new(6, 5);
        assert_eq!(wander_move(enclosed, &grid, &mut rng), enclosed);
    }
}
