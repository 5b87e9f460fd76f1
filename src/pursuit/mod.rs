use std::collections::HashMap;

use log::{debug, warn};
use rand::rngs::StdRng;

use crate::collision::CollisionGrid;
use crate::constants::{DifficultyProfile, CAPTURE_COOLDOWN_MS, CATCH_RADIUS};
use crate::error::RelayError;
use crate::types::{AgentMode, AgentView, GridPos};

mod movement;
mod spawn;

pub use self::movement::ChaseRules;
use self::movement::{choose_chase_move, wander_move};
use self::spawn::spawn_positions;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PursuitAgent {
    pub id: String,
    pub pos: GridPos,
    pub target: Option<String>,
}

impl PursuitAgent {
    pub fn mode(&self) -> AgentMode {
        if self.target.is_some() {
            AgentMode::Chasing
        } else {
            AgentMode::Wandering
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub pos: GridPos,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capture {
    pub player: String,
    pub zombie: String,
}

#[derive(Clone, Debug, Default)]
pub struct TickReport {
    pub agents: Vec<AgentView>,
    pub captures: Vec<Capture>,
}

#[derive(Debug)]
pub struct PursuitController {
    map: String,
    rules: ChaseRules,
    detection_radius: f64,
    agents: Vec<PursuitAgent>,
    caught_at: HashMap<String, u64>,
    rng: StdRng,
}

impl PursuitController {
    pub fn new(map: &str, profile: &DifficultyProfile, rng: StdRng) -> Self {
        Self {
            map: map.to_string(),
            rules: ChaseRules {
                diagonal: profile.diagonal,
                greedy: profile.greedy,
            },
            detection_radius: profile.detection_radius,
            agents: Vec::new(),
            caught_at: HashMap::new(),
            rng,
        }
    }

    pub fn views(&self) -> Vec<AgentView> {
        self.agents.iter().map(|agent| self.view(agent)).collect()
    }

    fn view(&self, agent: &PursuitAgent) -> AgentView {
        AgentView {
            id: agent.id.clone(),
            x: agent.pos.x,
            y: agent.pos.y,
            map: self.map.clone(),
            mode: agent.mode(),
            target: agent.target.clone(),
        }
    }

    pub fn spawn_agents(&mut self, grid: &CollisionGrid, count: usize, players: &[GridPos]) {
        let positions = spawn_positions(grid, count, players, &mut self.rng);
        self.agents = positions
            .into_iter()
            .enumerate()
            .map(|(idx, pos)| PursuitAgent {
                id: format!("zombie_{}", idx + 1),
                pos,
                target: None,
            })
            .collect();
        self.caught_at.clear();
    }

    pub fn clear(&mut self) {
        self.agents.clear();
        self.caught_at.clear();
    }

    pub fn relocate_agent(
        &mut self,
        grid: &CollisionGrid,
        agent_id: &str,
        pos: GridPos,
    ) -> Result<(), RelayError> {
        if !grid.is_agent_walkable(pos) {
            return Err(RelayError::IllegalAgentPosition {
                agent: agent_id.to_string(),
                pos,
            });
        }
        if let Some(agent) = self.agents.iter_mut().find(|agent| agent.id == agent_id) {
            agent.pos = pos;
        }
        Ok(())
    }

    pub fn tick(&mut self, grid: &CollisionGrid, targets: &[Target], now_ms: u64) -> TickReport {
        self.caught_at
            .retain(|_, at| now_ms.saturating_sub(*at) < CAPTURE_COOLDOWN_MS);

        let mut report = TickReport::default();
        for idx in 0..self.agents.len() {
            if let Err(err) = self.step_agent(idx, grid, targets) {
                warn!("skipping agent tick on {}: {err}", self.map);
            }
            let agent_pos = self.agents[idx].pos;
            for target in targets {
                if target.pos.distance(agent_pos) > CATCH_RADIUS {
                    continue;
                }
                if self.caught_at.contains_key(&target.id) {
                    continue;
                }
                self.caught_at.insert(target.id.clone(), now_ms);
                report.captures.push(Capture {
                    player: target.id.clone(),
                    zombie: self.agents[idx].id.clone(),
                });
            }
        }
        report.agents = self.views();
        report
    }

    fn step_agent(
        &mut self,
        idx: usize,
        grid: &CollisionGrid,
        targets: &[Target],
    ) -> Result<(), RelayError> {
        let from = self.agents[idx].pos;
        if !grid.is_agent_walkable(from) {
            self.agents[idx].pos = grid.nearest_agent_walkable(from);
            return Err(RelayError::IllegalAgentPosition {
                agent: self.agents[idx].id.clone(),
                pos: from,
            });
        }

        let nearest = targets
            .iter()
            .filter(|target| target.pos.distance(from) <= self.detection_radius)
            .min_by_key(|target| target.pos.distance_sq(from));

        let next = match nearest {
            Some(target) => {
                self.agents[idx].target = Some(target.id.clone());
                choose_chase_move(from, target.pos, grid, self.rules, &mut self.rng)
                    .unwrap_or_else(|| wander_move(from, grid, &mut self.rng))
            }
            None => {
                self.agents[idx].target = None;
                wander_move(from, grid, &mut self.rng)
            }
        };

        if !grid.is_agent_walkable(next) {
            return Err(RelayError::IllegalAgentPosition {
                agent: self.agents[idx].id.clone(),
                pos: next,
            });
        }
        if next != from {
            debug!(
                "{} moved to ({}, {}) on {}",
                self.agents[idx].id, next.x, next.y, self.map
            );
        }
        self.agents[idx].pos = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::collision::MapRegistry;
    use crate::constants::get_difficulty_profile;
    use crate::types::Difficulty;

    fn cafeteria() -> CollisionGrid {
        MapRegistry::builtin()
            .expect("builtin maps should load")
            .get("cafeteria")
            .cloned()
            .expect("cafeteria exists")
    }

    fn controller(difficulty: Difficulty, seed: u64) -> PursuitController {
        PursuitController::new(
            "cafeteria",
            &get_difficulty_profile(difficulty),
            StdRng::seed_from_u64(seed),
        )
    }

    fn target(id: &str, x: i32, y: i32) -> Target {
        Target {
            id: id.to_string(),
            pos: GridPos::new(x, y),
        }
    }

    #[test]
    fn agents_never_leave_path_cells() {
        let grid = cafeteria();
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let mut pursuit = controller(difficulty, 99);
            let count = get_difficulty_profile(difficulty).agent_count;
            pursuit.spawn_agents(&grid, count, &[]);
            let targets = [target("alice", 12, 8), target("bob", 20, 14)];
            for tick in 0..300u64 {
                let report = pursuit.tick(&grid, &targets, tick * 100);
                assert_eq!(report.agents.len(), count);
                for agent in &report.agents {
                    assert!(grid.is_agent_walkable(agent.pos()), "{agent:?}");
                }
            }
        }
    }

    #[test]
    fn agent_chases_target_in_range_and_wanders_otherwise() {
        let grid = cafeteria();
        let mut pursuit = controller(Difficulty::Easy, 4);
        pursuit.spawn_agents(&grid, 1, &[]);
        pursuit
            .relocate_agent(&grid, "zombie_1", GridPos::new(5, 9))
            .expect("row 9 is a path");

        let report = pursuit.tick(&grid, &[target("alice", 9, 8)], 0);
        assert_eq!(report.agents[0].mode, AgentMode::Chasing);
        assert_eq!(report.agents[0].target.as_deref(), Some("alice"));
        assert_eq!(report.agents[0].pos(), GridPos::new(6, 9));

        let report = pursuit.tick(&grid, &[target("alice", 28, 1)], 100);
        assert_eq!(report.agents[0].mode, AgentMode::Wandering);
        assert_eq!(report.agents[0].target, None);

        let report = pursuit.tick(&grid, &[], 200);
        assert_eq!(report.agents[0].mode, AgentMode::Wandering);
    }

    #[test]
    fn nearest_target_wins() {
        let grid = cafeteria();
        let mut pursuit = controller(Difficulty::Easy, 4);
        pursuit.spawn_agents(&grid, 1, &[]);
        pursuit
            .relocate_agent(&grid, "zombie_1", GridPos::new(10, 9))
            .expect("row 9 is a path");
        let report = pursuit.tick(
            &grid,
            &[target("far", 14, 7), target("near", 7, 8)],
            0,
        );
        assert_eq!(report.agents[0].target.as_deref(), Some("near"));
    }

    #[test]
    fn capture_fires_once_per_cooldown() {
        let grid = cafeteria();
        let mut pursuit = controller(Difficulty::Easy, 8);
        pursuit.spawn_agents(&grid, 1, &[]);
        pursuit
            .relocate_agent(&grid, "zombie_1", GridPos::new(12, 9))
            .expect("row 9 is a path");

        // (12, 8) sits on a table; every legal step from (12, 9) keeps the
        // agent within catch radius of it.
        let alice = [target("alice", 12, 8)];
        let mut captures = 0;
        for tick in 0..10u64 {
            let report = pursuit.tick(&grid, &alice, tick * 400);
            captures += report.captures.len();
        }
        assert_eq!(captures, 1);

        let report = pursuit.tick(&grid, &alice, CAPTURE_COOLDOWN_MS + 3_600);
        assert_eq!(report.captures.len(), 1);
        assert_eq!(report.captures[0].player, "alice");
        assert_eq!(report.captures[0].zombie, "zombie_1");
    }

    #[test]
    fn relocate_rejects_non_path_cells() {
        let grid = cafeteria();
        let mut pursuit = controller(Difficulty::Easy, 1);
        pursuit.spawn_agents(&grid, 1, &[]);
        let err = pursuit.relocate_agent(&grid, "zombie_1", GridPos::new(12, 8));
        assert!(matches!(err, Err(RelayError::IllegalAgentPosition { .. })));
    }

    #[test]
    fn same_seed_replays_identically() {
        let grid = cafeteria();
        let run = |seed: u64| {
            let mut pursuit = controller(Difficulty::Hard, seed);
            pursuit.spawn_agents(&grid, 5, &[]);
            let targets = [target("alice", 12, 8)];
            (0..50u64)
                .map(|tick| pursuit.tick(&grid, &targets, tick * 400).agents)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(17), run(17));
    }
}
