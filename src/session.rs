use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use rand::rngs::StdRng;

use crate::collision::CollisionGrid;
use crate::constants::{get_difficulty_profile, slowed_tick_ms, DifficultyProfile};
use crate::error::RelayError;
use crate::pursuit::{PursuitController, Target, TickReport};
use crate::types::{Difficulty, GameCommand, GridPos, ServerMessage, SessionStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlowdownTicket {
    pub map: String,
    pub epoch: u64,
}

#[derive(Debug)]
pub struct GameSession {
    map: String,
    difficulty: Option<Difficulty>,
    profile: Option<DifficultyProfile>,
    controller: Option<PursuitController>,
    generation: u64,
    tick_ms: u64,
    slowdown_epoch: u64,
    slowed: bool,
    started_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn new(map: &str) -> Self {
        Self {
            map: map.to_string(),
            difficulty: None,
            profile: None,
            controller: None,
            generation: 0,
            tick_ms: 0,
            slowdown_epoch: 0,
            slowed: false,
            started_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.controller.is_some()
    }

    /// Changes on every start and stop. A ticker started for an older
    /// generation must exit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn is_slowed(&self) -> bool {
        self.slowed
    }

    pub fn start(
        &mut self,
        difficulty: Difficulty,
        grid: &CollisionGrid,
        players: &[GridPos],
        rng: StdRng,
    ) -> Option<Vec<ServerMessage>> {
        if self.is_active() {
            return None;
        }

        let profile = get_difficulty_profile(difficulty);
        let mut controller = PursuitController::new(&self.map, &profile, rng);
        controller.spawn_agents(grid, profile.agent_count, players);

        self.generation = self.generation.wrapping_add(1);
        self.slowdown_epoch = self.slowdown_epoch.wrapping_add(1);
        self.slowed = false;
        self.difficulty = Some(difficulty);
        self.profile = Some(profile);
        self.tick_ms = profile.tick_ms;
        self.started_at = Some(Utc::now());

        let mut messages = vec![ServerMessage::ZombieGameCommand(GameCommand::Start {
            map: self.map.clone(),
            difficulty,
            zombie_count: profile.agent_count,
            tick_ms: profile.tick_ms,
            detection_radius: profile.detection_radius,
        })];
        messages.extend(controller.views().iter().map(ServerMessage::zombie_position));
        self.controller = Some(controller);

        info!(
            "session on {} started at difficulty {} with {} agents",
            self.map,
            difficulty.level(),
            profile.agent_count
        );
        Some(messages)
    }

    pub fn stop(&mut self) -> Option<ServerMessage> {
        let mut controller = self.controller.take()?;
        controller.clear();
        self.generation = self.generation.wrapping_add(1);
        self.slowdown_epoch = self.slowdown_epoch.wrapping_add(1);
        self.slowed = false;
        self.difficulty = None;
        self.profile = None;
        self.tick_ms = 0;
        self.started_at = None;
        info!("session on {} stopped", self.map);
        Some(ServerMessage::ZombieGameCommand(GameCommand::Stop {
            map: self.map.clone(),
        }))
    }

    pub fn tick(
        &mut self,
        grid: &CollisionGrid,
        targets: &[Target],
        now_ms: u64,
    ) -> Option<TickReport> {
        let controller = self.controller.as_mut()?;
        Some(controller.tick(grid, targets, now_ms))
    }

    pub fn relocate_agent(
        &mut self,
        grid: &CollisionGrid,
        agent_id: &str,
        pos: GridPos,
    ) -> Result<(), RelayError> {
        match self.controller.as_mut() {
            Some(controller) => controller.relocate_agent(grid, agent_id, pos),
            None => Ok(()),
        }
    }

    /// Only the newest ticket can restore the baseline speed.
    pub fn apply_slowdown(&mut self) -> Option<SlowdownTicket> {
        let profile = self.profile?;
        self.slowdown_epoch = self.slowdown_epoch.wrapping_add(1);
        self.slowed = true;
        self.tick_ms = slowed_tick_ms(profile.tick_ms);
        Some(SlowdownTicket {
            map: self.map.clone(),
            epoch: self.slowdown_epoch,
        })
    }

    pub fn restore_speed(&mut self, ticket: &SlowdownTicket) -> Option<u64> {
        let profile = self.profile?;
        if ticket.epoch != self.slowdown_epoch || !self.slowed {
            return None;
        }
        self.slowed = false;
        self.tick_ms = profile.tick_ms;
        Some(self.tick_ms)
    }

    pub fn status(&self) -> SessionStatus {
        let agents = self
            .controller
            .as_ref()
            .map(PursuitController::views)
            .unwrap_or_default();
        SessionStatus {
            map: self.map.clone(),
            active: self.is_active(),
            difficulty: self.difficulty,
            agent_count: agents.len(),
            baseline_tick_ms: self.profile.map(|p| p.tick_ms).unwrap_or(0),
            tick_ms: self.tick_ms,
            detection_radius: self.profile.map(|p| p.detection_radius).unwrap_or(0.0),
            slowed: self.is_slowed(),
            started_at: self
                .started_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            agents,
        }
    }
}
