use std::collections::BTreeMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::collision::MapRegistry;
use crate::constants::{DEFAULT_MAP, HEARTBEAT_MS, MIN_UPDATE_INTERVAL_MS, RECONNECT_GRACE_MS, SLOWDOWN_MS};
use crate::error::RelayError;
use crate::protocol::{parse_client_message, ClientMessage, GameAction};
use crate::pursuit::Target;
use crate::registry::{ConnectionRegistry, OutboundMessage, QueuePolicy};
use crate::session::{GameSession, SlowdownTicket};
use crate::store::{ExpiryTicket, JoinOutcome, PlayerStore, UpdateInput, UpdateOutcome};
use crate::types::{
    Difficulty, GameCommand, GameUpdate, GridPos, ServerMessage, SessionStatus,
};

pub const HEARTBEAT_CLOSE_CODE: u16 = 4000;
pub const BACKPRESSURE_CLOSE_CODE: u16 = 1013;

#[derive(Clone, Debug)]
pub struct RelayOptions {
    pub grace_ms: u64,
    pub heartbeat_ms: u64,
    pub min_update_interval_ms: u64,
    pub slowdown_ms: u64,
    pub seed: Option<u64>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            grace_ms: RECONNECT_GRACE_MS,
            heartbeat_ms: HEARTBEAT_MS,
            min_update_interval_ms: MIN_UPDATE_INTERVAL_MS,
            slowdown_ms: SLOWDOWN_MS,
            seed: None,
        }
    }
}

/// Deferred work the transport layer must schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerRequest {
    Expire { ticket: ExpiryTicket, after_ms: u64 },
    RunSession { map: String, generation: u64 },
    RestoreSpeed { ticket: SlowdownTicket, after_ms: u64 },
}

#[derive(Debug)]
pub struct RelayState {
    maps: MapRegistry,
    registry: ConnectionRegistry,
    store: PlayerStore,
    sessions: BTreeMap<String, GameSession>,
    options: RelayOptions,
    timers: Vec<TimerRequest>,
    sessions_started: u64,
}

impl RelayState {
    pub fn new(maps: MapRegistry, options: RelayOptions) -> Self {
        Self {
            maps,
            registry: ConnectionRegistry::new(),
            store: PlayerStore::new(options.min_update_interval_ms),
            sessions: BTreeMap::new(),
            options,
            timers: Vec::new(),
            sessions_started: 0,
        }
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn take_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.timers)
    }

    pub fn open_connection(&mut self, tx: mpsc::Sender<OutboundMessage>, now_ms: u64) -> String {
        self.registry.register(tx, now_ms)
    }

    pub fn touch(&mut self, conn_id: &str, now_ms: u64) {
        self.registry.touch(conn_id, now_ms);
    }

    pub fn handle_text(&mut self, conn_id: &str, raw: &str, now_ms: u64) {
        self.registry.touch(conn_id, now_ms);
        let message = match parse_client_message(raw) {
            Ok(message) => message,
            Err(err) => {
                warn!("dropping message from {conn_id}: {err}");
                return;
            }
        };
        if !self.registry.contains(conn_id) {
            return;
        }
        if self.registry.player_for(conn_id).is_none() {
            self.registry.bind(conn_id, message.player_id());
        }

        if let Err(err) = self.dispatch(message, now_ms) {
            warn!("dropping message from {conn_id}: {err}");
        }
    }

    fn dispatch(&mut self, message: ClientMessage, now_ms: u64) -> Result<(), RelayError> {
        match message {
            ClientMessage::Join { id } => self.join(&id),
            ClientMessage::Update {
                id,
                pos,
                map,
                remote,
            } => self.update(id, pos, map, remote, now_ms),
            ClientMessage::Leave { id } => {
                self.registry.unbind_player(&id);
                self.leave(&id, true);
                Ok(())
            }
            ClientMessage::ZombieGame { id, action } => match action {
                GameAction::Start { difficulty, map } => {
                    let map = self.map_for(&id, map.as_deref());
                    self.start_session(Some(&map), difficulty).map(|_| ())
                }
                GameAction::Stop { map } => {
                    let map = self.map_for(&id, map.as_deref());
                    self.stop_session(Some(&map)).map(|_| ())
                }
                GameAction::Complete {
                    player,
                    survived,
                    time,
                    score,
                } => {
                    self.broadcast(
                        &ServerMessage::ZombieGameUpdate(GameUpdate::PlayerResult {
                            player,
                            survived,
                            time,
                            score,
                        }),
                        QueuePolicy::DisconnectOnFull,
                    );
                    Ok(())
                }
            },
            ClientMessage::ZombieFood {
                id,
                player,
                pos,
                score,
                map,
            } => {
                let map = self.map_for(&id, map.as_deref());
                self.food(&map, player, pos, score)
            }
        }
    }

    fn map_for(&self, player_id: &str, map: Option<&str>) -> String {
        map.map(str::to_string)
            .or_else(|| self.store.get(player_id).map(|player| player.map.clone()))
            .unwrap_or_else(|| DEFAULT_MAP.to_string())
    }

    fn resolve_map(&self, map: Option<&str>) -> Result<String, RelayError> {
        let map = map.unwrap_or(DEFAULT_MAP);
        if !self.maps.contains(map) {
            return Err(RelayError::UnknownMap(map.to_string()));
        }
        Ok(map.to_string())
    }

    pub fn join(&mut self, id: &str) -> Result<(), RelayError> {
        let grid = self
            .maps
            .get(DEFAULT_MAP)
            .ok_or_else(|| RelayError::UnknownMap(DEFAULT_MAP.to_string()))?;
        match self.store.join(id, grid) {
            JoinOutcome::Created => info!("player {id} joined"),
            JoinOutcome::Restored => info!("player {id} restored from reconnection buffer"),
            JoinOutcome::AlreadyPresent => debug!("player {id} joined again"),
        }
        self.broadcast_positions();
        Ok(())
    }

    pub fn update(
        &mut self,
        id: String,
        pos: GridPos,
        map: Option<String>,
        remote: Option<GridPos>,
        now_ms: u64,
    ) -> Result<(), RelayError> {
        let map = self.resolve_map(map.as_deref())?;
        let grid = self
            .maps
            .get(&map)
            .ok_or_else(|| RelayError::UnknownMap(map.clone()))?;
        let input = UpdateInput {
            id,
            pos,
            map,
            remote,
        };
        if self.store.update(input, grid, now_ms) == UpdateOutcome::Applied {
            self.broadcast_positions();
        }
        Ok(())
    }

    fn leave(&mut self, id: &str, broadcast_after: bool) {
        let Some(ticket) = self.store.leave(id) else {
            return;
        };
        info!("player {id} left, holding state for {} ms", self.options.grace_ms);
        self.timers.push(TimerRequest::Expire {
            ticket,
            after_ms: self.options.grace_ms,
        });
        if broadcast_after {
            self.broadcast_positions();
        }
    }

    pub fn disconnect(&mut self, conn_id: &str) {
        self.drop_connection(conn_id, true);
    }

    fn drop_connection(&mut self, conn_id: &str, broadcast_after: bool) {
        if let Some(player_id) = self.registry.remove(conn_id) {
            self.leave(&player_id, broadcast_after);
        }
    }

    pub fn expire(&mut self, ticket: &ExpiryTicket) -> bool {
        if !self.store.expire(ticket) {
            return false;
        }
        info!("player {} timed out", ticket.player_id);
        self.broadcast(
            &ServerMessage::PlayerTimeout {
                id: ticket.player_id.clone(),
            },
            QueuePolicy::DisconnectOnFull,
        );
        true
    }

    pub fn sweep_heartbeat(&mut self, now_ms: u64) {
        for conn_id in self
            .registry
            .stale_connections(now_ms, self.options.heartbeat_ms)
        {
            info!("connection {conn_id} missed its heartbeat");
            self.registry
                .close(&conn_id, HEARTBEAT_CLOSE_CODE, "heartbeat timeout");
            self.drop_connection(&conn_id, true);
        }
        self.registry.ping_all();
    }

    pub fn start_session(
        &mut self,
        map: Option<&str>,
        difficulty: Difficulty,
    ) -> Result<SessionStatus, RelayError> {
        let map = self.resolve_map(map)?;
        let rng = self.session_rng();
        let grid = self
            .maps
            .get(&map)
            .ok_or_else(|| RelayError::UnknownMap(map.clone()))?;
        let players: Vec<GridPos> = self
            .store
            .active_players_on(&map)
            .into_iter()
            .map(|player| player.pos())
            .collect();
        let session = self
            .sessions
            .entry(map.clone())
            .or_insert_with(|| GameSession::new(&map));

        let Some(messages) = session.start(difficulty, grid, &players, rng) else {
            debug!("session on {map} already running");
            return Ok(session.status());
        };
        let generation = session.generation();
        let status = session.status();

        for message in &messages {
            let policy = match message {
                ServerMessage::ZombiePosition { .. } => QueuePolicy::DropOnFull,
                _ => QueuePolicy::DisconnectOnFull,
            };
            self.broadcast(message, policy);
        }
        self.timers.push(TimerRequest::RunSession { map, generation });
        Ok(status)
    }

    fn session_rng(&mut self) -> StdRng {
        self.sessions_started = self.sessions_started.wrapping_add(1);
        match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.sessions_started)),
            None => StdRng::seed_from_u64(rand::random()),
        }
    }

    pub fn stop_session(&mut self, map: Option<&str>) -> Result<SessionStatus, RelayError> {
        let map = self.resolve_map(map)?;
        let Some(session) = self.sessions.get_mut(&map) else {
            return Ok(GameSession::new(&map).status());
        };
        let stopped = session.stop();
        let status = session.status();
        if let Some(message) = stopped {
            self.broadcast(&message, QueuePolicy::DisconnectOnFull);
        }
        Ok(status)
    }

    pub fn session_status(&self, map: Option<&str>) -> Result<SessionStatus, RelayError> {
        let map = self.resolve_map(map)?;
        Ok(match self.sessions.get(&map) {
            Some(session) => session.status(),
            None => GameSession::new(&map).status(),
        })
    }

    /// `None` once the ticker for `generation` has been superseded.
    pub fn session_interval(&self, map: &str, generation: u64) -> Option<u64> {
        let session = self.sessions.get(map)?;
        if !session.is_active() || session.generation() != generation {
            return None;
        }
        Some(session.tick_ms())
    }

    pub fn tick_session(&mut self, map: &str, generation: u64, now_ms: u64) -> Option<u64> {
        self.session_interval(map, generation)?;
        let grid = self.maps.get(map)?;
        let targets: Vec<Target> = self
            .store
            .active_players_on(map)
            .into_iter()
            .map(|player| Target {
                id: player.id.clone(),
                pos: player.pos(),
            })
            .collect();
        let session = self.sessions.get_mut(map)?;
        let report = session.tick(grid, &targets, now_ms)?;
        let next = session.tick_ms();

        for agent in &report.agents {
            self.broadcast(&ServerMessage::zombie_position(agent), QueuePolicy::DropOnFull);
        }
        for capture in report.captures {
            info!("{} caught {} on {map}", capture.zombie, capture.player);
            self.broadcast(
                &ServerMessage::ZombieGameCommand(GameCommand::Caught {
                    map: map.to_string(),
                    player: capture.player,
                    zombie: capture.zombie,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        Some(next)
    }

    pub fn relocate_agent(
        &mut self,
        map: &str,
        agent_id: &str,
        pos: GridPos,
    ) -> Result<(), RelayError> {
        let grid = self
            .maps
            .get(map)
            .ok_or_else(|| RelayError::UnknownMap(map.to_string()))?;
        match self.sessions.get_mut(map) {
            Some(session) => session.relocate_agent(grid, agent_id, pos),
            None => Ok(()),
        }
    }

    fn food(&mut self, map: &str, player: String, pos: GridPos, score: i64) -> Result<(), RelayError> {
        let map = self.resolve_map(Some(map))?;
        let Some(session) = self.sessions.get_mut(&map) else {
            debug!("food from {player} ignored, no session on {map}");
            return Ok(());
        };
        let Some(ticket) = session.apply_slowdown() else {
            debug!("food from {player} ignored, session on {map} is stopped");
            return Ok(());
        };
        let tick_ms = session.tick_ms();
        let duration_ms = self.options.slowdown_ms;

        self.broadcast(
            &ServerMessage::ZombieGameCommand(GameCommand::ZombieSlowed {
                map,
                player,
                x: pos.x,
                y: pos.y,
                score,
                duration_ms,
                tick_ms,
            }),
            QueuePolicy::DisconnectOnFull,
        );
        self.timers.push(TimerRequest::RestoreSpeed {
            ticket,
            after_ms: duration_ms,
        });
        Ok(())
    }

    pub fn restore_speed(&mut self, ticket: &SlowdownTicket) -> bool {
        let Some(session) = self.sessions.get_mut(&ticket.map) else {
            return false;
        };
        let Some(tick_ms) = session.restore_speed(ticket) else {
            return false;
        };
        self.broadcast(
            &ServerMessage::ZombieGameCommand(GameCommand::ZombieSpeedNormal {
                map: ticket.map.clone(),
                tick_ms,
            }),
            QueuePolicy::DisconnectOnFull,
        );
        true
    }

    fn broadcast_positions(&mut self) {
        let message = ServerMessage::Positions {
            players: self.store.snapshot(),
        };
        self.broadcast(&message, QueuePolicy::DropOnFull);
    }

    fn broadcast(&mut self, message: &ServerMessage, policy: QueuePolicy) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode outbound message: {err}");
                return;
            }
        };
        for conn_id in self.registry.broadcast(&payload, policy) {
            warn!("connection {conn_id} cannot keep up, closing");
            self.registry
                .close(&conn_id, BACKPRESSURE_CLOSE_CODE, "outbound queue full");
            self.drop_connection(&conn_id, false);
        }
    }
}
