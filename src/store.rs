use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::collision::CollisionGrid;
use crate::constants::{palette_color, MIN_UPDATE_INTERVAL_MS, REMOTE_COLOR, REMOTE_SUFFIX};
use crate::types::{GridPos, PlayerKind, PlayerView};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiryTicket {
    pub player_id: String,
    pub epoch: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Created,
    Restored,
    AlreadyPresent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Unchanged,
    RateLimited,
}

#[derive(Clone, Debug)]
pub struct UpdateInput {
    pub id: String,
    pub pos: GridPos,
    pub map: String,
    pub remote: Option<GridPos>,
}

#[derive(Clone, Debug)]
struct BufferedPlayer {
    player: PlayerView,
    shadow: Option<PlayerView>,
    epoch: u64,
}

#[derive(Debug)]
pub struct PlayerStore {
    players: BTreeMap<String, PlayerView>,
    buffer: HashMap<String, BufferedPlayer>,
    last_update_ms: HashMap<String, u64>,
    min_update_interval_ms: u64,
    next_epoch: u64,
    next_color: usize,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new(MIN_UPDATE_INTERVAL_MS)
    }
}

pub fn shadow_id(player_id: &str) -> String {
    format!("{player_id}{REMOTE_SUFFIX}")
}

impl PlayerStore {
    pub fn new(min_update_interval_ms: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            buffer: HashMap::new(),
            last_update_ms: HashMap::new(),
            min_update_interval_ms,
            next_epoch: 0,
            next_color: 0,
        }
    }

    pub fn get(&self, id: &str) -> Option<&PlayerView> {
        self.players.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_buffered(&self, id: &str) -> bool {
        self.buffer.contains_key(id)
    }

    pub fn snapshot(&self) -> BTreeMap<String, PlayerView> {
        self.players.clone()
    }

    pub fn active_players_on(&self, map: &str) -> Vec<&PlayerView> {
        self.players
            .values()
            .filter(|player| {
                player.connected && player.kind == PlayerKind::Local && player.map == map
            })
            .collect()
    }

    pub fn join(&mut self, id: &str, grid: &CollisionGrid) -> JoinOutcome {
        if self.restore(id) {
            return JoinOutcome::Restored;
        }
        if self.players.contains_key(id) {
            return JoinOutcome::AlreadyPresent;
        }
        let player = self.fresh_player(id, grid.spawn, &grid.name);
        self.players.insert(id.to_string(), player);
        JoinOutcome::Created
    }

    /// `grid` must be the collision grid of `input.map`.
    pub fn update(&mut self, input: UpdateInput, grid: &CollisionGrid, now_ms: u64) -> UpdateOutcome {
        if let Some(last) = self.last_update_ms.get(&input.id) {
            if now_ms.saturating_sub(*last) < self.min_update_interval_ms {
                debug!("update from {} dropped by rate limit", input.id);
                return UpdateOutcome::RateLimited;
            }
        }
        self.last_update_ms.insert(input.id.clone(), now_ms);

        let mut changed = self.restore(&input.id);

        let pos = corrected_player_pos(grid, input.pos);
        match self.players.get_mut(&input.id) {
            Some(player) => {
                if player.pos() != pos || player.map != input.map {
                    player.x = pos.x;
                    player.y = pos.y;
                    player.map = input.map.clone();
                    changed = true;
                }
            }
            None => {
                let player = self.fresh_player(&input.id, pos, &input.map);
                self.players.insert(input.id.clone(), player);
                changed = true;
            }
        }

        if let Some(remote) = input.remote {
            let remote = corrected_player_pos(grid, remote);
            let key = shadow_id(&input.id);
            match self.players.get_mut(&key) {
                Some(shadow) => {
                    if shadow.pos() != remote || shadow.map != input.map {
                        shadow.x = remote.x;
                        shadow.y = remote.y;
                        shadow.map = input.map.clone();
                        changed = true;
                    }
                }
                None => {
                    self.players.insert(
                        key.clone(),
                        PlayerView {
                            id: key,
                            x: remote.x,
                            y: remote.y,
                            map: input.map.clone(),
                            color: REMOTE_COLOR.to_string(),
                            kind: PlayerKind::Remote,
                            connected: true,
                        },
                    );
                    changed = true;
                }
            }
        }

        if changed {
            UpdateOutcome::Applied
        } else {
            UpdateOutcome::Unchanged
        }
    }

    pub fn leave(&mut self, id: &str) -> Option<ExpiryTicket> {
        let player = self.players.get_mut(id)?;
        player.connected = false;
        let player = player.clone();
        let shadow = self.players.get_mut(&shadow_id(id)).map(|shadow| {
            shadow.connected = false;
            shadow.clone()
        });

        self.next_epoch = self.next_epoch.saturating_add(1);
        let epoch = self.next_epoch;
        self.buffer.insert(
            id.to_string(),
            BufferedPlayer {
                player,
                shadow,
                epoch,
            },
        );
        Some(ExpiryTicket {
            player_id: id.to_string(),
            epoch,
        })
    }

    /// A rejoin or a newer leave invalidates older tickets.
    pub fn expire(&mut self, ticket: &ExpiryTicket) -> bool {
        let current = self
            .buffer
            .get(&ticket.player_id)
            .map(|buffered| buffered.epoch == ticket.epoch)
            .unwrap_or(false);
        if !current {
            return false;
        }
        self.buffer.remove(&ticket.player_id);
        self.players.remove(&ticket.player_id);
        self.players.remove(&shadow_id(&ticket.player_id));
        self.last_update_ms.remove(&ticket.player_id);
        true
    }

    fn restore(&mut self, id: &str) -> bool {
        let Some(buffered) = self.buffer.remove(id) else {
            return false;
        };
        let mut player = buffered.player;
        player.connected = true;
        self.players.insert(id.to_string(), player);
        if let Some(mut shadow) = buffered.shadow {
            shadow.connected = true;
            self.players.insert(shadow.id.clone(), shadow);
        }
        true
    }

    fn fresh_player(&mut self, id: &str, pos: GridPos, map: &str) -> PlayerView {
        let color = palette_color(self.next_color).to_string();
        self.next_color = self.next_color.wrapping_add(1);
        PlayerView {
            id: id.to_string(),
            x: pos.x,
            y: pos.y,
            map: map.to_string(),
            color,
            kind: PlayerKind::Local,
            connected: true,
        }
    }
}

fn corrected_player_pos(grid: &CollisionGrid, pos: GridPos) -> GridPos {
    if grid.is_player_walkable(pos) {
        return pos;
    }
    let corrected = grid.nearest_player_walkable(pos);
    debug!(
        "corrected illegal position ({}, {}) to ({}, {}) on {}",
        pos.x, pos.y, corrected.x, corrected.y, grid.name
    );
    corrected
}
