use std::collections::HashMap;

use log::{debug, info};
use tokio::sync::mpsc;

pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

#[derive(Debug)]
struct ConnectionEntry {
    tx: mpsc::Sender<OutboundMessage>,
    player_id: Option<String>,
    last_seen_ms: u64,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, ConnectionEntry>,
    active_conn_by_player: HashMap<String, String>,
    next_id: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tx: mpsc::Sender<OutboundMessage>, now_ms: u64) -> String {
        self.next_id = self.next_id.saturating_add(1);
        let conn_id = format!("conn_{}", self.next_id);
        self.connections.insert(
            conn_id.clone(),
            ConnectionEntry {
                tx,
                player_id: None,
                last_seen_ms: now_ms,
            },
        );
        info!("connection {conn_id} opened ({} live)", self.connections.len());
        conn_id
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, conn_id: &str) -> bool {
        self.connections.contains_key(conn_id)
    }

    pub fn touch(&mut self, conn_id: &str, now_ms: u64) {
        if let Some(entry) = self.connections.get_mut(conn_id) {
            entry.last_seen_ms = entry.last_seen_ms.max(now_ms);
        }
    }

    /// A player already bound elsewhere is taken over by the newer
    /// connection.
    pub fn bind(&mut self, conn_id: &str, player_id: &str) {
        if !self.connections.contains_key(conn_id) {
            return;
        }

        if let Some(old_conn_id) = self.active_conn_by_player.get(player_id).cloned() {
            if old_conn_id != conn_id {
                if let Some(old) = self.connections.get_mut(&old_conn_id) {
                    old.player_id = None;
                }
                info!("player {player_id} rebound from {old_conn_id} to {conn_id}");
            }
        }

        if let Some(entry) = self.connections.get_mut(conn_id) {
            entry.player_id = Some(player_id.to_string());
        }
        self.active_conn_by_player
            .insert(player_id.to_string(), conn_id.to_string());
    }

    pub fn player_for(&self, conn_id: &str) -> Option<&str> {
        self.connections
            .get(conn_id)
            .and_then(|entry| entry.player_id.as_deref())
    }

    /// Returns the player the connection was actively bound to.
    pub fn remove(&mut self, conn_id: &str) -> Option<String> {
        let entry = self.connections.remove(conn_id)?;
        info!("connection {conn_id} closed ({} live)", self.connections.len());
        let player_id = entry.player_id?;
        if self.active_conn_by_player.get(&player_id).map(String::as_str) != Some(conn_id) {
            return None;
        }
        self.active_conn_by_player.remove(&player_id);
        Some(player_id)
    }

    pub fn unbind_player(&mut self, player_id: &str) {
        if let Some(conn_id) = self.active_conn_by_player.remove(player_id) {
            if let Some(entry) = self.connections.get_mut(&conn_id) {
                entry.player_id = None;
            }
        }
    }

    pub fn stale_connections(&self, now_ms: u64, heartbeat_ms: u64) -> Vec<String> {
        let mut stale: Vec<String> = self
            .connections
            .iter()
            .filter(|(_, entry)| now_ms.saturating_sub(entry.last_seen_ms) > heartbeat_ms)
            .map(|(conn_id, _)| conn_id.clone())
            .collect();
        stale.sort();
        stale
    }

    pub fn ping_all(&self) {
        for (conn_id, entry) in &self.connections {
            if entry.tx.try_send(OutboundMessage::Ping).is_err() {
                debug!("ping to {conn_id} dropped");
            }
        }
    }

    pub fn close(&self, conn_id: &str, code: u16, reason: &str) {
        if let Some(entry) = self.connections.get(conn_id) {
            let _ = entry.tx.try_send(OutboundMessage::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }

    /// Returns the connections that must be dropped under `DisconnectOnFull`.
    pub fn broadcast(&self, payload: &str, policy: QueuePolicy) -> Vec<String> {
        let mut failed = Vec::new();
        for (conn_id, entry) in &self.connections {
            if entry
                .tx
                .try_send(OutboundMessage::Text(payload.to_string()))
                .is_err()
                && policy == QueuePolicy::DisconnectOnFull
            {
                failed.push(conn_id.clone());
            }
        }
        failed.sort();
        failed
    }
}
