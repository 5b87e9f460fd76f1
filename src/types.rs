use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance_sq(self, other: GridPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: GridPos) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }
}

/// Pursuit difficulty tier, 1 through 3 on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=1 => Self::Easy,
            2 => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Local,
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub map: String,
    pub color: String,
    pub kind: PlayerKind,
    pub connected: bool,
}

impl PlayerView {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Wandering,
    Chasing,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub map: String,
    pub mode: AgentMode,
    pub target: Option<String>,
}

impl AgentView {
    pub fn pos(&self) -> GridPos {
        GridPos::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GameCommand {
    Start {
        map: String,
        difficulty: Difficulty,
        #[serde(rename = "zombieCount")]
        zombie_count: usize,
        #[serde(rename = "tickMs")]
        tick_ms: u64,
        #[serde(rename = "detectionRadius")]
        detection_radius: f64,
    },
    Stop {
        map: String,
    },
    Caught {
        map: String,
        player: String,
        zombie: String,
    },
    ZombieSlowed {
        map: String,
        player: String,
        x: i32,
        y: i32,
        score: i64,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        #[serde(rename = "tickMs")]
        tick_ms: u64,
    },
    ZombieSpeedNormal {
        map: String,
        #[serde(rename = "tickMs")]
        tick_ms: u64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GameUpdate {
    PlayerResult {
        player: String,
        survived: bool,
        time: f64,
        score: i64,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Positions {
        players: BTreeMap<String, PlayerView>,
    },
    PlayerTimeout {
        id: String,
    },
    ZombiePosition {
        id: String,
        x: i32,
        y: i32,
        map: String,
    },
    ZombieGameCommand(GameCommand),
    ZombieGameUpdate(GameUpdate),
}

impl ServerMessage {
    pub fn zombie_position(agent: &AgentView) -> Self {
        Self::ZombiePosition {
            id: agent.id.clone(),
            x: agent.x,
            y: agent.y,
            map: agent.map.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionStatus {
    pub map: String,
    pub active: bool,
    pub difficulty: Option<Difficulty>,
    #[serde(rename = "agentCount")]
    pub agent_count: usize,
    #[serde(rename = "baselineTickMs")]
    pub baseline_tick_ms: u64,
    #[serde(rename = "tickMs")]
    pub tick_ms: u64,
    #[serde(rename = "detectionRadius")]
    pub detection_radius: f64,
    pub slowed: bool,
    #[serde(rename = "startedAt")]
    pub started_at: Option<String>,
    pub agents: Vec<AgentView>,
}
