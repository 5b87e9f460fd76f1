use serde_json::{Map, Value};

use crate::constants::REMOTE_SUFFIX;
use crate::error::RelayError;
use crate::types::{Difficulty, GridPos};

const MAX_SAFE_INTEGER_F64: f64 = 9_007_199_254_740_991.0;

/// Accepted spellings of the map field, canonical first.
const MAP_FIELDS: [&str; 3] = ["map", "currentMap", "currentmap"];

#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    Join {
        id: String,
    },
    Update {
        id: String,
        pos: GridPos,
        map: Option<String>,
        remote: Option<GridPos>,
    },
    Leave {
        id: String,
    },
    ZombieGame {
        id: String,
        action: GameAction,
    },
    ZombieFood {
        id: String,
        player: String,
        pos: GridPos,
        score: i64,
        map: Option<String>,
    },
}

impl ClientMessage {
    pub fn player_id(&self) -> &str {
        match self {
            Self::Join { id }
            | Self::Update { id, .. }
            | Self::Leave { id }
            | Self::ZombieGame { id, .. }
            | Self::ZombieFood { id, .. } => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameAction {
    Start {
        difficulty: Difficulty,
        map: Option<String>,
    },
    Stop {
        map: Option<String>,
    },
    Complete {
        player: String,
        survived: bool,
        time: f64,
        score: i64,
    },
}

pub fn parse_client_message(raw: &str) -> Result<ClientMessage, RelayError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| RelayError::InvalidJson)?;
    let object = value.as_object().ok_or(RelayError::InvalidJson)?;
    let message_type = object
        .get("type")
        .ok_or(RelayError::MissingField("type"))?
        .as_str()
        .ok_or(RelayError::InvalidField("type"))?;
    let id = parse_player_id(object)?;

    match message_type {
        "join" => Ok(ClientMessage::Join { id }),
        "leave" => Ok(ClientMessage::Leave { id }),
        "update" => {
            let pos = parse_update_position(object)?;
            let remote = match object.get("remote") {
                None | Some(Value::Null) => None,
                Some(value) => Some(parse_nested_position(value, "remote")?),
            };
            Ok(ClientMessage::Update {
                id,
                pos,
                map: parse_map(object)?,
                remote,
            })
        }
        "zombie_game_update" => {
            let action = parse_game_action(object)?;
            Ok(ClientMessage::ZombieGame { id, action })
        }
        "zombie_game_food" => {
            let player = parse_optional_string(object, "player")?.unwrap_or_else(|| id.clone());
            let pos = GridPos::new(
                parse_coordinate(object.get("x"), "x")?,
                parse_coordinate(object.get("y"), "y")?,
            );
            let score = parse_optional_i64(object.get("score"), "score")?.unwrap_or(0);
            Ok(ClientMessage::ZombieFood {
                id,
                player,
                pos,
                score,
                map: parse_map(object)?,
            })
        }
        other => Err(RelayError::UnknownMessageType(other.to_string())),
    }
}

fn parse_player_id(object: &Map<String, Value>) -> Result<String, RelayError> {
    let raw = object
        .get("id")
        .ok_or(RelayError::MissingField("id"))?
        .as_str()
        .ok_or(RelayError::InvalidField("id"))?;
    let id = raw.trim();
    if id.is_empty() {
        return Err(RelayError::EmptyPlayerId);
    }
    if id.ends_with(REMOTE_SUFFIX) {
        return Err(RelayError::ReservedPlayerId(id.to_string()));
    }
    Ok(id.to_string())
}

fn parse_game_action(object: &Map<String, Value>) -> Result<GameAction, RelayError> {
    let action = object
        .get("action")
        .ok_or(RelayError::MissingField("action"))?
        .as_str()
        .ok_or(RelayError::InvalidField("action"))?;

    match action {
        "start" => {
            let level = parse_optional_i64(object.get("difficulty"), "difficulty")?.unwrap_or(1);
            Ok(GameAction::Start {
                difficulty: Difficulty::from_level(level),
                map: parse_map(object)?,
            })
        }
        "stop" => Ok(GameAction::Stop {
            map: parse_map(object)?,
        }),
        "complete" => {
            let player =
                parse_optional_string(object, "player")?.ok_or(RelayError::MissingField("player"))?;
            let survived = object
                .get("survived")
                .ok_or(RelayError::MissingField("survived"))?
                .as_bool()
                .ok_or(RelayError::InvalidField("survived"))?;
            let time = match object.get("time") {
                None => 0.0,
                Some(value) => value
                    .as_f64()
                    .filter(|time| time.is_finite())
                    .ok_or(RelayError::InvalidField("time"))?,
            };
            let score = parse_optional_i64(object.get("score"), "score")?.unwrap_or(0);
            Ok(GameAction::Complete {
                player,
                survived,
                time,
                score,
            })
        }
        _ => Err(RelayError::InvalidField("action")),
    }
}

fn parse_update_position(object: &Map<String, Value>) -> Result<GridPos, RelayError> {
    if object.contains_key("x") || object.contains_key("y") {
        return Ok(GridPos::new(
            parse_coordinate(object.get("x"), "x")?,
            parse_coordinate(object.get("y"), "y")?,
        ));
    }
    if let Some(value) = object.get("local") {
        return parse_nested_position(value, "local");
    }
    if let Some(value) = object.get("position") {
        return parse_nested_position(value, "position");
    }
    Err(RelayError::MissingField("x"))
}

fn parse_nested_position(value: &Value, field: &'static str) -> Result<GridPos, RelayError> {
    let object = value.as_object().ok_or(RelayError::InvalidField(field))?;
    let x = parse_coordinate(object.get("x"), field)?;
    let y = parse_coordinate(object.get("y"), field)?;
    Ok(GridPos::new(x, y))
}

fn parse_coordinate(value: Option<&Value>, field: &'static str) -> Result<i32, RelayError> {
    let number = value
        .ok_or(RelayError::MissingField(field))?
        .as_f64()
        .ok_or(RelayError::InvalidField(field))?;
    if !number.is_finite() {
        return Err(RelayError::InvalidField(field));
    }
    let floored = number.floor();
    if floored < i32::MIN as f64 || floored > i32::MAX as f64 {
        return Err(RelayError::InvalidField(field));
    }
    Ok(floored as i32)
}

fn parse_map(object: &Map<String, Value>) -> Result<Option<String>, RelayError> {
    for field in MAP_FIELDS {
        let Some(value) = object.get(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let raw = value.as_str().ok_or(RelayError::InvalidField("map"))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(trimmed.to_string()));
    }
    Ok(None)
}

fn parse_optional_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, RelayError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let trimmed = value
                .as_str()
                .ok_or(RelayError::InvalidField(field))?
                .trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

fn parse_optional_i64(value: Option<&Value>, field: &'static str) -> Result<Option<i64>, RelayError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if let Some(number) = value.as_i64() {
        return Ok(Some(number));
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() && number.floor().abs() <= MAX_SAFE_INTEGER_F64 {
            return Ok(Some(number.floor() as i64));
        }
    }
    Err(RelayError::InvalidField(field))
}
