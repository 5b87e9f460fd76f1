use thiserror::Error;

use crate::types::GridPos;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("payload is not a json object")]
    InvalidJson,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` has an invalid value")]
    InvalidField(&'static str),

    #[error("unknown message type `{0}`")]
    UnknownMessageType(String),

    #[error("player id is empty")]
    EmptyPlayerId,

    #[error("player id `{0}` uses the reserved shadow suffix")]
    ReservedPlayerId(String),

    #[error("unknown map `{0}`")]
    UnknownMap(String),

    #[error("map `{map}` is malformed: {reason}")]
    InvalidMapData { map: String, reason: String },

    #[error("agent {agent} would leave the path network at ({}, {})", .pos.x, .pos.y)]
    IllegalAgentPosition { agent: String, pos: GridPos },
}
