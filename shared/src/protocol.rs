//! Wire events exchanged over the WebSocket connection
//!
//! Every frame is a JSON text message tagged by `"event"`, for example
//! `{"event":"partialState","gid":"default","patch":{"away":{"score":2}}}`.
//! Inbound payloads are kept untyped so the server can report a malformed
//! payload back to the sender instead of dropping the frame.

use crate::error::{SyncError, Who};
use crate::state::{GameState, PartialState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events sent by clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    GetFullState {
        #[serde(default)]
        gid: String,
    },
    FullState {
        #[serde(default)]
        gid: String,
        #[serde(default)]
        state: Option<Value>,
    },
    PartialState {
        #[serde(default)]
        gid: String,
        #[serde(default)]
        patch: Option<Value>,
    },
    New {
        #[serde(default)]
        gid: String,
    },
    CreateGame {
        #[serde(default)]
        gid: String,
        #[serde(default)]
        sport: String,
    },
    DeleteGame {
        #[serde(default)]
        gid: String,
    },
    CustomEvent {
        #[serde(default)]
        gid: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        data: Value,
    },
    ListSports,
    Ping {
        #[serde(default)]
        nonce: Option<u64>,
    },
    Pong {
        #[serde(default)]
        nonce: Option<u64>,
    },
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self, SyncError> {
        serde_json::from_str(text).map_err(|e| SyncError::InvalidRequest {
            details: format!("malformed message: {}", e),
        })
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::GetFullState { .. } => "getFullState",
            ClientEvent::FullState { .. } => "fullState",
            ClientEvent::PartialState { .. } => "partialState",
            ClientEvent::New { .. } => "new",
            ClientEvent::CreateGame { .. } => "createGame",
            ClientEvent::DeleteGame { .. } => "deleteGame",
            ClientEvent::CustomEvent { .. } => "customEvent",
            ClientEvent::ListSports => "listSports",
            ClientEvent::Ping { .. } => "ping",
            ClientEvent::Pong { .. } => "pong",
        }
    }

    /// True for events that change stored state and are answered with an ack
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClientEvent::FullState { .. } | ClientEvent::PartialState { .. }
        )
    }

    pub fn full_state(gid: &str, state: &GameState) -> Result<Self, SyncError> {
        Ok(ClientEvent::FullState {
            gid: gid.to_string(),
            state: Some(state.to_value()?),
        })
    }

    pub fn partial_state(gid: &str, patch: &PartialState) -> Self {
        ClientEvent::PartialState {
            gid: gid.to_string(),
            patch: Some(patch.clone().into_value()),
        }
    }
}

/// Events sent by the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    FullState {
        gid: String,
        revision: u64,
        state: GameState,
    },
    PartialState {
        gid: String,
        revision: u64,
        patch: PartialState,
    },
    #[serde(rename = "newGID")]
    NewGid { gid: String },
    Ack { gid: String, revision: u64 },
    Heartbeat { gid: String, revision: u64 },
    GameDeleted { gid: String },
    Custom {
        gid: String,
        name: String,
        data: Value,
    },
    Sports { sports: Vec<String> },
    Error { who: Who, details: String },
    Ping {
        #[serde(default)]
        nonce: Option<u64>,
    },
    Pong {
        #[serde(default)]
        nonce: Option<u64>,
    },
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(err: &SyncError) -> Self {
        ServerEvent::Error {
            who: err.who(),
            details: err.to_string(),
        }
    }

    /// Game the event belongs to, if it is scoped to one
    pub fn gid(&self) -> Option<&str> {
        match self {
            ServerEvent::FullState { gid, .. }
            | ServerEvent::PartialState { gid, .. }
            | ServerEvent::NewGid { gid }
            | ServerEvent::Ack { gid, .. }
            | ServerEvent::Heartbeat { gid, .. }
            | ServerEvent::GameDeleted { gid }
            | ServerEvent::Custom { gid, .. } => Some(gid),
            ServerEvent::Sports { .. }
            | ServerEvent::Error { .. }
            | ServerEvent::Ping { .. }
            | ServerEvent::Pong { .. } => None,
        }
    }
}
