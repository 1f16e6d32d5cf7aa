use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the connection caused a failure
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Who {
    Client,
    Server,
}

impl std::fmt::Display for Who {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Who::Client => write!(f, "client"),
            Who::Server => write!(f, "server"),
        }
    }
}

/// Errors produced while validating, storing or reconciling game state
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or malformed game identifier or payload.
    #[error("invalid request: {details}")]
    InvalidRequest { details: String },

    /// A state or patch that would not produce a fully populated game.
    #[error("invalid update: {details}")]
    InvalidUpdate { details: String },

    #[error("game {gid} does not exist")]
    UnknownGame { gid: String },

    #[error("game {gid} already exists")]
    GameExists { gid: String },

    #[error("unknown sport {sport}")]
    UnknownSport { sport: String },

    /// A client noticed a gap in the revisions it received.
    #[error("game {gid} out of sync: expected revision {expected}, received {received}")]
    Desync {
        gid: String,
        expected: u64,
        received: u64,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Side to blame when this error is reported over the wire
    pub fn who(&self) -> Who {
        match self {
            SyncError::InvalidRequest { .. }
            | SyncError::InvalidUpdate { .. }
            | SyncError::GameExists { .. }
            | SyncError::UnknownSport { .. } => Who::Client,
            SyncError::UnknownGame { .. }
            | SyncError::Desync { .. }
            | SyncError::Serialization(_) => Who::Server,
        }
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        SyncError::InvalidRequest {
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_who_classification() {
        assert_eq!(SyncError::invalid_request("missing gid").who(), Who::Client);
        assert_eq!(
            SyncError::GameExists {
                gid: "g1".to_string()
            }
            .who(),
            Who::Client
        );
        assert_eq!(
            SyncError::UnknownGame {
                gid: "g1".to_string()
            }
            .who(),
            Who::Server
        );
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::Desync {
            gid: "default".to_string(),
            expected: 4,
            received: 6,
        };
        assert_eq!(
            err.to_string(),
            "game default out of sync: expected revision 4, received 6"
        );
        assert_eq!(
            SyncError::invalid_request("missing gid").to_string(),
            "invalid request: missing gid"
        );
    }

    #[test]
    fn test_who_wire_names() {
        assert_eq!(serde_json::to_string(&Who::Client).unwrap(), "\"client\"");
        assert_eq!(Who::Server.to_string(), "server");
    }
}
