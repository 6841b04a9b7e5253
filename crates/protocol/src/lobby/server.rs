//! Server -> client lobby messages.

use super::RoomConfig;
use serde::{Deserialize, Serialize};

/// Player entry in a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: u32,
    pub name: String,
    pub is_host: bool,
}

/// Full room view sent on create/join and membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub host_id: u32,
    pub started: bool,
    pub map_seed: u32,
    pub config: RoomConfig,
    pub players: Vec<PlayerSummary>,
}

/// Lobby notification or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: String,
        player_id: u32,
        room: RoomSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: String,
        player_id: u32,
        room: RoomSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: u32,
        player_name: String,
        room: RoomSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        player_id: u32,
        host_id: u32,
        room: RoomSnapshot,
    },
    RoomConfigUpdated { config: RoomConfig },
    #[serde(rename_all = "camelCase")]
    GameStarting {
        room_code: String,
        /// Set on the per-connection late-join redirect.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<u32>,
        late_join: bool,
        config: RoomConfig,
        players: Vec<PlayerSummary>,
    },
    #[serde(rename_all = "camelCase")]
    GameConnected { room_code: String, player_id: u32 },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"ERROR","message":"encode failed: {e}"}}"#)
        })
    }

    /// Message type name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::RoomCreated { .. } => "ROOM_CREATED",
            ServerMessage::RoomJoined { .. } => "ROOM_JOINED",
            ServerMessage::PlayerJoined { .. } => "PLAYER_JOINED",
            ServerMessage::PlayerLeft { .. } => "PLAYER_LEFT",
            ServerMessage::RoomConfigUpdated { .. } => "ROOM_CONFIG_UPDATED",
            ServerMessage::GameStarting { .. } => "GAME_STARTING",
            ServerMessage::GameConnected { .. } => "GAME_CONNECTED",
            ServerMessage::Error { .. } => "ERROR",
        }
    }
}
