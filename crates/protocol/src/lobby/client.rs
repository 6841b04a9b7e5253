//! Client -> server lobby messages.

use super::ConfigPatch;
use serde::{Deserialize, Serialize};

/// Client verbs recognised as control messages.
pub const CLIENT_VERBS: [&str; 6] = [
    "CREATE_ROOM",
    "JOIN_ROOM",
    "LEAVE_ROOM",
    "UPDATE_CONFIG",
    "START_GAME",
    "GAME_CONNECT",
];

/// Parsed lobby request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Create a room and become its host.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_name: String,
        #[serde(default)]
        config: ConfigPatch,
    },
    /// Join a room by code.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        player_name: String,
    },
    /// Leave the current room.
    LeaveRoom,
    /// Host-only configuration change.
    UpdateConfig { config: ConfigPatch },
    /// Host-only game start.
    StartGame,
    /// Bind a game socket to an existing player of a started room.
    #[serde(rename_all = "camelCase")]
    GameConnect { room_code: String, player_id: u32 },
}
