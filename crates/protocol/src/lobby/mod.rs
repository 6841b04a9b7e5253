//! Lobby-control messages.
//!
//! JSON objects discriminated by a `type` field. Inbound text is classified
//! once, at the boundary, into a typed [`Inbound`] value.

mod client;
mod server;

pub use client::*;
pub use server::*;

use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// Largest room a client may configure, AI slots included.
pub const MAX_PLAYERS: u32 = 16;

/// AI difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

/// AI personality tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Aggressive,
    Defensive,
    Balanced,
    Digger,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Aggressive,
        Personality::Defensive,
        Personality::Balanced,
        Personality::Digger,
    ];
}

/// Personality setting for a room's AI opponents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonalityMode {
    Aggressive,
    Defensive,
    Balanced,
    Digger,
    /// Rotate through every personality.
    #[default]
    Mixed,
}

impl PersonalityMode {
    /// The personality every agent gets, or `None` when mixed.
    pub fn fixed(self) -> Option<Personality> {
        match self {
            PersonalityMode::Aggressive => Some(Personality::Aggressive),
            PersonalityMode::Defensive => Some(Personality::Defensive),
            PersonalityMode::Balanced => Some(Personality::Balanced),
            PersonalityMode::Digger => Some(Personality::Digger),
            PersonalityMode::Mixed => None,
        }
    }
}

/// AI opponents requested for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOpponents {
    pub count: u32,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub personality: PersonalityMode,
}

/// Room configuration. Replaced wholesale on update, never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub max_players: u32,
    pub max_lives: u32,
    pub spawn_protection: bool,
    pub sanctuary_zones: bool,
    pub anti_camping: bool,
    pub ai_opponents: AiOpponents,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            max_lives: 3,
            spawn_protection: true,
            sanctuary_zones: true,
            anti_camping: false,
            ai_opponents: AiOpponents::default(),
        }
    }
}

impl RoomConfig {
    /// Return a new configuration with `patch` shallow-merged over `self`.
    pub fn merged(&self, patch: &ConfigPatch) -> RoomConfig {
        let ai = match &patch.ai_opponents {
            Some(ai) => AiOpponents {
                count: ai.count.unwrap_or(self.ai_opponents.count),
                difficulty: ai.difficulty.unwrap_or(self.ai_opponents.difficulty),
                personality: ai.personality.unwrap_or(self.ai_opponents.personality),
            },
            None => self.ai_opponents,
        };

        RoomConfig {
            max_players: patch.max_players.unwrap_or(self.max_players),
            max_lives: patch.max_lives.unwrap_or(self.max_lives),
            spawn_protection: patch.spawn_protection.unwrap_or(self.spawn_protection),
            sanctuary_zones: patch.sanctuary_zones.unwrap_or(self.sanctuary_zones),
            anti_camping: patch.anti_camping.unwrap_or(self.anti_camping),
            ai_opponents: ai,
        }
        .clamped()
    }

    /// Bring sizes into range: at most [`MAX_PLAYERS`] slots, and AI leaves
    /// room for at least one human.
    pub fn clamped(mut self) -> RoomConfig {
        self.max_players = self.max_players.clamp(1, MAX_PLAYERS);
        self.ai_opponents.count = self.ai_opponents.count.min(self.max_players - 1);
        self
    }

    /// Encode as JSON for the `C` frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Partial AI opponent settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOpponentsPatch {
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub personality: Option<PersonalityMode>,
}

/// Partial room configuration; omitted fields keep their current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default)]
    pub max_players: Option<u32>,
    #[serde(default)]
    pub max_lives: Option<u32>,
    #[serde(default)]
    pub spawn_protection: Option<bool>,
    #[serde(default)]
    pub sanctuary_zones: Option<bool>,
    #[serde(default)]
    pub anti_camping: Option<bool>,
    #[serde(default)]
    pub ai_opponents: Option<AiOpponentsPatch>,
}

/// An inbound frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound<'a> {
    /// Lobby-control request.
    Lobby(ClientMessage),
    /// Game-socket handshake binding a connection to an existing player.
    Handshake { room_code: String, player_id: u32 },
    /// Opaque game-protocol frame, relayed verbatim.
    Game(&'a str),
    /// JSON naming a known verb but failing to decode.
    Malformed(ProtocolError),
}

/// Classify a raw inbound text frame.
///
/// Only JSON objects whose `type` names a known client verb are treated as
/// control messages; everything else is a game frame.
pub fn classify(raw: &str) -> Inbound<'_> {
    if !raw.trim_start().starts_with('{') {
        return Inbound::Game(raw);
    }
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Inbound::Game(raw),
    };
    let is_control = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|verb| CLIENT_VERBS.contains(&verb));
    if !is_control {
        return Inbound::Game(raw);
    }

    match serde_json::from_value::<ClientMessage>(value) {
        Ok(ClientMessage::GameConnect {
            room_code,
            player_id,
        }) => Inbound::Handshake {
            room_code,
            player_id,
        },
        Ok(message) => Inbound::Lobby(message),
        Err(e) => Inbound::Malformed(e.into()),
    }
}
