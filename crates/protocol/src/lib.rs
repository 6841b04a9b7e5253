//! Shared protocol crate for tank-relay.
//!
//! This crate contains:
//! - Lobby-control JSON messages (client requests, server notifications)
//! - Game-protocol text frames (`M`, `J`, `B`, `D`, ...)
//! - Player id space shared by humans and AI agents
//! - Inbound frame classification

mod error;
mod ids;
mod reader;
pub mod frame;
pub mod lobby;

pub use error::ProtocolError;
pub use frame::{GameFrame, MapPayload, Rect, TankState};
pub use ids::{AI_ID_BASE, PlayerId};
pub use lobby::{
    AiOpponents, AiOpponentsPatch, ClientMessage, ConfigPatch, Difficulty, Inbound, MAX_PLAYERS,
    Personality, PersonalityMode, PlayerSummary, RoomConfig, RoomSnapshot, ServerMessage,
    classify,
};
pub use reader::{FieldReader, FieldWriter, decode_text, encode_text};
