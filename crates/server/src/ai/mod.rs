//! AI opponents.
//!
//! Agents read a per-tick [`WorldState`] snapshot and emit the same discrete
//! actions a human client would send.

pub mod agent;
pub mod bot_manager;
pub mod direction;
pub mod memory;
pub mod profile;
pub mod world;

pub use agent::{AiAction, AiAgent, AiState, LossOutcome};
pub use bot_manager::AiRoster;
pub use direction::Direction;
pub use profile::DifficultyProfile;
pub use world::{TankView, WorldState};

/// Energy bounds shared with human tanks.
pub const MAX_ENERGY: i32 = 1000;
/// Health bounds shared with human tanks.
pub const MAX_HEALTH: i32 = 10;
/// Side of a tank's footprint, in pixels.
pub const TANK_SIZE: i32 = 7;
/// Base footprint, in pixels.
pub const BASE_WIDTH: i32 = 40;
pub const BASE_HEIGHT: i32 = 32;
