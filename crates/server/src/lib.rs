//! Tank relay: room/session manager and frame relay for a tank-combat game.

pub mod ai;
pub mod config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod map;
pub mod registry;
pub mod room;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use connection::{ConnectionId, Outbound};
pub use directory::RoomDirectory;
pub use error::RoomError;
pub use room::Room;
pub use server::{Command, Dispatcher, DispatcherHandle, run, serve, spawn_dispatcher};
