//! Room operation errors.
//!
//! The `Display` text of each variant is the message sent in `ERROR` frames.

use thiserror::Error;

/// Not-found and precondition failures surfaced to the requesting connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Player not found in room")]
    PlayerNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Game has not started")]
    NotStarted,

    #[error("Room cannot start with the current players and configuration")]
    CannotStart,

    #[error("You are not in a room")]
    NotInRoom,

    #[error("Room has no free player ids")]
    IdsExhausted,
}
