//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown frame verb: {0}")]
    UnknownVerb(String),

    #[error("Missing field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid number in field `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid base64 text in field `{0}`")]
    InvalidText(&'static str),

    #[error("Unexpected trailing fields")]
    TrailingFields,

    #[error("Invalid JSON payload: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e.to_string())
    }
}
