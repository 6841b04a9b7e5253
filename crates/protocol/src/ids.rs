//! Player id space.
//!
//! Humans and AI agents share one numeric id space on the wire. Human ids live
//! strictly below [`AI_ID_BASE`]; AI ids are `AI_ID_BASE + index`.

use std::fmt;

/// First wire id reserved for AI agents.
pub const AI_ID_BASE: u32 = 1000;

/// A room-scoped participant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlayerId {
    /// Human player, `1..AI_ID_BASE`.
    Human(u32),
    /// AI agent, by per-room agent index.
    Ai(u32),
}

impl PlayerId {
    /// Decode a wire id.
    pub fn from_wire(id: u32) -> Self {
        if id >= AI_ID_BASE {
            PlayerId::Ai(id - AI_ID_BASE)
        } else {
            PlayerId::Human(id)
        }
    }

    /// Encode as the numeric id used in frames.
    pub fn wire(self) -> u32 {
        match self {
            PlayerId::Human(id) => id,
            PlayerId::Ai(index) => AI_ID_BASE.saturating_add(index),
        }
    }

    pub fn is_ai(self) -> bool {
        matches!(self, PlayerId::Ai(_))
    }

    /// Whether a human id is representable without entering the AI range.
    pub fn is_valid_human(id: u32) -> bool {
        id > 0 && id < AI_ID_BASE
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire())
    }
}
