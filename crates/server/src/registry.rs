//! Connection registry: which player and room each live connection speaks for.

use crate::connection::ConnectionId;
use std::collections::HashMap;

/// Player/room pair a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub player_id: u32,
    pub room_code: String,
}

/// Pure lookup table from connection to binding.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    bindings: HashMap<ConnectionId, Binding>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection, replacing any previous binding.
    pub fn bind(&mut self, conn: ConnectionId, player_id: u32, room_code: &str) -> Option<Binding> {
        self.bindings.insert(
            conn,
            Binding {
                player_id,
                room_code: room_code.to_string(),
            },
        )
    }

    pub fn lookup(&self, conn: ConnectionId) -> Option<&Binding> {
        self.bindings.get(&conn)
    }

    pub fn unbind(&mut self, conn: ConnectionId) -> Option<Binding> {
        self.bindings.remove(&conn)
    }

    /// Drop every binding that points at `room_code`. Returns how many were removed.
    pub fn release_room(&mut self, room_code: &str) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|_, b| b.room_code != room_code);
        before - self.bindings.len()
    }

    /// Drop every binding that speaks for `player_id` in `room_code`.
    pub fn release_player(&mut self, room_code: &str, player_id: u32) -> Vec<ConnectionId> {
        let released: Vec<ConnectionId> = self
            .bindings
            .iter()
            .filter(|(_, b)| b.room_code == room_code && b.player_id == player_id)
            .map(|(conn, _)| *conn)
            .collect();
        for conn in &released {
            self.bindings.remove(conn);
        }
        released
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
