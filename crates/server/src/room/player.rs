use crate::ai::TankView;
use crate::connection::{ConnectionClosed, Outbound};
use glam::Vec2;
use protocol::{PlayerSummary, TankState};

/// A human member of a room.
#[derive(Debug)]
pub struct Player {
    pub id: u32,
    pub name: String,
    /// Absent between the lobby socket closing and the game socket binding.
    pub connection: Option<Outbound>,
    /// Last move frame this player's tank was reported with.
    pub tank: Option<TankState>,
}

impl Player {
    pub fn new(id: u32, name: impl Into<String>, connection: Option<Outbound>) -> Self {
        Self {
            id,
            name: name.into(),
            connection,
            tank: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Outbound::is_open)
    }

    pub fn send(&self, frame: &str) -> Result<(), ConnectionClosed> {
        match &self.connection {
            Some(conn) => conn.send(frame),
            None => Err(ConnectionClosed(0)),
        }
    }

    pub fn summary(&self, is_host: bool) -> PlayerSummary {
        PlayerSummary {
            id: self.id,
            name: self.name.clone(),
            is_host,
        }
    }

    /// What AI agents get to see of this player.
    pub fn view(&self) -> Option<TankView> {
        self.tank.as_ref().map(|t| TankView {
            id: self.id,
            pos: Vec2::new(t.x as f32, t.y as f32),
            health: t.health,
            energy: t.energy,
            lives: t.lives,
        })
    }
}
