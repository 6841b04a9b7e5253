//! Per-tick world snapshot handed to agents.

use crate::map::Terrain;
use glam::Vec2;
use protocol::Rect;
use std::collections::HashMap;
use std::time::Instant;

/// What an agent may know about one tank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankView {
    pub id: u32,
    pub pos: Vec2,
    pub health: i32,
    pub energy: i32,
    pub lives: i32,
}

impl TankView {
    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }
}

/// Snapshot of a room at one tick. Every agent of the tick sees the same one.
#[derive(Debug, Clone)]
pub struct WorldState<'a> {
    pub now: Instant,
    pub terrain: &'a Terrain,
    pub tanks: Vec<TankView>,
    /// Announced bases by owner id.
    pub bases: &'a HashMap<u32, Rect>,
}

impl WorldState<'_> {
    pub fn tank(&self, id: u32) -> Option<&TankView> {
        self.tanks.iter().find(|t| t.id == id)
    }

    /// Living tanks other than `self_id` within `radius` of `pos`.
    pub fn enemies_near(&self, self_id: u32, pos: Vec2, radius: f32) -> Vec<TankView> {
        self.tanks
            .iter()
            .filter(|t| t.id != self_id && t.is_alive() && t.pos.distance(pos) <= radius)
            .copied()
            .collect()
    }
}
