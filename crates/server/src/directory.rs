//! Room directory: owns every room, hands out codes, sweeps dead rooms.

use crate::map::RoomMap;
use crate::room::Room;
use protocol::RoomConfig;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Room code length.
pub const CODE_LEN: usize = 6;
/// Code characters. No `0`/`O`, `1`/`I` lookalikes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<String, Room>,
    timeout: Duration,
}

impl RoomDirectory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            rooms: HashMap::new(),
            timeout,
        }
    }

    /// Create a room under a fresh code. The caller adds the host.
    pub fn create_room(&mut self, config: RoomConfig, map: RoomMap, now: Instant) -> &mut Room {
        let mut rng = rand::rng();
        let code = loop {
            let candidate = generate_code(&mut rng);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        info!("Created room {} (map seed {})", code, map.seed);
        self.rooms
            .entry(code.clone())
            .or_insert_with(|| Room::new(code, config, map, now))
    }

    pub fn get_room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(&code.to_ascii_uppercase())
    }

    pub fn get_room_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(&code.to_ascii_uppercase())
    }

    pub fn remove_room(&mut self, code: &str) -> Option<Room> {
        self.rooms.remove(&code.to_ascii_uppercase())
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.rooms.values_mut()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Remove rooms with nobody connected and no activity within the timeout.
    ///
    /// Victims are collected before anything is removed. Returns their codes
    /// so the caller can release reverse mappings.
    pub fn cleanup_inactive_rooms(&mut self, now: Instant) -> Vec<String> {
        let victims: Vec<String> = self
            .rooms
            .values()
            .filter(|room| !room.is_active(now, self.timeout))
            .map(|room| room.code.clone())
            .collect();

        for code in &victims {
            self.rooms.remove(code);
            info!("Cleaned up inactive room {}", code);
        }
        victims
    }
}

fn generate_code(rng: &mut impl Rng) -> String {
    (0..CODE_LEN)
        .map(|_| *CODE_ALPHABET.choose(rng).unwrap_or(&b'A') as char)
        .collect()
}
