//! Bounded best-effort knowledge an agent accumulates from its snapshots.

use glam::Vec2;
use protocol::Rect;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Cell size of the explored-area grid, in pixels.
pub const EXPLORE_CELL: f32 = 32.0;

const MAX_SIGHTINGS: usize = 16;
const MAX_BASES: usize = 32;
const MAX_EXPLORED: usize = 256;
const SIGHTING_TTL: Duration = Duration::from_secs(10);

/// Last place an enemy was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    pub pos: Vec2,
    pub seen_at: Instant,
}

/// Fixed-capacity set of visited grid cells; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ExploredCells {
    order: VecDeque<(i32, i32)>,
    cells: HashSet<(i32, i32)>,
    capacity: usize,
}

impl ExploredCells {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            cells: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    pub fn key(pos: Vec2) -> (i32, i32) {
        (
            (pos.x / EXPLORE_CELL).floor() as i32,
            (pos.y / EXPLORE_CELL).floor() as i32,
        )
    }

    pub fn visit(&mut self, pos: Vec2) {
        let key = Self::key(pos);
        if !self.cells.insert(key) {
            return;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.cells.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        self.cells.contains(&Self::key(pos))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Agent memory.
#[derive(Debug, Clone)]
pub struct Memory {
    pub sightings: HashMap<u32, Sighting>,
    pub bases: HashMap<u32, Rect>,
    pub explored: ExploredCells,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            sightings: HashMap::new(),
            bases: HashMap::new(),
            explored: ExploredCells::new(MAX_EXPLORED),
        }
    }
}

impl Memory {
    pub fn record_sighting(&mut self, id: u32, pos: Vec2, now: Instant) {
        self.sightings.insert(id, Sighting { pos, seen_at: now });
    }

    pub fn record_base(&mut self, owner: u32, rect: Rect) {
        if self.bases.len() < MAX_BASES || self.bases.contains_key(&owner) {
            self.bases.insert(owner, rect);
        }
    }

    /// Drop stale sightings and keep only the most recent ones.
    pub fn prune(&mut self, now: Instant) {
        self.sightings
            .retain(|_, s| now.saturating_duration_since(s.seen_at) <= SIGHTING_TTL);
        if self.sightings.len() > MAX_SIGHTINGS {
            let mut by_age: Vec<(Instant, u32)> =
                self.sightings.iter().map(|(id, s)| (s.seen_at, *id)).collect();
            by_age.sort_unstable();
            let excess = by_age.len() - MAX_SIGHTINGS;
            for (_, id) in by_age.into_iter().take(excess) {
                self.sightings.remove(&id);
            }
        }
    }

    /// Most recent sighting, ties broken by id for determinism.
    pub fn latest_sighting(&self) -> Option<(u32, Sighting)> {
        self.sightings
            .iter()
            .max_by_key(|(id, s)| (s.seen_at, std::cmp::Reverse(**id)))
            .map(|(id, s)| (*id, *s))
    }
}
