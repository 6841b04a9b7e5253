//! Eight-way compass on the numeric keypad layout.
//!
//! ```text
//! 7 8 9
//! 4 . 6
//! 1 2 3
//! ```
//!
//! Screen coordinates: `y` grows downwards.

use glam::Vec2;
use std::f32::consts::FRAC_PI_4;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    DownLeft = 1,
    Down = 2,
    DownRight = 3,
    Left = 4,
    Right = 6,
    UpLeft = 7,
    Up = 8,
    UpRight = 9,
}

impl Direction {
    /// Clockwise from east, matching 45° sectors of `atan2(dy, dx)`.
    pub const ALL: [Direction; 8] = [
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::DownLeft,
        Direction::Left,
        Direction::UpLeft,
        Direction::Up,
        Direction::UpRight,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bucket a vector into one of eight sectors. Degenerate input faces east.
    pub fn from_vector(dx: f32, dy: f32) -> Self {
        if !dx.is_finite() || !dy.is_finite() || (dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON)
        {
            return Direction::Right;
        }
        let sector = (dy.atan2(dx) / FRAC_PI_4).round() as i32;
        Self::ALL[sector.rem_euclid(8) as usize]
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::DownLeft => (-1, 1),
            Direction::Down => (0, 1),
            Direction::DownRight => (1, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::UpLeft => (-1, -1),
            Direction::Up => (0, -1),
            Direction::UpRight => (1, -1),
        }
    }

    /// Unit vector.
    pub fn vector(self) -> Vec2 {
        let (dx, dy) = self.delta();
        Vec2::new(dx as f32, dy as f32).normalize()
    }

    /// Rotate by `steps` eighths of a turn, clockwise for positive steps.
    pub fn rotate(self, steps: i32) -> Self {
        let index = Self::ALL.iter().position(|&d| d == self).unwrap_or(0) as i32;
        Self::ALL[(index + steps).rem_euclid(8) as usize]
    }

    pub fn opposite(self) -> Self {
        self.rotate(4)
    }
}
