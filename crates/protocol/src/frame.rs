//! Game-protocol text frames.
//!
//! A frame is a single-letter verb followed by space-separated fields. The
//! relay forwards frames verbatim; it decodes them only to mirror state.

use crate::reader::{FieldReader, FieldWriter};
use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in map pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of size `w`x`h` centred on a point.
    pub fn centered(cx: i32, cy: i32, w: i32, h: i32) -> Self {
        Self::new(cx.saturating_sub(w / 2), cy.saturating_sub(h / 2), w, h)
    }

    /// Exclusive right edge. Fields come off the wire, so this is widened.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.w as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.h as i64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && (x as i64) < self.right() && y >= self.y && (y as i64) < self.bottom()
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x.saturating_add(self.w / 2), self.y.saturating_add(self.h / 2))
    }

    /// Whether the rectangle is non-empty and lies fully inside `width`x`height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && self.x >= 0
            && self.y >= 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }
}

/// Fields of a move (`M`) frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TankState {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub dir: u8,
    pub energy: i32,
    pub health: i32,
    pub score: i32,
    pub name: String,
    pub lives: i32,
}

/// Full map payload carried by `M {json}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPayload {
    pub seed: u32,
    pub width: u32,
    pub height: u32,
    /// Base64 occupancy grid, one byte per cell, row-major.
    pub terrain: String,
    pub layer_a: String,
    pub layer_b: String,
    pub layer_c: String,
}

/// Parsed game frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameFrame {
    /// `M <id> <x> <y> <dir> <energy> <health> <score> <base64name> <lives>`
    Move(TankState),
    /// `J <id>`
    Join { id: u32 },
    /// `B <id> <x> <y> <w> <h>`
    Base { id: u32, rect: Rect },
    /// `D <x> <y> <w> <h>`
    Dig(Rect),
    /// `F <id>`
    Fire { id: u32 },
    /// `L <id> <byId>`
    Lost { id: u32, by: u32 },
    /// `T <base64name> <base64text>`
    Chat { name: String, text: String },
    /// `N <id> <base64name>`
    Name { id: u32, name: String },
    /// `X <id>`
    Exit { id: u32 },
    /// `S <seed>`
    Seed(u32),
    /// `M <json>`, kept as raw JSON.
    Map(String),
    /// `C <json>`, kept as raw JSON.
    Config(String),
}

impl GameFrame {
    /// Parse a frame.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let frame = frame.trim();
        let mut chars = frame.chars();
        let verb = chars.next().ok_or(ProtocolError::Empty)?;
        let rest = chars.as_str();

        // Verbs are a single letter followed by a space or the end of the frame.
        if !rest.is_empty() && !rest.starts_with(' ') {
            let word = frame.split(' ').next().unwrap_or(frame);
            return Err(ProtocolError::UnknownVerb(word.to_string()));
        }
        let rest = rest.trim_start();

        // `M` is overloaded: a JSON body is the full map, anything else a move.
        if verb == 'M' && rest.starts_with('{') {
            return Ok(GameFrame::Map(rest.to_string()));
        }
        if verb == 'C' {
            if rest.starts_with('{') {
                return Ok(GameFrame::Config(rest.to_string()));
            }
            return Err(ProtocolError::MissingField("config"));
        }

        let mut r = FieldReader::new(rest);
        let parsed = match verb {
            'M' => GameFrame::Move(TankState {
                id: r.next_u32("id")?,
                x: r.next_i32("x")?,
                y: r.next_i32("y")?,
                dir: r.next_u8("dir")?,
                energy: r.next_i32("energy")?,
                health: r.next_i32("health")?,
                score: r.next_i32("score")?,
                name: r.next_text("name")?,
                lives: r.next_i32("lives")?,
            }),
            'J' => GameFrame::Join { id: r.next_u32("id")? },
            'B' => GameFrame::Base {
                id: r.next_u32("id")?,
                rect: read_rect(&mut r)?,
            },
            'D' => GameFrame::Dig(read_rect(&mut r)?),
            'F' => GameFrame::Fire { id: r.next_u32("id")? },
            'L' => GameFrame::Lost {
                id: r.next_u32("id")?,
                by: r.next_u32("byId")?,
            },
            'T' => GameFrame::Chat {
                name: r.next_text("name")?,
                text: r.next_text("text")?,
            },
            'N' => GameFrame::Name {
                id: r.next_u32("id")?,
                name: r.next_text("name")?,
            },
            'X' => GameFrame::Exit { id: r.next_u32("id")? },
            'S' => GameFrame::Seed(r.next_u32("seed")?),
            other => return Err(ProtocolError::UnknownVerb(other.to_string())),
        };
        r.finish()?;
        Ok(parsed)
    }

    /// Encode the frame in wire form.
    pub fn encode(&self) -> String {
        match self {
            GameFrame::Move(t) => FieldWriter::new('M')
                .put(t.id)
                .put(t.x)
                .put(t.y)
                .put(t.dir)
                .put(t.energy)
                .put(t.health)
                .put(t.score)
                .put_text(&t.name)
                .put(t.lives)
                .finish(),
            GameFrame::Join { id } => FieldWriter::new('J').put(id).finish(),
            GameFrame::Base { id, rect } => FieldWriter::new('B')
                .put(id)
                .put(rect.x)
                .put(rect.y)
                .put(rect.w)
                .put(rect.h)
                .finish(),
            GameFrame::Dig(rect) => FieldWriter::new('D')
                .put(rect.x)
                .put(rect.y)
                .put(rect.w)
                .put(rect.h)
                .finish(),
            GameFrame::Fire { id } => FieldWriter::new('F').put(id).finish(),
            GameFrame::Lost { id, by } => FieldWriter::new('L').put(id).put(by).finish(),
            GameFrame::Chat { name, text } => {
                FieldWriter::new('T').put_text(name).put_text(text).finish()
            }
            GameFrame::Name { id, name } => FieldWriter::new('N').put(id).put_text(name).finish(),
            GameFrame::Exit { id } => FieldWriter::new('X').put(id).finish(),
            GameFrame::Seed(seed) => FieldWriter::new('S').put(seed).finish(),
            GameFrame::Map(json) => format!("M {json}"),
            GameFrame::Config(json) => format!("C {json}"),
        }
    }

    /// Id of the tank the frame is about, if any.
    pub fn subject(&self) -> Option<u32> {
        match self {
            GameFrame::Move(t) => Some(t.id),
            GameFrame::Join { id }
            | GameFrame::Base { id, .. }
            | GameFrame::Fire { id }
            | GameFrame::Lost { id, .. }
            | GameFrame::Name { id, .. }
            | GameFrame::Exit { id } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for GameFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn read_rect(r: &mut FieldReader<'_>) -> Result<Rect, ProtocolError> {
    Ok(Rect {
        x: r.next_i32("x")?,
        y: r.next_i32("y")?,
        w: r.next_i32("w")?,
        h: r.next_i32("h")?,
    })
}
