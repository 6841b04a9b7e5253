//! Map data and the terrain generator collaborator.
//!
//! The relay treats generated layers as opaque bytes forwarded to clients. It
//! only reads the occupancy grid, which AI agents use to steer and dig.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use protocol::{GameFrame, MapPayload, Rect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Dug-out tunnel (never produced by the generator).
pub const CELL_OPEN: u8 = 0;
/// Diggable dirt.
pub const CELL_DIRT: u8 = 1;
/// Solid rock.
pub const CELL_ROCK: u8 = 2;

/// Largest accepted map side, in cells.
const MAX_SIDE: u32 = 4096;

/// Map generation failures. All of them fall back to a seed-only map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("invalid map dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("map generation is disabled")]
    Disabled,
}

/// Occupancy grid, one cell per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terrain {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl Terrain {
    /// Fully dug-out terrain, used when no grid is known.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![CELL_OPEN; width as usize * height as usize],
        }
    }

    pub fn from_cells(width: u32, height: u32, cells: Vec<u8>) -> Option<Self> {
        (cells.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            cells,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Cell value, or `None` outside the map.
    pub fn cell(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Rock or outside the map.
    pub fn is_blocked(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_none_or(|c| c == CELL_ROCK)
    }

    /// Cell bounds of `rect` clipped to the map, as `(x0, y0, x1, y1)`.
    fn clip(&self, rect: Rect) -> Option<(i32, i32, i32, i32)> {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.right().min(self.width as i64) as i32;
        let y1 = rect.bottom().min(self.height as i64) as i32;
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    /// Whether any cell of `rect` is rock or outside the map.
    pub fn rect_blocked(&self, rect: Rect) -> bool {
        if rect.w <= 0 || rect.h <= 0 {
            return false;
        }
        if !rect.fits_within(self.width, self.height) {
            return true;
        }
        (rect.y..rect.y + rect.h).any(|y| (rect.x..rect.x + rect.w).any(|x| self.is_blocked(x, y)))
    }

    /// Whether any cell of `rect` still holds dirt.
    pub fn rect_has_dirt(&self, rect: Rect) -> bool {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return false;
        };
        (y0..y1).any(|y| (x0..x1).any(|x| self.cell(x, y) == Some(CELL_DIRT)))
    }

    /// Clear the dirt inside `rect`. Rock is untouched. Returns cells changed.
    pub fn dig(&mut self, rect: Rect) -> usize {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return 0;
        };
        let mut changed = 0;
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                let cell = &mut self.cells[row + x as usize];
                if *cell == CELL_DIRT {
                    *cell = CELL_OPEN;
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Clear everything inside `rect`, rock included. Used for bases.
    pub fn clear(&mut self, rect: Rect) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                self.cells[row + x as usize] = CELL_OPEN;
            }
        }
    }
}

/// Generated map: terrain grid plus three opaque raster layers.
#[derive(Debug, Clone)]
pub struct MapData {
    pub seed: u32,
    pub terrain: Terrain,
    pub layers: [Vec<u8>; 3],
}

impl MapData {
    pub fn payload(&self) -> MapPayload {
        MapPayload {
            seed: self.seed,
            width: self.terrain.width(),
            height: self.terrain.height(),
            terrain: STANDARD.encode(self.terrain.cells()),
            layer_a: STANDARD.encode(&self.layers[0]),
            layer_b: STANDARD.encode(&self.layers[1]),
            layer_c: STANDARD.encode(&self.layers[2]),
        }
    }
}

/// Terrain generator collaborator.
pub trait MapGenerator: Send {
    fn generate(&self, seed: u32, width: u32, height: u32) -> Result<MapData, MapError>;
}

/// Map attached to a room: generated data, or just the seed when generation failed.
#[derive(Debug, Clone)]
pub struct RoomMap {
    pub seed: u32,
    pub width: u32,
    pub height: u32,
    /// Pristine generated grid (digs are applied to the room's own copy).
    data: Option<MapData>,
    /// Pre-encoded map frame (`M {json}` or `S <seed>`).
    frame: String,
}

impl RoomMap {
    /// Generate a map, degrading to seed-only when the generator fails.
    pub fn generate(generator: &dyn MapGenerator, seed: u32, width: u32, height: u32) -> Self {
        match generator.generate(seed, width, height) {
            Ok(data) => Self::from_data(data),
            Err(e) => {
                tracing::warn!("Map generation failed for seed {}: {}; using seed fallback", seed, e);
                Self::seed_only(seed, width, height)
            }
        }
    }

    pub fn from_data(data: MapData) -> Self {
        let frame = match serde_json::to_string(&data.payload()) {
            Ok(json) => GameFrame::Map(json).encode(),
            Err(_) => GameFrame::Seed(data.seed).encode(),
        };
        Self {
            seed: data.seed,
            width: data.terrain.width(),
            height: data.terrain.height(),
            data: Some(data),
            frame,
        }
    }

    pub fn seed_only(seed: u32, width: u32, height: u32) -> Self {
        Self {
            seed,
            width,
            height,
            data: None,
            frame: GameFrame::Seed(seed).encode(),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.data.is_some()
    }

    /// Frame delivered to a newly connected game socket.
    pub fn frame(&self) -> &str {
        &self.frame
    }

    /// Working copy of the terrain. Seed-only maps are treated as open ground.
    pub fn terrain(&self) -> Terrain {
        match &self.data {
            Some(data) => data.terrain.clone(),
            None => Terrain::open(self.width, self.height),
        }
    }
}

/// Always fails; forces the seed-only fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeedOnly;

impl MapGenerator for SeedOnly {
    fn generate(&self, _seed: u32, _width: u32, _height: u32) -> Result<MapData, MapError> {
        Err(MapError::Disabled)
    }
}

/// Seeded value-noise generator producing rock pockets in dirt.
#[derive(Debug, Clone, Copy)]
pub struct NoiseMapGenerator {
    /// Noise value above which a cell is rock.
    pub rock_threshold: f32,
    /// Solid frame around the map edge, in cells.
    pub border: u32,
}

impl Default for NoiseMapGenerator {
    fn default() -> Self {
        Self {
            rock_threshold: 0.68,
            border: 4,
        }
    }
}

impl MapGenerator for NoiseMapGenerator {
    fn generate(&self, seed: u32, width: u32, height: u32) -> Result<MapData, MapError> {
        if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
            return Err(MapError::InvalidDimensions { width, height });
        }

        let mut rng = StdRng::seed_from_u64(seed as u64);
        let coarse = ValueNoise::new(&mut rng, width, height, 48);
        let fine = ValueNoise::new(&mut rng, width, height, 12);

        let len = width as usize * height as usize;
        let mut cells = Vec::with_capacity(len);
        let mut layer_a = Vec::with_capacity(len);
        let mut layer_b = Vec::with_capacity(len);
        let mut layer_c = Vec::with_capacity(len);

        for y in 0..height {
            for x in 0..width {
                let n = coarse.sample(x, y) * 0.75 + fine.sample(x, y) * 0.25;
                let edge = x < self.border
                    || y < self.border
                    || x >= width - self.border.min(width)
                    || y >= height - self.border.min(height);
                let rock = edge || n > self.rock_threshold;
                cells.push(if rock { CELL_ROCK } else { CELL_DIRT });

                // Palette indices: dirt shades 1..=4, rock shades 5..=7.
                let jitter: u8 = rng.random_range(0..4);
                layer_a.push(if rock { 5 + jitter.min(2) } else { 1 + jitter });
                layer_b.push((fine.sample(x, y) * 3.0) as u8);
                layer_c.push(if rng.random_bool(0.02) { 1 } else { 0 });
            }
        }

        let terrain = Terrain::from_cells(width, height, cells)
            .ok_or(MapError::InvalidDimensions { width, height })?;
        Ok(MapData {
            seed,
            terrain,
            layers: [layer_a, layer_b, layer_c],
        })
    }
}

/// Bilinearly interpolated lattice noise.
struct ValueNoise {
    step: u32,
    cols: u32,
    lattice: Vec<f32>,
}

impl ValueNoise {
    fn new(rng: &mut StdRng, width: u32, height: u32, step: u32) -> Self {
        let cols = width / step + 2;
        let rows = height / step + 2;
        let lattice = (0..cols * rows).map(|_| rng.random::<f32>()).collect();
        Self {
            step,
            cols,
            lattice,
        }
    }

    fn sample(&self, x: u32, y: u32) -> f32 {
        let gx = x / self.step;
        let gy = y / self.step;
        let tx = (x % self.step) as f32 / self.step as f32;
        let ty = (y % self.step) as f32 / self.step as f32;
        let at = |cx: u32, cy: u32| self.lattice[(cy * self.cols + cx) as usize];
        let top = at(gx, gy) * (1.0 - tx) + at(gx + 1, gy) * tx;
        let bottom = at(gx, gy + 1) * (1.0 - tx) + at(gx + 1, gy + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}
