//! Territory and terrain grids
//!
//! The territory grid is the contested resource: one owner (or neutral) per
//! cell, mutated only through `paint_area`. The terrain grid is a static
//! modifier layer generated once per match.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tuning::TerrainTuning;

/// Stable player index
pub type PlayerId = u8;

/// Integer offsets inside a disc of `radius` (`dx² + dy² <= r²`)
pub fn disc_offsets(radius: i32) -> impl Iterator<Item = (i32, i32)> {
    let r = radius.max(0);
    (-r..=r).flat_map(move |dy| {
        (-r..=r)
            .filter(move |dx| dx * dx + dy * dy <= r * r)
            .map(move |dx| (dx, dy))
    })
}

/// Per-cell ownership map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerritoryGrid {
    size: usize,
    cells: Vec<Option<PlayerId>>,
    /// Set by `paint_area`, cleared when counts are recomputed
    #[serde(skip)]
    dirty: bool,
}

impl TerritoryGrid {
    /// All-neutral grid of `size` × `size`
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
            dirty: false,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn area(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let size = self.size as i32;
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some(y as usize * self.size + x as usize)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// Owner of a cell; `None` for neutral or out of bounds
    #[inline]
    pub fn owner(&self, x: i32, y: i32) -> Option<PlayerId> {
        self.index(x, y).and_then(|i| self.cells[i])
    }

    /// Reset every cell to neutral
    pub fn clear(&mut self) {
        self.cells.fill(None);
        self.dirty = false;
    }

    /// Whether any cell changed owner since the last `take_dirty`
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Count owned cells per player, returning (per-player counts, neutral count)
    pub fn counts(&self, player_count: usize) -> (Vec<u32>, u32) {
        let mut counts = vec![0u32; player_count];
        let mut neutral = 0u32;
        for cell in &self.cells {
            match cell {
                Some(owner) if (*owner as usize) < player_count => counts[*owner as usize] += 1,
                // Owners outside the player list cannot be painted; count as neutral
                _ => neutral += 1,
            }
        }
        (counts, neutral)
    }

    /// Raw cells in row-major order (for renderers)
    pub fn cells(&self) -> &[Option<PlayerId>] {
        &self.cells
    }
}

/// Paint a disc of `radius` around (cx, cy) for `player`
///
/// Returns how many cells changed owner. This is the only mutator of
/// territory ownership.
pub fn paint_area(
    grid: &mut TerritoryGrid,
    cx: i32,
    cy: i32,
    player: PlayerId,
    radius: i32,
) -> u32 {
    let mut painted = 0;
    for (dx, dy) in disc_offsets(radius) {
        if let Some(i) = grid.index(cx + dx, cy + dy) {
            if grid.cells[i] != Some(player) {
                grid.cells[i] = Some(player);
                painted += 1;
            }
        }
    }
    if painted > 0 {
        grid.dirty = true;
    }
    painted
}

/// Paint a player's starting base disc
pub fn initialize_territory(
    grid: &mut TerritoryGrid,
    player: PlayerId,
    base: (i32, i32),
    radius: i32,
) -> u32 {
    paint_area(grid, base.0, base.1, player, radius)
}

/// Static terrain modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Normal,
    /// Defense bonus, slight slowdown
    Highground,
    /// Heavy slowdown
    Obstacle,
    /// Heals units standing on it
    Supply,
}

/// Number of terrain features placed by `generate`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrainSummary {
    pub highground: u32,
    pub obstacles: u32,
    pub supply: u32,
}

/// Static per-match terrain layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    size: usize,
    cells: Vec<TerrainKind>,
}

impl TerrainGrid {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![TerrainKind::Normal; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Terrain under a cell; out-of-bounds reads as `Normal`
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> TerrainKind {
        let size = self.size as i32;
        if x < 0 || y < 0 || x >= size || y >= size {
            return TerrainKind::Normal;
        }
        self.cells[y as usize * self.size + x as usize]
    }

    pub fn clear(&mut self) {
        self.cells.fill(TerrainKind::Normal);
    }

    /// Stamp a disc of terrain, clipped to the grid (last write wins)
    pub fn fill_disc(&mut self, cx: i32, cy: i32, radius: i32, kind: TerrainKind) {
        let size = self.size as i32;
        for (dx, dy) in disc_offsets(radius) {
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < size && y < size {
                self.cells[y as usize * self.size + x as usize] = kind;
            }
        }
    }

    /// Scatter highground, obstacle and supply discs over the map
    ///
    /// Generators run in that order; overlapping discs keep the later kind.
    pub fn generate<R: Rng>(&mut self, tuning: &TerrainTuning, rng: &mut R) -> TerrainSummary {
        let size = self.size as i32;
        let mut summary = TerrainSummary::default();
        if size == 0 {
            return summary;
        }

        for _ in 0..tuning.highground_count {
            let r = rng.random_range(tuning.highground_radius.0..=tuning.highground_radius.1);
            let (x, y) = (rng.random_range(0..size), rng.random_range(0..size));
            self.fill_disc(x, y, r, TerrainKind::Highground);
            summary.highground += 1;
        }
        for _ in 0..tuning.obstacle_count {
            let r = rng.random_range(tuning.obstacle_radius.0..=tuning.obstacle_radius.1);
            let (x, y) = (rng.random_range(0..size), rng.random_range(0..size));
            self.fill_disc(x, y, r, TerrainKind::Obstacle);
            summary.obstacles += 1;
        }
        for _ in 0..tuning.supply_count {
            self.fill_disc(
                rng.random_range(0..size),
                rng.random_range(0..size),
                tuning.supply_radius,
                TerrainKind::Supply,
            );
            summary.supply += 1;
        }

        summary
    }

    /// Number of cells of a given kind
    pub fn count(&self, kind: TerrainKind) -> usize {
        self.cells.iter().filter(|&&k| k == kind).count()
    }

    pub fn cells(&self) -> &[TerrainKind] {
        &self.cells
    }
}
