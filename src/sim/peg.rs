//! Peg field shared by every player's ball
//!
//! The layout is fixed per match; only peg kinds change when the engine
//! refreshes them.

use glam::Vec2;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::weighted::WeightedTable;
use crate::tuning::EngineTuning;

/// Peg types (affect combo scoring)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PegKind {
    #[default]
    Normal,
    Gold,
    Red,
}

impl PegKind {
    /// Combo points awarded when a ball hits this peg
    pub fn combo_points(self) -> i32 {
        match self {
            PegKind::Normal => 1,
            PegKind::Gold => 3,
            PegKind::Red => -2,
        }
    }
}

/// A peg in ball-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peg {
    pub pos: Vec2,
    pub kind: PegKind,
}

impl Peg {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            kind: PegKind::Normal,
        }
    }
}

/// Build the staggered multi-row peg layout for a field
///
/// Rows start a sixth of the way down and stop short of the floor so the
/// ball always has a clear drop to the exit line.
pub fn generate_layout(width: f32, height: f32) -> Vec<Peg> {
    let spacing = width / 10.0;
    let row_spacing = spacing * 1.1;
    let top = height / 6.0;
    let bottom = height - height / 6.0;

    let mut pegs = Vec::new();
    let mut row = 0u32;
    let mut y = top;
    while y <= bottom {
        // Odd rows are shifted half a slot and lose one peg
        let offset = if row % 2 == 1 { spacing * 0.5 } else { 0.0 };
        let mut x = spacing + offset;
        while x <= width - spacing + 0.01 - offset {
            pegs.push(Peg::new(x, y));
            x += spacing;
        }
        y += row_spacing;
        row += 1;
    }
    pegs
}

/// Return every peg to `Normal`
pub fn reset_kinds(pegs: &mut [Peg]) {
    for peg in pegs.iter_mut() {
        peg.kind = PegKind::Normal;
    }
}

/// Peg kind weights for a player with the given dominance
///
/// More territory tilts the draw toward gold, less territory toward red.
pub fn refresh_weights(dominance: f32, tuning: &EngineTuning) -> [(f32, PegKind); 3] {
    let d = dominance.clamp(0.0, 1.0);
    [
        (1.0, PegKind::Normal),
        (tuning.gold_base + tuning.gold_gain * d, PegKind::Gold),
        (tuning.red_base + tuning.red_gain * (1.0 - d), PegKind::Red),
    ]
}

/// Re-roll the kind of a random subset of pegs for one player
///
/// Returns (gold, red) counts among the re-rolled pegs.
pub fn refresh_for_player<R: Rng>(
    pegs: &mut [Peg],
    dominance: f32,
    tuning: &EngineTuning,
    rng: &mut R,
) -> (u32, u32) {
    let table = match WeightedTable::new(refresh_weights(dominance, tuning)) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("Skipping peg refresh: {}", e);
            return (0, 0);
        }
    };

    let amount = tuning.pegs_per_player.min(pegs.len());
    let mut gold = 0;
    let mut red = 0;
    for i in index::sample(rng, pegs.len(), amount) {
        let kind = *table.sample(rng);
        match kind {
            PegKind::Gold => gold += 1,
            PegKind::Red => red += 1,
            PegKind::Normal => {}
        }
        pegs[i].kind = kind;
    }
    (gold, red)
}
