//! Peg Siege - pinball reward loops driving a grid territory war
//!
//! Core modules:
//! - `sim`: Simulation engine (ball/peg physics, units, territory, match flow)
//! - `tuning`: Data-driven game balance
//! - `error`: Configuration and setup errors
//!
//! Rendering and UI live outside this crate. They read `sim::GameState`
//! once per frame and never mutate it.

pub mod error;
pub mod sim;
pub mod tuning;

pub use error::SimError;
pub use tuning::Tuning;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Territory/terrain grid edge length (cells)
    pub const MAP_GRID_SIZE: usize = 100;
    /// Total number of grid cells
    pub const GRID_AREA: usize = MAP_GRID_SIZE * MAP_GRID_SIZE;

    /// Ball field dimensions (ball-local coordinate space)
    pub const FIELD_WIDTH: f32 = 100.0;
    pub const FIELD_HEIGHT: f32 = 150.0;

    /// Player count bounds accepted by `setup`
    pub const MIN_PLAYERS: usize = 2;
    pub const MAX_PLAYERS: usize = 8;

    /// Speed multiplier bounds (ticks per rendered frame)
    pub const MIN_SPEED_MULTIPLIER: u32 = 1;
    pub const MAX_SPEED_MULTIPLIER: u32 = 10;

    /// Core hp ceiling
    pub const CORE_HP_MAX: f32 = 500.0;

    /// Player colors, indexed by player id
    pub const PLAYER_COLORS: [&str; 8] = [
        "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22", "#1abc9c", "#ecf0f1",
    ];
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit vector for a heading angle
#[inline]
pub fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Angle of the vector pointing from `from` to `to`
#[inline]
pub fn angle_between(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}
