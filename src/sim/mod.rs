//! Simulation module
//!
//! All gameplay logic lives here. This module stays free of rendering and
//! platform code:
//! - One discrete tick at a time, no wall clock
//! - All randomness drawn from the engine's own RNG
//! - Players and balls iterated in player id order

pub mod ball;
pub mod collision;
pub mod grid;
pub mod peg;
pub mod state;
pub mod tick;
pub mod unit;
pub mod weighted;

pub use ball::{Ball, BallExit, BallStep, RewardModel};
pub use collision::CollisionResult;
pub use grid::{PlayerId, TerrainGrid, TerrainKind, TerrainSummary, TerritoryGrid, paint_area};
pub use peg::{Peg, PegKind};
pub use state::{GameEvent, GamePhase, GameState, Player};
pub use tick::{TickInput, check_survival, run_frame, spawn_wave, tick, update_game_phase};
pub use unit::{DeathCause, Excursion, Unit, UnitKind};
pub use weighted::WeightedTable;
