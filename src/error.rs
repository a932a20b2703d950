//! Errors raised while configuring or setting up a match
//!
//! The tick path itself never fails; only construction and configuration
//! can be rejected.

/// Simulation setup/configuration errors
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// `setup` called with an unsupported number of players
    #[error("Invalid player count {count} (expected {min}..={max})")]
    InvalidPlayerCount { count: usize, min: usize, max: usize },

    /// Weighted table is empty or has unusable weights
    #[error("Invalid weight table: {0}")]
    InvalidWeightTable(String),

    /// Tuning value outside its usable range
    #[error("Invalid tuning: {0}")]
    InvalidTuning(String),

    /// Tuning JSON failed to parse
    #[error("Failed to parse tuning: {0}")]
    Json(#[from] serde_json::Error),
}
