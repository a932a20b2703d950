//! Data-driven game balance
//!
//! Every tunable number the simulation uses lives here so a balance pass
//! can be loaded from JSON without touching code. `Tuning::default()` is the
//! canonical rule set; a JSON file only needs the fields it overrides.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SimError;
use crate::sim::UnitKind;

/// Ball physics and anti-stall values (ball-local units, per tick)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallTuning {
    /// Downward acceleration added every tick
    pub gravity: f32,
    /// Velocity multiplier applied every tick (both axes)
    pub friction: f32,
    pub radius: f32,
    pub peg_radius: f32,
    /// Speed at which the reward speed factor saturates
    pub speed_cap: f32,

    // === Anti-stall ===
    /// Squared speed below which the ball counts as stalled
    pub stall_speed_sq: f32,
    /// Consecutive stalled ticks before a kick
    pub stall_ticks: u32,
    /// Radius used to detect a peg cluster around the ball
    pub cluster_radius: f32,
    /// Pegs within `cluster_radius` that make a cluster
    pub cluster_pegs: usize,
    /// Squared speed below which a cluster triggers a kick
    pub cluster_speed_sq: f32,
    /// Upward kick strength range
    pub stall_impulse_min: f32,
    pub stall_impulse_max: f32,
    /// Sideways kick range (±)
    pub stall_sideways: f32,

    // === Collisions ===
    /// Wall restitution for grazing hits
    pub wall_damping_grazing: f32,
    /// Wall restitution for head-on hits
    pub wall_damping_head_on: f32,
    /// Peg restitution before the incidence scale
    pub peg_restitution: f32,
    /// Incidence scale for a head-on peg hit (grazing is 1.0)
    pub peg_head_on_scale: f32,
    /// Tangential velocity kept across a peg hit
    pub tangent_friction: f32,
    /// Random velocity jitter added on peg hits (±)
    pub perturbation: f32,

    // === Lifecycle ===
    /// Ticks after spawn during which an exit pays nothing
    pub reward_cooldown_ticks: u32,
    /// Spawn x range around the field center (±)
    pub spawn_x_spread: f32,
    pub spawn_y: f32,
}

impl Default for BallTuning {
    fn default() -> Self {
        Self {
            gravity: 0.12,
            friction: 0.995,
            radius: 2.0,
            peg_radius: 1.5,
            speed_cap: 6.0,

            stall_speed_sq: 0.02,
            stall_ticks: 90,
            cluster_radius: 7.0,
            cluster_pegs: 3,
            cluster_speed_sq: 0.25,
            stall_impulse_min: 1.5,
            stall_impulse_max: 2.5,
            stall_sideways: 1.2,

            wall_damping_grazing: 0.9,
            wall_damping_head_on: 0.6,
            peg_restitution: 0.75,
            peg_head_on_scale: 0.7,
            tangent_friction: 0.97,
            perturbation: 0.15,

            reward_cooldown_ticks: 20,
            spawn_x_spread: 15.0,
            spawn_y: 5.0,
        }
    }
}

/// Reward formula values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTuning {
    /// Base score distribution as (weight, score)
    pub base_scores: Vec<(f32, u32)>,
    /// Combo points at which the combo factor reaches 2.0
    pub combo_cap: i32,
    /// Position penalty at the very edge of the field
    pub edge_penalty: f32,

    // === Payout multipliers (unit count compounding) ===
    pub random_min: f32,
    pub random_max: f32,
    /// Extra factor for a dead-center exit
    pub position_bonus: f32,
    /// Extra factor at the speed cap
    pub velocity_bonus: f32,
    /// Max combo at which the combo payout bonus saturates
    pub combo_bonus_cap: i32,
    pub combo_bonus: f32,
    /// Peg hits at which the peg-hit bonus saturates
    pub peg_hit_cap: u32,
    pub peg_hit_bonus: f32,
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            base_scores: vec![(0.15, 0), (0.25, 1), (0.30, 2), (0.20, 4), (0.10, 8)],
            combo_cap: 20,
            edge_penalty: 0.5,

            random_min: 0.8,
            random_max: 1.2,
            position_bonus: 0.2,
            velocity_bonus: 0.3,
            combo_bonus_cap: 30,
            combo_bonus: 0.5,
            peg_hit_cap: 40,
            peg_hit_bonus: 0.5,
        }
    }
}

/// Base stats for one unit type
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitStats {
    /// Grid cells per tick
    pub speed: f32,
    pub hp: f32,
    pub attack: f32,
    /// Paint disc radius (cells)
    pub capture_radius: i32,
    /// Excursion budget beyond own territory (cells)
    pub max_excursion: f32,
    /// Speed multiplier on highground
    pub highground_speed: f32,
    /// Speed multiplier on obstacles
    pub obstacle_speed: f32,
}

/// Unit combat and terrain values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTuning {
    pub light: UnitStats,
    pub heavy: UnitStats,

    /// Damage bonus when a countered enemy is adjacent
    pub counter_bonus: f32,
    /// Damage penalty when adjacent to an enemy that counters us
    pub counter_penalty: f32,
    pub battle_effect_ticks: u32,

    // === Capture resistance (hp cost per painted cell) ===
    pub neutral_resistance: f32,
    pub enemy_resistance: f32,
    /// Extra multiplier inside another player's base radius
    pub base_defense_multiplier: f32,
    /// Extra multiplier when painting from highground
    pub highground_resistance: f32,

    // === Terrain ===
    pub highground_defense: f32,
    /// Hp per tick regained on supply cells
    pub supply_heal: f32,

    // === Heavy durability ===
    pub heavy_bounce_heal: f32,
    pub heavy_bounce_cooldown: u32,
    pub heavy_cost_discount: f32,

    /// Distance from spawn within which re-entering own ground resets the excursion
    pub spawn_reset_distance: f32,
    /// Trail points kept for light units
    pub trail_length: usize,
}

impl Default for UnitTuning {
    fn default() -> Self {
        Self {
            light: UnitStats {
                speed: 0.45,
                hp: 40.0,
                attack: 1.0,
                capture_radius: 1,
                max_excursion: 32.0,
                highground_speed: 0.9,
                obstacle_speed: 0.8,
            },
            heavy: UnitStats {
                speed: 0.28,
                hp: 110.0,
                attack: 1.4,
                capture_radius: 2,
                max_excursion: 18.0,
                highground_speed: 0.95,
                obstacle_speed: 0.7,
            },

            counter_bonus: 1.5,
            counter_penalty: 0.7,
            battle_effect_ticks: 15,

            neutral_resistance: 1.0,
            enemy_resistance: 2.0,
            base_defense_multiplier: 1.5,
            highground_resistance: 1.3,

            highground_defense: 1.3,
            supply_heal: 0.4,

            heavy_bounce_heal: 12.0,
            heavy_bounce_cooldown: 30,
            heavy_cost_discount: 0.75,

            spawn_reset_distance: 2.0,
            trail_length: 8,
        }
    }
}

impl UnitTuning {
    /// Base stats for a unit type
    pub fn stats(&self, kind: UnitKind) -> &UnitStats {
        match kind {
            UnitKind::Light => &self.light,
            UnitKind::Heavy => &self.heavy,
        }
    }
}

/// Terrain generator values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainTuning {
    pub highground_count: u32,
    pub highground_radius: (i32, i32),
    pub obstacle_count: u32,
    pub obstacle_radius: (i32, i32),
    pub supply_count: u32,
    pub supply_radius: i32,
}

impl Default for TerrainTuning {
    fn default() -> Self {
        Self {
            highground_count: 6,
            highground_radius: (6, 10),
            obstacle_count: 8,
            obstacle_radius: (3, 6),
            supply_count: 4,
            supply_radius: 4,
        }
    }
}

/// Match flow, survival, phase and spawn-wave values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTuning {
    // === Bases ===
    /// Radius of the territory disc painted at setup
    pub base_territory_radius: i32,
    /// Radius measured for raw base control
    pub base_radius: i32,
    /// Inner radius measured for core hp and elimination
    pub production_radius: i32,
    /// Weighted production control below which a player is eliminated
    pub elimination_floor: f32,
    /// Distance of bases from the map center (fraction of map size)
    pub base_ring: f32,

    // === Cadences (ticks) ===
    pub peg_refresh_interval: u64,
    pub pegs_per_player: usize,
    pub reaim_interval: u64,
    pub recount_interval: u64,
    /// Spawn angle jitter (±radians)
    pub spawn_jitter: f32,

    // === Peg refresh weights ===
    pub gold_base: f32,
    pub gold_gain: f32,
    pub red_base: f32,
    pub red_gain: f32,

    // === Phase ===
    pub mid_threshold: f32,
    pub late_threshold: f32,
    /// (attack, hp) multipliers per phase
    pub early_multipliers: (f32, f32),
    pub mid_multipliers: (f32, f32),
    pub late_multipliers: (f32, f32),

    // === Spawn waves ===
    pub count_dominance_gain: f32,
    pub hp_dominance_gain: f32,
    pub catch_up_threshold: f32,
    pub catch_up_bonus: f32,
    pub low_dominance_threshold: f32,
    pub low_dominance_penalty: f32,
    pub max_wave_size: u32,
    pub max_units_per_player: usize,
    /// Unit type mix as (weight, kind)
    pub unit_mix_normal: Vec<(f32, UnitKind)>,
    pub unit_mix_jackpot: Vec<(f32, UnitKind)>,
    /// Heading deviation bands as (weight, max deviation in radians)
    pub heading_bands: Vec<(f32, f32)>,
    /// Spawn position scatter around the base (cells)
    pub spawn_scatter: f32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            base_territory_radius: 18,
            base_radius: 18,
            production_radius: 8,
            elimination_floor: 0.10,
            base_ring: 0.35,

            peg_refresh_interval: 240,
            pegs_per_player: 6,
            reaim_interval: 600,
            recount_interval: 10,
            spawn_jitter: 0.25,

            gold_base: 0.1,
            gold_gain: 0.5,
            red_base: 0.05,
            red_gain: 0.4,

            mid_threshold: 0.20,
            late_threshold: 0.40,
            early_multipliers: (1.0, 1.0),
            mid_multipliers: (1.2, 1.15),
            late_multipliers: (1.45, 1.3),

            count_dominance_gain: 0.5,
            hp_dominance_gain: 0.3,
            catch_up_threshold: 0.15,
            catch_up_bonus: 1.4,
            low_dominance_threshold: 0.03,
            low_dominance_penalty: 0.8,
            max_wave_size: 40,
            max_units_per_player: 400,
            unit_mix_normal: vec![(0.75, UnitKind::Light), (0.25, UnitKind::Heavy)],
            unit_mix_jackpot: vec![(0.5, UnitKind::Light), (0.5, UnitKind::Heavy)],
            heading_bands: vec![(0.6, 0.3), (0.3, 0.8), (0.1, std::f32::consts::PI)],
            spawn_scatter: 2.5,
        }
    }
}

/// Complete balance configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub ball: BallTuning,
    pub reward: RewardTuning,
    pub unit: UnitTuning,
    pub terrain: TerrainTuning,
    pub engine: EngineTuning,
}

impl Tuning {
    /// Parse tuning from JSON; missing fields keep their defaults
    ///
    /// Overrides are merged over `Tuning::default()` object by object, so a
    /// file can change a single nested stat. Arrays replace the default whole.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let overrides: Value = serde_json::from_str(json)?;
        let mut merged = serde_json::to_value(Tuning::default())?;
        merge_json(&mut merged, overrides);
        let tuning: Tuning = serde_json::from_value(merged)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Serialize to pretty JSON (for dumping the active balance)
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the simulation cannot run with
    ///
    /// Weighted tables are checked when the engine compiles them.
    pub fn validate(&self) -> Result<(), SimError> {
        let e = &self.engine;
        if e.base_territory_radius <= 0 || e.base_radius <= 0 || e.production_radius <= 0 {
            return Err(SimError::InvalidTuning(
                "base radii must be positive".to_string(),
            ));
        }
        if e.production_radius > e.base_radius {
            return Err(SimError::InvalidTuning(format!(
                "production radius {} exceeds base radius {}",
                e.production_radius, e.base_radius
            )));
        }
        if !(0.0..=1.0).contains(&e.elimination_floor) {
            return Err(SimError::InvalidTuning(format!(
                "elimination floor {} outside 0..=1",
                e.elimination_floor
            )));
        }
        if e.mid_threshold > e.late_threshold {
            return Err(SimError::InvalidTuning(format!(
                "mid threshold {} above late threshold {}",
                e.mid_threshold, e.late_threshold
            )));
        }
        if e.recount_interval == 0 || e.peg_refresh_interval == 0 || e.reaim_interval == 0 {
            return Err(SimError::InvalidTuning(
                "cadence intervals must be non-zero".to_string(),
            ));
        }
        let b = &self.ball;
        if b.radius <= 0.0 || b.peg_radius <= 0.0 || b.speed_cap <= 0.0 {
            return Err(SimError::InvalidTuning(
                "ball radius, peg radius and speed cap must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&b.friction) {
            return Err(SimError::InvalidTuning(format!(
                "ball friction {} outside 0..=1",
                b.friction
            )));
        }
        let r = &self.reward;
        if r.random_min > r.random_max || r.combo_cap <= 0 || r.combo_bonus_cap <= 0 {
            return Err(SimError::InvalidTuning(
                "reward multiplier ranges are inverted or empty".to_string(),
            ));
        }
        non_negative("ball.spawn_x_spread", b.spawn_x_spread)?;
        non_negative("ball.stall_sideways", b.stall_sideways)?;
        non_negative("ball.perturbation", b.perturbation)?;
        non_negative("ball.stall_impulse_min", b.stall_impulse_min)?;
        non_negative("ball.stall_impulse_max", b.stall_impulse_max)?;
        non_negative("reward.random_min", self.reward.random_min)?;
        non_negative("reward.random_max", self.reward.random_max)?;
        if b.stall_impulse_min > b.stall_impulse_max {
            return Err(SimError::InvalidTuning(format!(
                "stall impulse range {}..={} is inverted",
                b.stall_impulse_min, b.stall_impulse_max
            )));
        }
        non_negative("engine.spawn_jitter", e.spawn_jitter)?;
        non_negative("engine.spawn_scatter", e.spawn_scatter)?;
        if e.max_wave_size == 0 {
            return Err(SimError::InvalidTuning(
                "max wave size must be at least 1".to_string(),
            ));
        }
        let t = &self.terrain;
        if t.highground_radius.0 > t.highground_radius.1
            || t.obstacle_radius.0 > t.obstacle_radius.1
        {
            return Err(SimError::InvalidTuning(
                "terrain radius ranges are inverted".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject negative or non-finite values used as `±x` sampling ranges
fn non_negative(name: &str, value: f32) -> Result<(), SimError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidTuning(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

/// Recursively overlay `overrides` onto `base`
fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tuning_is_valid() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "ball": { "gravity": 0.2 } }"#).unwrap();
        assert!((tuning.ball.gravity - 0.2).abs() < f32::EPSILON);
        assert!((tuning.ball.friction - 0.995).abs() < f32::EPSILON);
        assert_eq!(tuning.engine.base_territory_radius, 18);
    }

    #[test]
    fn test_json_roundtrip_preserves_tables() {
        let json = Tuning::default().to_json().unwrap();
        let parsed = Tuning::from_json(&json).unwrap();
        assert_eq!(parsed.reward.base_scores.len(), 5);
        assert_eq!(parsed.engine.unit_mix_jackpot[1].1, UnitKind::Heavy);
    }

    #[test]
    fn test_rejects_inverted_phase_thresholds() {
        let result = Tuning::from_json(
            r#"{ "engine": { "mid_threshold": 0.6, "late_threshold": 0.3 } }"#,
        );
        assert!(matches!(result, Err(SimError::InvalidTuning(_))));
    }

    #[test]
    fn test_partial_unit_stats_override() {
        let tuning = Tuning::from_json(r#"{ "unit": { "light": { "speed": 0.5 } } }"#).unwrap();
        assert!((tuning.unit.light.speed - 0.5).abs() < f32::EPSILON);
        assert!((tuning.unit.light.hp - 40.0).abs() < f32::EPSILON);
        assert_eq!(tuning.unit.light.capture_radius, 1);
        assert!((tuning.unit.heavy.speed - 0.28).abs() < f32::EPSILON);
    }

    #[test]
    fn test_array_override_replaces_table() {
        let tuning =
            Tuning::from_json(r#"{ "reward": { "base_scores": [[0.5, 1], [0.5, 3]] } }"#).unwrap();
        assert_eq!(tuning.reward.base_scores, vec![(0.5, 1), (0.5, 3)]);
        assert_eq!(tuning.reward.combo_cap, 20);
    }

    fn rejects(json: &str) -> bool {
        matches!(Tuning::from_json(json), Err(SimError::InvalidTuning(_)))
    }

    #[test]
    fn test_rejects_zero_wave_size() {
        assert!(rejects(r#"{ "engine": { "max_wave_size": 0 } }"#));
    }

    #[test]
    fn test_rejects_negative_spawn_jitter() {
        assert!(rejects(r#"{ "engine": { "spawn_jitter": -0.1 } }"#));
    }

    #[test]
    fn test_rejects_negative_spawn_scatter() {
        assert!(rejects(r#"{ "engine": { "spawn_scatter": -1.0 } }"#));
    }

    #[test]
    fn test_rejects_negative_spawn_x_spread() {
        assert!(rejects(r#"{ "ball": { "spawn_x_spread": -5.0 } }"#));
    }

    #[test]
    fn test_rejects_negative_stall_sideways() {
        assert!(rejects(r#"{ "ball": { "stall_sideways": -1.2 } }"#));
    }

    #[test]
    fn test_rejects_negative_perturbation() {
        assert!(rejects(r#"{ "ball": { "perturbation": -0.15 } }"#));
    }

    #[test]
    fn test_rejects_inverted_stall_impulse() {
        assert!(rejects(
            r#"{ "ball": { "stall_impulse_min": 3.0, "stall_impulse_max": 2.0 } }"#
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Tuning::from_json("{ not json"),
            Err(SimError::Json(_))
        ));
    }
}
