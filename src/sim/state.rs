//! Game state and match setup
//!
//! `GameState` is the engine: it exclusively owns the grids, players, balls
//! and units. Renderers read it once per frame; only `tick` mutates it.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::ball::{Ball, RewardModel};
use super::grid::{PlayerId, TerrainGrid, TerrainSummary, TerritoryGrid, initialize_territory};
use super::peg::{Peg, generate_layout};
use super::unit::{BaseZone, ProximityIndex, Unit, UnitKind};
use super::weighted::WeightedTable;
use crate::consts::*;
use crate::error::SimError;
use crate::tuning::{EngineTuning, Tuning};
use crate::{angle_between, normalize_angle};

/// Match phase, driven by the leading player's dominance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GamePhase {
    #[default]
    Early,
    Mid,
    Late,
}

impl GamePhase {
    /// Phase for the highest dominance among all players
    ///
    /// Recomputed from scratch every tick, so it can step back down.
    pub fn from_dominance(max_dominance: f32, tuning: &EngineTuning) -> Self {
        if max_dominance >= tuning.late_threshold {
            GamePhase::Late
        } else if max_dominance >= tuning.mid_threshold {
            GamePhase::Mid
        } else {
            GamePhase::Early
        }
    }

    /// (attack, hp) multipliers for newly spawned units
    pub fn multipliers(self, tuning: &EngineTuning) -> (f32, f32) {
        match self {
            GamePhase::Early => tuning.early_multipliers,
            GamePhase::Mid => tuning.mid_multipliers,
            GamePhase::Late => tuning.late_multipliers,
        }
    }
}

/// Notable things that happened during the last tick (for HUD/effects)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    Payout {
        player: PlayerId,
        reward: u32,
        units: u32,
        jackpot: bool,
    },
    WaveSpawned {
        player: PlayerId,
        count: u32,
    },
    Eliminated {
        player: PlayerId,
    },
    PhaseChanged {
        phase: GamePhase,
    },
    Winner {
        player: PlayerId,
    },
}

/// A participant
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub color: String,
    /// Base position normalized to 0..1 on both axes
    pub base: Vec2,
    pub alive: bool,
    /// 0..=500, proportional to weighted production-area control
    pub core_hp: f32,
    /// Base radius in grid cells
    pub base_radius: i32,
    /// Heading new units are aimed along
    pub spawn_angle: f32,
    /// Raw control ratio over the whole base radius
    pub base_control: f32,
    /// Distance-weighted control ratio over the production area
    pub production_control: f32,
    /// Consecutive positive payouts
    pub catch_streak: u32,
    pub best_streak: u32,
    /// Cosmetic catcher width (1.0 = default)
    pub catcher_width: f32,
}

impl Player {
    /// Grid cell containing the base center
    pub fn base_cell(&self, size: usize) -> (i32, i32) {
        let s = size as f32;
        (
            ((self.base.x * s).floor() as i32).clamp(0, size as i32 - 1),
            ((self.base.y * s).floor() as i32).clamp(0, size as i32 - 1),
        )
    }

    /// Base center in continuous grid coordinates
    pub fn base_center(&self, size: usize) -> Vec2 {
        let (x, y) = self.base_cell(size);
        Vec2::new(x as f32 + 0.5, y as f32 + 0.5)
    }
}

/// Complete match state
#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: GamePhase,
    pub winner: Option<PlayerId>,
    pub players: Vec<Player>,
    pub territory: TerritoryGrid,
    pub terrain: TerrainGrid,
    pub pegs: Vec<Peg>,
    /// One ball per living player
    pub balls: BTreeMap<PlayerId, Ball>,
    /// Active units of every player
    pub units: Vec<Unit>,
    pub scores: Vec<u64>,
    pub territory_counts: Vec<u32>,
    pub neutral_count: u32,
    /// Events from the most recent tick
    pub events: Vec<GameEvent>,

    #[serde(skip)]
    pub tuning: Tuning,
    #[serde(skip)]
    pub(crate) rewards: RewardModel,
    #[serde(skip)]
    pub(crate) unit_mix_normal: WeightedTable<UnitKind>,
    #[serde(skip)]
    pub(crate) unit_mix_jackpot: WeightedTable<UnitKind>,
    #[serde(skip)]
    pub(crate) heading_bands: WeightedTable<f32>,
    #[serde(skip)]
    pub(crate) rng: Pcg32,
    #[serde(skip)]
    pub(crate) proximity: ProximityIndex,
    /// Next entity ID
    #[serde(skip)]
    next_id: u32,
}

impl GameState {
    /// Create an empty engine seeded from OS entropy; call `setup` to start a match
    pub fn new(tuning: Tuning) -> Result<Self, SimError> {
        Self::with_rng(tuning, Pcg32::from_rng(&mut rand::rng()))
    }

    /// Create an empty engine with a fixed seed
    pub fn with_seed(tuning: Tuning, seed: u64) -> Result<Self, SimError> {
        Self::with_rng(tuning, Pcg32::seed_from_u64(seed))
    }

    fn with_rng(tuning: Tuning, rng: Pcg32) -> Result<Self, SimError> {
        tuning.validate()?;
        let rewards = RewardModel::new(tuning.reward.clone(), tuning.ball.speed_cap)?;
        let unit_mix_normal = WeightedTable::new(tuning.engine.unit_mix_normal.iter().copied())?;
        let unit_mix_jackpot = WeightedTable::new(tuning.engine.unit_mix_jackpot.iter().copied())?;
        let heading_bands = WeightedTable::new(tuning.engine.heading_bands.iter().copied())?;

        Ok(Self {
            time_ticks: 0,
            phase: GamePhase::Early,
            winner: None,
            players: Vec::new(),
            territory: TerritoryGrid::new(MAP_GRID_SIZE),
            terrain: TerrainGrid::new(MAP_GRID_SIZE),
            pegs: generate_layout(FIELD_WIDTH, FIELD_HEIGHT),
            balls: BTreeMap::new(),
            units: Vec::new(),
            scores: Vec::new(),
            territory_counts: Vec::new(),
            neutral_count: (MAP_GRID_SIZE * MAP_GRID_SIZE) as u32,
            events: Vec::new(),
            tuning,
            rewards,
            unit_mix_normal,
            unit_mix_jackpot,
            heading_bands,
            rng,
            proximity: ProximityIndex::new(),
            next_id: 1,
        })
    }

    /// Start a fresh match with `player_count` players
    ///
    /// Every piece of per-match state is rebuilt; nothing carries over from
    /// a previous match.
    pub fn setup(&mut self, player_count: usize) -> Result<(), SimError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(SimError::InvalidPlayerCount {
                count: player_count,
                min: MIN_PLAYERS,
                max: MAX_PLAYERS,
            });
        }

        self.time_ticks = 0;
        self.phase = GamePhase::Early;
        self.winner = None;
        self.territory.clear();
        self.terrain.clear();
        self.pegs = generate_layout(FIELD_WIDTH, FIELD_HEIGHT);
        self.balls.clear();
        self.units.clear();
        self.events.clear();
        self.proximity = ProximityIndex::new();
        self.next_id = 1;
        self.scores = vec![0; player_count];

        // Bases evenly spaced on a ring around the map center
        let ring = self.tuning.engine.base_ring;
        self.players = (0..player_count)
            .map(|i| {
                let theta = i as f32 * std::f32::consts::TAU / player_count as f32
                    - std::f32::consts::FRAC_PI_2;
                Player {
                    id: i as PlayerId,
                    color: PLAYER_COLORS[i % PLAYER_COLORS.len()].to_string(),
                    base: Vec2::new(0.5 + ring * theta.cos(), 0.5 + ring * theta.sin()),
                    alive: true,
                    core_hp: CORE_HP_MAX,
                    base_radius: self.tuning.engine.base_radius,
                    spawn_angle: 0.0,
                    base_control: 1.0,
                    production_control: 1.0,
                    catch_streak: 0,
                    best_streak: 0,
                    catcher_width: 1.0,
                }
            })
            .collect();

        // Territory first so terrain can never be mistaken for ownership
        for id in 0..player_count as PlayerId {
            self.initialize_territory(id);
            self.spawn_ball(id);
        }
        let summary = self.generate_terrain();
        self.aim_spawn_angles();
        self.recount_territory();

        log::info!(
            "Match setup: {} players, terrain {} highground / {} obstacles / {} supply",
            player_count,
            summary.highground,
            summary.obstacles,
            summary.supply
        );
        Ok(())
    }

    /// Paint a player's starting disc; returns cells painted
    pub fn initialize_territory(&mut self, player: PlayerId) -> u32 {
        let Some(p) = self.players.get(player as usize) else {
            return 0;
        };
        let cell = p.base_cell(self.territory.size());
        initialize_territory(
            &mut self.territory,
            player,
            cell,
            self.tuning.engine.base_territory_radius,
        )
    }

    /// Scatter terrain features over the map
    pub fn generate_terrain(&mut self) -> TerrainSummary {
        self.terrain.clear();
        self.terrain.generate(&self.tuning.terrain, &mut self.rng)
    }

    /// Replace a player's ball with a freshly spawned one
    pub fn spawn_ball(&mut self, player: PlayerId) {
        let ball = Ball::spawn(player, FIELD_WIDTH, &self.tuning.ball, &mut self.rng);
        self.balls.insert(player, ball);
    }

    /// Point every living player's spawn heading at the map center, with jitter
    pub fn aim_spawn_angles(&mut self) {
        let size = self.territory.size();
        let center = Vec2::splat(size as f32 / 2.0);
        let jitter = self.tuning.engine.spawn_jitter;
        for player in self.players.iter_mut().filter(|p| p.alive) {
            let toward = angle_between(player.base_center(size), center);
            player.spawn_angle = normalize_angle(toward + self.rng.random_range(-jitter..=jitter));
        }
    }

    /// Full rescan of per-player territory counts
    pub fn recount_territory(&mut self) {
        let (counts, neutral) = self.territory.counts(self.players.len());
        self.territory_counts = counts;
        self.neutral_count = neutral;
        self.territory.take_dirty();
    }

    /// Share of the map a player owns (0..=1)
    pub fn dominance(&self, player: PlayerId) -> f32 {
        let area = self.territory.area().max(1) as f32;
        self.territory_counts
            .get(player as usize)
            .map_or(0.0, |&c| c as f32 / area)
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn is_alive(&self, player: PlayerId) -> bool {
        self.players
            .get(player as usize)
            .is_some_and(|p| p.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Active units belonging to one player
    pub fn units_for(&self, player: PlayerId) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |u| u.active && u.owner == player)
    }

    /// Bases of living players, in grid coordinates
    pub fn base_zones(&self) -> Vec<BaseZone> {
        let size = self.territory.size();
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| BaseZone {
                owner: p.id,
                center: p.base_center(size),
                radius: p.base_radius as f32,
            })
            .collect()
    }

    /// Serialize the render-facing state
    pub fn snapshot_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GameState {
        GameState::with_seed(Tuning::default(), 42).unwrap()
    }

    #[test]
    fn test_setup_two_players() {
        let mut state = engine();
        state.setup(2).unwrap();

        assert_eq!(state.players.len(), 2);
        assert_eq!(state.balls.len(), 2);
        assert!(state.units.is_empty());
        assert_eq!(state.winner, None);

        let painted: u32 = state.territory_counts.iter().sum();
        assert_eq!(painted + state.neutral_count, 10_000);
        for (i, &count) in state.territory_counts.iter().enumerate() {
            // Disc of radius 18 (1009 lattice cells), possibly clipped by the edge
            assert!(count > 800 && count <= 1009, "player {} has {}", i, count);
        }
    }

    #[test]
    fn test_setup_rejects_bad_player_count() {
        let mut state = engine();
        assert!(matches!(
            state.setup(1),
            Err(SimError::InvalidPlayerCount { count: 1, .. })
        ));
        assert!(state.setup(9).is_err());
        assert!(state.setup(8).is_ok());
    }

    #[test]
    fn test_bases_evenly_spaced() {
        let mut state = engine();
        state.setup(4).unwrap();
        let center = Vec2::splat(0.5);
        for p in &state.players {
            assert!((p.base.distance(center) - 0.35).abs() < 1e-4);
        }
        // Opposite players mirror each other
        let a = state.players[0].base - center;
        let c = state.players[2].base - center;
        assert!((a + c).length() < 1e-4);
    }

    #[test]
    fn test_spawn_angles_face_center() {
        let mut state = engine();
        state.setup(3).unwrap();
        let size = state.territory.size();
        let center = Vec2::splat(size as f32 / 2.0);
        for p in &state.players {
            let toward = angle_between(p.base_center(size), center);
            let diff = normalize_angle(p.spawn_angle - toward).abs();
            assert!(diff <= state.tuning.engine.spawn_jitter + 1e-4);
        }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let mut state = engine();
        state.setup(3).unwrap();
        let initial_counts = state.territory_counts.clone();

        // Dirty the match
        state.scores[0] = 99;
        state.winner = Some(1);
        state.players[2].alive = false;
        state.units.push(Unit::new(
            77,
            0,
            UnitKind::Light,
            Vec2::new(5.0, 5.0),
            0.0,
            &state.tuning.unit.light,
            1.0,
            1.0,
        ));
        crate::sim::grid::paint_area(&mut state.territory, 50, 50, 0, 10);
        state.time_ticks = 500;

        state.setup(3).unwrap();
        assert_eq!(state.scores, vec![0, 0, 0]);
        assert_eq!(state.winner, None);
        assert!(state.units.is_empty());
        assert!(state.players.iter().all(|p| p.alive));
        assert_eq!(state.territory_counts, initial_counts);
        assert_eq!(state.time_ticks, 0);
        assert_eq!(state.balls.len(), 3);
    }

    #[test]
    fn test_phase_from_dominance() {
        let t = EngineTuning::default();
        assert_eq!(GamePhase::from_dominance(0.1, &t), GamePhase::Early);
        assert_eq!(GamePhase::from_dominance(0.2, &t), GamePhase::Mid);
        assert_eq!(GamePhase::from_dominance(0.45, &t), GamePhase::Late);
        assert_eq!(GamePhase::Mid.multipliers(&t), (1.2, 1.15));
    }

    #[test]
    fn test_snapshot_contains_render_state() {
        let mut state = engine();
        state.setup(2).unwrap();
        let json = state.snapshot_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["players"].as_array().unwrap().len(), 2);
        assert!(value["pegs"].as_array().unwrap().len() > 50);
        assert!(value["winner"].is_null());
        assert!(value.get("rng").is_none());
    }
}
