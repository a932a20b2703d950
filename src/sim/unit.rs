//! Autonomous territory units
//!
//! A unit walks a fixed heading from its spawn point, paints every foreign
//! cell it steps on, pays hp for each painted cell, and dies when it runs
//! out of hp, leaves the grid, or strays too far past its own border.
//!
//! Units never hold references to the engine. Each step borrows exactly the
//! grids it reads or writes.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::grid::{PlayerId, TerrainGrid, TerrainKind, TerritoryGrid, paint_area};
use crate::heading;
use crate::tuning::{UnitStats, UnitTuning};

/// Unit archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    /// Fast, fragile, long excursion
    Light,
    /// Slow, durable, bounces off the map edge
    Heavy,
}

impl UnitKind {
    /// Unit types this type deals bonus damage against
    pub fn counters(self) -> &'static [UnitKind] {
        match self {
            UnitKind::Heavy => &[UnitKind::Light],
            UnitKind::Light => &[],
        }
    }
}

/// Excursion tracking relative to the unit's own territory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Excursion {
    /// Has not left own ground (or came back near its spawn point)
    InOwnTerritory,
    /// Left own ground at `anchor`
    Outside { anchor: Vec2 },
}

/// Why a unit was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Capture costs drained its hp
    Depleted,
    /// Strayed past its excursion budget
    Overextended,
    /// Walked off the grid
    LeftGrid,
}

/// Another unit as seen by the proximity lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupant {
    pub owner: PlayerId,
    pub kind: UnitKind,
}

/// Snapshot of unit positions by grid cell, rebuilt before units move
///
/// Units read positions from the previous state, so update order within a
/// tick does not change who sees whom.
#[derive(Debug, Clone, Default)]
pub struct ProximityIndex {
    cells: HashMap<(i32, i32), Vec<Occupant>>,
}

impl ProximityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the active units
    pub fn rebuild(&mut self, units: &[Unit]) {
        self.cells.clear();
        for unit in units.iter().filter(|u| u.active) {
            self.insert(
                unit.cell(),
                Occupant {
                    owner: unit.owner,
                    kind: unit.kind,
                },
            );
        }
    }

    pub fn insert(&mut self, cell: (i32, i32), occupant: Occupant) {
        self.cells.entry(cell).or_default().push(occupant);
    }

    /// Occupants of the 3×3 block centered on `cell`
    pub fn around(&self, cell: (i32, i32)) -> impl Iterator<Item = &Occupant> {
        (-1..=1)
            .flat_map(move |dy| (-1..=1).map(move |dx| (cell.0 + dx, cell.1 + dy)))
            .filter_map(|c| self.cells.get(&c))
            .flatten()
    }
}

/// A living player's base, used for the base defense bonus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseZone {
    pub owner: PlayerId,
    /// Center in grid coordinates
    pub center: Vec2,
    pub radius: f32,
}

/// A territory unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub owner: PlayerId,
    pub kind: UnitKind,
    /// Position in grid coordinates (cell (x, y) spans [x, x+1))
    pub pos: Vec2,
    /// Heading in radians
    pub angle: f32,
    /// Cells per tick before terrain
    pub speed: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub attack: f32,
    /// Terrain defense multiplier at the current cell
    pub defense: f32,
    pub capture_radius: i32,
    pub max_excursion: f32,
    pub spawn_pos: Vec2,
    pub excursion: Excursion,
    pub active: bool,
    pub death: Option<DeathCause>,
    /// Ticks before the next edge bounce (heavy only)
    pub bounce_cooldown: u32,
    /// Ticks left on the counter-hit visual
    pub battle_effect: u32,
    /// Recent positions, newest first (light only)
    pub trail: Vec<Vec2>,
}

impl Unit {
    /// Create a unit from base stats and the current phase multipliers
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        owner: PlayerId,
        kind: UnitKind,
        pos: Vec2,
        angle: f32,
        stats: &UnitStats,
        attack_multiplier: f32,
        hp_multiplier: f32,
    ) -> Self {
        let hp = stats.hp * hp_multiplier;
        Self {
            id,
            owner,
            kind,
            pos,
            angle,
            speed: stats.speed,
            hp,
            max_hp: hp,
            attack: stats.attack * attack_multiplier,
            defense: 1.0,
            capture_radius: stats.capture_radius,
            max_excursion: stats.max_excursion,
            spawn_pos: pos,
            excursion: Excursion::InOwnTerritory,
            active: true,
            death: None,
            bounce_cooldown: 0,
            battle_effect: 0,
            trail: Vec::new(),
        }
    }

    /// Integer grid cell under the unit
    #[inline]
    pub fn cell(&self) -> (i32, i32) {
        (self.pos.x.floor() as i32, self.pos.y.floor() as i32)
    }

    fn kill(&mut self, cause: DeathCause) {
        self.active = false;
        self.death = Some(cause);
    }

    fn record_trail(&mut self, length: usize) {
        if length == 0 {
            return;
        }
        self.trail.insert(0, self.pos);
        self.trail.truncate(length);
    }

    /// Speed multiplier, defense multiplier and heal for the terrain underfoot
    fn terrain_modifiers(&self, terrain: TerrainKind, tuning: &UnitTuning) -> (f32, f32, f32) {
        let stats = tuning.stats(self.kind);
        match terrain {
            TerrainKind::Normal => (1.0, 1.0, 0.0),
            TerrainKind::Highground => (stats.highground_speed, tuning.highground_defense, 0.0),
            TerrainKind::Obstacle => (stats.obstacle_speed, 1.0, 0.0),
            TerrainKind::Supply => (1.0, 1.0, tuning.supply_heal),
        }
    }

    /// Damage multiplier from adjacent enemies (rock-paper-scissors)
    fn matchup(&mut self, proximity: &ProximityIndex, tuning: &UnitTuning) -> f32 {
        let mut countering = false;
        let mut countered = false;
        for other in proximity.around(self.cell()) {
            if other.owner == self.owner {
                continue;
            }
            countering |= self.kind.counters().contains(&other.kind);
            countered |= other.kind.counters().contains(&self.kind);
        }

        let mut bonus = 1.0;
        if countering {
            bonus *= tuning.counter_bonus;
            self.battle_effect = tuning.battle_effect_ticks;
        }
        if countered {
            bonus *= tuning.counter_penalty;
        }
        bonus
    }

    /// Move heading toward the next position; heavy units bounce off edges
    fn advance(&mut self, step_len: f32, size: f32, tuning: &UnitTuning) {
        let mut next = self.pos + heading(self.angle) * step_len;

        if self.kind == UnitKind::Heavy && self.bounce_cooldown == 0 {
            let mut bounced = false;
            if next.x < 0.0 || next.x >= size {
                self.angle = std::f32::consts::PI - self.angle;
                bounced = true;
            }
            if next.y < 0.0 || next.y >= size {
                self.angle = -self.angle;
                bounced = true;
            }
            if bounced {
                self.angle = crate::normalize_angle(self.angle);
                self.bounce_cooldown = tuning.heavy_bounce_cooldown;
                self.hp = (self.hp + tuning.heavy_bounce_heal).min(self.max_hp);
                next = self.pos + heading(self.angle) * step_len;
            }
        }

        self.pos = next;
    }

    /// Advance one tick
    ///
    /// Returns whether the unit stands on ground held by another living
    /// player. Painting, hp costs and deactivation happen in place.
    pub fn update(
        &mut self,
        territory: &mut TerritoryGrid,
        terrain: &TerrainGrid,
        proximity: &ProximityIndex,
        bases: &[BaseZone],
        tuning: &UnitTuning,
    ) -> bool {
        if !self.active {
            return false;
        }
        self.battle_effect = self.battle_effect.saturating_sub(1);
        self.bounce_cooldown = self.bounce_cooldown.saturating_sub(1);

        // Terrain applies every tick spent on the cell
        let (cx, cy) = self.cell();
        let ground = terrain.get(cx, cy);
        let (speed_mod, defense, heal) = self.terrain_modifiers(ground, tuning);
        self.defense = defense;
        if heal > 0.0 && self.hp < self.max_hp {
            self.hp = (self.hp + heal).min(self.max_hp);
        }

        self.advance(self.speed * speed_mod, territory.size() as f32, tuning);
        if self.kind == UnitKind::Light {
            self.record_trail(tuning.trail_length);
        }

        let (cx, cy) = self.cell();
        if !territory.contains(cx, cy) {
            self.kill(DeathCause::LeftGrid);
            return false;
        }

        let owner = territory.owner(cx, cy);
        let on_own = owner == Some(self.owner);
        match self.excursion {
            Excursion::InOwnTerritory if !on_own => {
                self.excursion = Excursion::Outside { anchor: self.pos };
            }
            Excursion::InOwnTerritory => {}
            // Only a return near spawn counts as "never left"; walking over
            // ground the unit captured itself keeps the excursion running
            Excursion::Outside { .. }
                if on_own && self.pos.distance(self.spawn_pos) <= tuning.spawn_reset_distance =>
            {
                self.excursion = Excursion::InOwnTerritory;
            }
            Excursion::Outside { anchor } => {
                if self.pos.distance(anchor) > self.max_excursion {
                    self.kill(DeathCause::Overextended);
                    return false;
                }
            }
        }
        if on_own {
            return false;
        }

        let on_enemy = owner.is_some_and(|p| bases.iter().any(|b| b.owner == p));
        let type_bonus = self.matchup(proximity, tuning);

        let painted = paint_area(territory, cx, cy, self.owner, self.capture_radius);
        if painted == 0 {
            return on_enemy;
        }

        let mut resistance = if on_enemy {
            tuning.enemy_resistance
        } else {
            tuning.neutral_resistance
        };
        let near_enemy_base = bases
            .iter()
            .any(|b| b.owner != self.owner && b.center.distance(self.pos) <= b.radius);
        if near_enemy_base {
            resistance *= tuning.base_defense_multiplier;
        }
        if ground == TerrainKind::Highground {
            resistance *= tuning.highground_resistance;
        }

        let strength = (self.attack * type_bonus * self.defense).max(f32::EPSILON);
        let mut cost = painted as f32 * resistance / strength;
        if self.kind == UnitKind::Heavy {
            cost *= tuning.heavy_cost_discount;
        }
        self.hp -= cost;
        if self.hp <= 0.0 {
            self.kill(DeathCause::Depleted);
        }

        on_enemy
    }
}
