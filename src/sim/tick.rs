//! Fixed-order simulation tick
//!
//! One call to `tick` advances the whole match by one discrete step:
//! peg refresh, re-aim, survival and phase, balls and payouts, units,
//! then territory bookkeeping. Nothing inside a tick blocks or fails.

use glam::Vec2;
use rand::Rng;

use super::ball::{BallExit, BallStep};
use super::grid::{PlayerId, disc_offsets};
use super::peg::{refresh_for_player, reset_kinds};
use super::state::{GameEvent, GamePhase, GameState};
use super::unit::Unit;
use crate::consts::*;
use crate::heading;

/// Inputs for a single tick
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    /// Ball field width (ball-local units)
    pub field_width: f32,
    /// Ball field height (ball-local units)
    pub field_height: f32,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            field_width: FIELD_WIDTH,
            field_height: FIELD_HEIGHT,
        }
    }
}

impl GameState {
    /// Advance one tick with the given ball field size
    pub fn update(&mut self, width: f32, height: f32) {
        tick(
            self,
            &TickInput {
                field_width: width,
                field_height: height,
            },
        );
    }
}

/// Run `speed_multiplier` ticks for one rendered frame
///
/// The multiplier is clamped to 1..=10. Stops early once a winner is
/// declared; returns the number of ticks actually run.
pub fn run_frame(state: &mut GameState, input: &TickInput, speed_multiplier: u32) -> u32 {
    let steps = speed_multiplier.clamp(MIN_SPEED_MULTIPLIER, MAX_SPEED_MULTIPLIER);
    let mut ran = 0;
    while ran < steps && state.winner.is_none() {
        tick(state, input);
        ran += 1;
    }
    ran
}

/// Advance the match by one tick
pub fn tick(state: &mut GameState, input: &TickInput) {
    // Finished matches stay frozen until the next setup
    if state.winner.is_some() || state.players.is_empty() {
        return;
    }

    state.events.clear();
    state.time_ticks += 1;
    let engine = &state.tuning.engine;

    // 1. Peg refresh
    if state.time_ticks % engine.peg_refresh_interval == 0 {
        refresh_pegs(state);
    }

    // 2. Re-aim spawn headings
    if state.time_ticks % state.tuning.engine.reaim_interval == 0 {
        state.aim_spawn_angles();
    }

    // 3. Survival and phase
    check_survival(state);
    update_game_phase(state);
    if state.winner.is_some() {
        return;
    }

    // 4. Balls and payouts
    let payouts = step_balls(state, input);
    for (player, exit) in payouts {
        settle_payout(state, player, &exit);
    }

    // 5. Units
    let contested = step_units(state);

    // 6. Territory counts
    let painted = state.territory.take_dirty();
    if contested || painted || state.time_ticks % state.tuning.engine.recount_interval == 0 {
        state.recount_territory();
    }
}

/// Reset peg kinds, then re-roll a subset per living player by dominance
fn refresh_pegs(state: &mut GameState) {
    reset_kinds(&mut state.pegs);
    let alive: Vec<PlayerId> = state.players.iter().filter(|p| p.alive).map(|p| p.id).collect();
    for id in alive {
        let dominance = state.dominance(id);
        let (gold, red) =
            refresh_for_player(&mut state.pegs, dominance, &state.tuning.engine, &mut state.rng);
        log::debug!(
            "Peg refresh for player {} (dominance {:.3}): {} gold, {} red",
            id,
            dominance,
            gold,
            red
        );
    }
}

/// Step every living player's ball; returns the balls that left the field
fn step_balls(state: &mut GameState, input: &TickInput) -> Vec<(PlayerId, BallExit)> {
    let mut exits = Vec::new();
    let alive: Vec<PlayerId> = state.players.iter().filter(|p| p.alive).map(|p| p.id).collect();

    for id in alive {
        let Some(ball) = state.balls.get_mut(&id) else {
            continue;
        };
        let step = ball.update(
            input.field_width,
            input.field_height,
            &state.pegs,
            &state.tuning.ball,
            &state.rewards,
            &mut state.rng,
        );
        if let BallStep::Exited(exit) = step {
            exits.push((id, exit));
        }
    }
    exits
}

/// Credit a ball exit, spawn its wave, and replace the ball
fn settle_payout(state: &mut GameState, player: PlayerId, exit: &BallExit) {
    // Eliminated this tick: nothing to credit
    if !state.is_alive(player) {
        state.balls.remove(&player);
        return;
    }

    if exit.reward > 0 {
        let units = state.rewards.payout_units(exit, &mut state.rng);
        if let Some(score) = state.scores.get_mut(player as usize) {
            *score += units as u64;
        }
        if let Some(p) = state.players.get_mut(player as usize) {
            p.catch_streak += 1;
            p.best_streak = p.best_streak.max(p.catch_streak);
            p.catcher_width = (1.0 + 0.05 * p.catch_streak as f32).min(1.5);
        }
        log::debug!(
            "Player {} payout: reward {} -> {} units{}",
            player,
            exit.reward,
            units,
            if exit.jackpot { " (jackpot)" } else { "" }
        );
        state.events.push(GameEvent::Payout {
            player,
            reward: exit.reward,
            units,
            jackpot: exit.jackpot,
        });
        spawn_wave(state, player, units, exit.jackpot);
    } else if let Some(p) = state.players.get_mut(player as usize) {
        p.catch_streak = 0;
        p.catcher_width = 1.0;
    }

    state.spawn_ball(player);
}

/// Spawn a wave of units for a player
///
/// The count and hp scale with the player's dominance; small territories
/// get a catch-up bonus and the very smallest a damping penalty. Returns
/// the number of units created.
pub fn spawn_wave(
    state: &mut GameState,
    player: PlayerId,
    amount_base: u32,
    is_jackpot: bool,
) -> u32 {
    if amount_base == 0 || !state.is_alive(player) {
        return 0;
    }
    let Some(p) = state.players.get(player as usize) else {
        return 0;
    };
    let size = state.territory.size();
    let base_center = p.base_center(size);
    let spawn_angle = p.spawn_angle;

    let engine = &state.tuning.engine;
    let d = state.dominance(player);
    let mut count = amount_base as f32 * (1.0 + engine.count_dominance_gain * d);
    let mut hp_multiplier = 1.0 + engine.hp_dominance_gain * d;
    if d < engine.catch_up_threshold {
        count *= engine.catch_up_bonus;
    }
    if d < engine.low_dominance_threshold {
        count *= engine.low_dominance_penalty;
    }
    let (attack_multiplier, phase_hp) = state.phase.multipliers(engine);
    hp_multiplier *= phase_hp;

    let live = state.units_for(player).count();
    let room = engine.max_units_per_player.saturating_sub(live) as u32;
    let count = (count.round() as u32).clamp(1, engine.max_wave_size).min(room);
    let scatter = engine.spawn_scatter;

    let edge = size as f32 - 0.001;
    for _ in 0..count {
        let kind = if is_jackpot {
            *state.unit_mix_jackpot.sample(&mut state.rng)
        } else {
            *state.unit_mix_normal.sample(&mut state.rng)
        };
        let spread = state.heading_bands.sample(&mut state.rng).abs();
        let angle = crate::normalize_angle(spawn_angle + state.rng.random_range(-spread..=spread));

        let offset = heading(state.rng.random_range(0.0..std::f32::consts::TAU))
            * state.rng.random_range(0.0..=scatter);
        let pos = (base_center + offset).clamp(Vec2::ZERO, Vec2::splat(edge));

        let id = state.next_entity_id();
        let stats = *state.tuning.unit.stats(kind);
        state.units.push(Unit::new(
            id,
            player,
            kind,
            pos,
            angle,
            &stats,
            attack_multiplier,
            hp_multiplier,
        ));
    }

    if count > 0 {
        state.events.push(GameEvent::WaveSpawned { player, count });
    }
    count
}

/// Step every active unit against the shared grids and prune the dead
///
/// Returns whether any unit stood on living enemy ground.
fn step_units(state: &mut GameState) -> bool {
    state.proximity.rebuild(&state.units);
    let bases = state.base_zones();

    let mut contested = false;
    for unit in state.units.iter_mut() {
        contested |= unit.update(
            &mut state.territory,
            &state.terrain,
            &state.proximity,
            &bases,
            &state.tuning.unit,
        );
    }
    state.units.retain(|u| u.active);
    contested
}

/// Raw and distance-weighted control of a base area
///
/// Returns (raw ratio over `base_radius`, weighted ratio over
/// `production_radius`). Cells nearer the center weigh more.
pub fn base_control(
    state: &GameState,
    player: PlayerId,
    base_radius: i32,
    production_radius: i32,
) -> (f32, f32) {
    let Some(p) = state.players.get(player as usize) else {
        return (0.0, 0.0);
    };
    let (bx, by) = p.base_cell(state.territory.size());

    let mut total = 0u32;
    let mut owned = 0u32;
    for (dx, dy) in disc_offsets(base_radius) {
        let (x, y) = (bx + dx, by + dy);
        if !state.territory.contains(x, y) {
            continue;
        }
        total += 1;
        if state.territory.owner(x, y) == Some(player) {
            owned += 1;
        }
    }

    let mut weight_total = 0.0f32;
    let mut weight_owned = 0.0f32;
    let falloff = (production_radius + 1) as f32;
    for (dx, dy) in disc_offsets(production_radius) {
        let (x, y) = (bx + dx, by + dy);
        if !state.territory.contains(x, y) {
            continue;
        }
        let w = 1.0 - ((dx * dx + dy * dy) as f32).sqrt() / falloff;
        weight_total += w;
        if state.territory.owner(x, y) == Some(player) {
            weight_owned += w;
        }
    }

    let raw = if total > 0 { owned as f32 / total as f32 } else { 0.0 };
    let weighted = if weight_total > 0.0 {
        weight_owned / weight_total
    } else {
        0.0
    };
    (raw, weighted)
}

/// Update core hp, eliminate collapsed players, and declare a winner
pub fn check_survival(state: &mut GameState) {
    let engine = &state.tuning.engine;
    let (base_radius, production_radius, floor) =
        (engine.base_radius, engine.production_radius, engine.elimination_floor);

    let alive: Vec<PlayerId> = state.players.iter().filter(|p| p.alive).map(|p| p.id).collect();
    let mut eliminated = Vec::new();
    for id in alive {
        let (raw, weighted) = base_control(state, id, base_radius, production_radius);
        let p = &mut state.players[id as usize];
        p.base_control = raw;
        p.production_control = weighted;
        p.core_hp = (weighted * CORE_HP_MAX).clamp(0.0, CORE_HP_MAX);

        if weighted < floor {
            p.alive = false;
            p.core_hp = 0.0;
            state.balls.remove(&id);
            eliminated.push(id);
            log::info!(
                "Player {} eliminated (production control {:.1}%)",
                id,
                weighted * 100.0
            );
            state.events.push(GameEvent::Eliminated { player: id });
        }
    }

    let survivors: Vec<PlayerId> = state.players.iter().filter(|p| p.alive).map(|p| p.id).collect();
    let area = state.territory.area() as u32;
    let winner = match survivors.as_slice() {
        [only] => Some(*only),
        // Everyone left fell in the same check: most territory wins, lowest id on ties
        [] => eliminated.iter().copied().max_by(|&a, &b| {
            let ca = state.territory_counts.get(a as usize).copied().unwrap_or(0);
            let cb = state.territory_counts.get(b as usize).copied().unwrap_or(0);
            ca.cmp(&cb).then(b.cmp(&a))
        }),
        many => many
            .iter()
            .copied()
            .find(|&id| state.territory_counts.get(id as usize).copied().unwrap_or(0) >= area),
    };

    if let Some(id) = winner {
        if state.winner.is_none() {
            log::info!("Player {} wins at tick {}", id, state.time_ticks);
            state.events.push(GameEvent::Winner { player: id });
        }
        state.winner = Some(id);
    }
}

/// Recompute the phase from the highest dominance across all players
pub fn update_game_phase(state: &mut GameState) {
    let max_dominance = (0..state.players.len())
        .map(|i| state.dominance(i as PlayerId))
        .fold(0.0f32, f32::max);
    let phase = GamePhase::from_dominance(max_dominance, &state.tuning.engine);
    if phase != state.phase {
        log::debug!("Phase {:?} -> {:?} (max dominance {:.3})", state.phase, phase, max_dominance);
        state.phase = phase;
        state.events.push(GameEvent::PhaseChanged { phase });
    }
}
