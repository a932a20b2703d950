//! Per-player reward ball
//!
//! Each living player owns one ball falling through the shared peg field.
//! The ball's only way out is through the floor, where it resolves into a
//! reward; the engine then discards it and spawns a fresh one.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{
    angle_damping, ball_peg_collision, ball_wall_collision, incidence, nearest_peg, pegs_within,
    reflect_velocity,
};
use super::grid::PlayerId;
use super::peg::Peg;
use super::weighted::WeightedTable;
use crate::error::SimError;
use crate::tuning::{BallTuning, RewardTuning};

/// Everything known about a ball at the moment it leaves the field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallExit {
    /// Final reward (0 if the draw, factors or cooldown zeroed it)
    pub reward: u32,
    /// Raw draw from the base score table
    pub base_score: u32,
    /// True when the base draw hit the top of the table
    pub jackpot: bool,
    /// Normalized distance from field center at exit (0 center, 1 wall)
    pub edge: f32,
    pub speed: f32,
    pub combo: i32,
    pub max_combo: i32,
    pub peg_hits: u32,
}

/// Outcome of one ball tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BallStep {
    /// Still bouncing
    InPlay,
    /// Crossed the floor this tick
    Exited(BallExit),
}

impl BallStep {
    /// Reward produced this tick (0 while in play)
    pub fn reward(&self) -> u32 {
        match self {
            BallStep::InPlay => 0,
            BallStep::Exited(exit) => exit.reward,
        }
    }
}

/// Reward formula plus the compiled base score table
#[derive(Debug, Clone)]
pub struct RewardModel {
    pub tuning: RewardTuning,
    pub speed_cap: f32,
    base_scores: WeightedTable<u32>,
    jackpot_score: u32,
}

impl RewardModel {
    pub fn new(tuning: RewardTuning, speed_cap: f32) -> Result<Self, SimError> {
        let base_scores = WeightedTable::new(tuning.base_scores.iter().copied())?;
        let jackpot_score = base_scores.values().iter().copied().max().unwrap_or(0);
        Ok(Self {
            tuning,
            speed_cap,
            base_scores,
            jackpot_score,
        })
    }

    /// Draw a base score from the weighted table
    pub fn draw_base<R: Rng>(&self, rng: &mut R) -> u32 {
        *self.base_scores.sample(rng)
    }

    pub fn is_jackpot(&self, base_score: u32) -> bool {
        base_score > 0 && base_score == self.jackpot_score
    }

    /// Speed factor in 0.5..=1.0
    pub fn speed_factor(&self, speed: f32) -> f32 {
        0.5 + 0.5 * (speed / self.speed_cap).clamp(0.0, 1.0)
    }

    /// Edge penalty in 0..=edge_penalty (quadratic in distance from center)
    pub fn position_penalty(&self, edge: f32) -> f32 {
        let e = edge.clamp(0.0, 1.0);
        self.tuning.edge_penalty * e * e
    }

    /// Combo factor in 1.0..=2.0
    pub fn combo_factor(&self, combo: i32) -> f32 {
        let cap = self.tuning.combo_cap.max(1);
        1.0 + combo.clamp(0, cap) as f32 / cap as f32
    }

    /// floor(base × speed × combo × (1 − position penalty)), never negative
    pub fn exit_reward(&self, base_score: u32, speed: f32, edge: f32, combo: i32) -> u32 {
        let raw = base_score as f32
            * self.speed_factor(speed)
            * self.combo_factor(combo)
            * (1.0 - self.position_penalty(edge));
        raw.floor().max(0.0) as u32
    }

    /// Compound a positive reward into a unit count
    ///
    /// Each multiplier is bounded: random, exit position, exit speed,
    /// best combo and peg hits.
    pub fn payout_units<R: Rng>(&self, exit: &BallExit, rng: &mut R) -> u32 {
        if exit.reward == 0 {
            return 0;
        }
        let t = &self.tuning;
        let random = rng.random_range(t.random_min..=t.random_max);
        let position = 1.0 + t.position_bonus * (1.0 - exit.edge.clamp(0.0, 1.0));
        let velocity = 1.0 + t.velocity_bonus * (exit.speed / self.speed_cap).clamp(0.0, 1.0);
        let combo_cap = t.combo_bonus_cap.max(1);
        let combo =
            1.0 + t.combo_bonus * exit.max_combo.clamp(0, combo_cap) as f32 / combo_cap as f32;
        let peg_cap = t.peg_hit_cap.max(1);
        let pegs = 1.0 + t.peg_hit_bonus * exit.peg_hits.min(peg_cap) as f32 / peg_cap as f32;

        let units = exit.reward as f32 * random * position * velocity * combo * pegs;
        (units.round() as u32).max(1)
    }
}

/// A reward ball
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub owner: PlayerId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// Pegs hit since spawn
    pub peg_hits: u32,
    /// Running combo (red pegs can push it down, even below zero)
    pub combo: i32,
    /// Best combo reached since spawn
    pub max_combo: i32,
    /// Ticks left during which an exit pays nothing
    pub reward_cooldown: u32,
    /// Consecutive slow ticks
    pub stall_ticks: u32,
    /// Anti-stall kicks applied so far
    pub stall_kicks: u32,
}

impl Ball {
    pub fn new(owner: PlayerId, pos: Vec2, radius: f32) -> Self {
        Self {
            owner,
            pos,
            vel: Vec2::ZERO,
            radius,
            peg_hits: 0,
            combo: 0,
            max_combo: 0,
            reward_cooldown: 0,
            stall_ticks: 0,
            stall_kicks: 0,
        }
    }

    /// Fresh ball at a randomized spot along the top of the field
    pub fn spawn<R: Rng>(owner: PlayerId, width: f32, tuning: &BallTuning, rng: &mut R) -> Self {
        let x = width / 2.0 + rng.random_range(-tuning.spawn_x_spread..=tuning.spawn_x_spread);
        let x = x.clamp(tuning.radius, (width - tuning.radius).max(tuning.radius));
        let mut ball = Self::new(owner, Vec2::new(x, tuning.spawn_y), tuning.radius);
        ball.vel = Vec2::new(rng.random_range(-0.5..=0.5), 0.0);
        ball.reward_cooldown = tuning.reward_cooldown_ticks;
        ball
    }

    /// Advance one tick inside a `width` × `height` field
    pub fn update<R: Rng>(
        &mut self,
        width: f32,
        height: f32,
        pegs: &[Peg],
        tuning: &BallTuning,
        rewards: &RewardModel,
        rng: &mut R,
    ) -> BallStep {
        self.reward_cooldown = self.reward_cooldown.saturating_sub(1);

        // Integrate
        self.vel.y += tuning.gravity;
        self.vel *= tuning.friction;
        self.pos += self.vel;

        self.apply_anti_stall(pegs, tuning, rng);
        self.collide_walls(width, tuning);
        self.collide_pegs(pegs, tuning, rng);

        if self.pos.y > height + self.radius {
            return BallStep::Exited(self.resolve_exit(width, rewards, rng));
        }
        BallStep::InPlay
    }

    /// Kick the ball loose if it has been crawling too long or is wedged in a cluster
    fn apply_anti_stall<R: Rng>(&mut self, pegs: &[Peg], tuning: &BallTuning, rng: &mut R) {
        let speed_sq = self.vel.length_squared();
        if speed_sq < tuning.stall_speed_sq {
            self.stall_ticks += 1;
        } else {
            self.stall_ticks = 0;
        }

        let wedged = speed_sq < tuning.cluster_speed_sq
            && pegs_within(self.pos, pegs, tuning.cluster_radius) >= tuning.cluster_pegs;

        if self.stall_ticks > tuning.stall_ticks || wedged {
            // Push away from the nearest peg horizontally, random side if dead on top
            let away = match nearest_peg(self.pos, pegs) {
                Some((i, _)) if (self.pos.x - pegs[i].pos.x).abs() > 1e-3 => {
                    (self.pos.x - pegs[i].pos.x).signum()
                }
                _ => {
                    if rng.random_bool(0.5) {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            let up = rng.random_range(tuning.stall_impulse_min..=tuning.stall_impulse_max);
            let side = rng.random_range(0.0..=tuning.stall_sideways) * away;
            self.vel = Vec2::new(self.vel.x + side, -up);
            self.stall_ticks = 0;
            self.stall_kicks += 1;
        }
    }

    /// Side walls with angle-dependent damping, plus a soft ceiling
    fn collide_walls(&mut self, width: f32, tuning: &BallTuning) {
        let result = ball_wall_collision(self.pos, self.radius, width);
        if result.hit {
            self.pos.x = self.pos.x.clamp(self.radius, (width - self.radius).max(self.radius));
            if self.vel.dot(result.normal) < 0.0 {
                let damping = angle_damping(
                    incidence(self.vel, result.normal),
                    tuning.wall_damping_grazing,
                    tuning.wall_damping_head_on,
                );
                self.vel.x = -self.vel.x * damping;
            }
        }

        // Anti-stall kicks can launch the ball upward; keep it inside the field
        if self.pos.y < self.radius && self.vel.y < 0.0 {
            self.pos.y = self.radius;
            self.vel.y = -self.vel.y * tuning.wall_damping_head_on;
        }
    }

    /// Bounce off the single nearest peg, if touching and approaching it
    fn collide_pegs<R: Rng>(&mut self, pegs: &[Peg], tuning: &BallTuning, rng: &mut R) {
        let Some((idx, _)) = nearest_peg(self.pos, pegs) else {
            return;
        };
        let peg = pegs[idx];
        let result = ball_peg_collision(self.pos, self.radius, peg.pos, tuning.peg_radius);
        if !result.hit {
            return;
        }

        let n = result.normal;
        let vn = self.vel.dot(n);
        // Already separating
        if vn >= 0.0 {
            return;
        }

        let scale = angle_damping(incidence(self.vel, n), 1.0, tuning.peg_head_on_scale);
        // Split the mirrored velocity so each part gets its own loss
        let reflected = reflect_velocity(self.vel, n);
        let bounce = n * reflected.dot(n);
        let tangential = reflected - bounce;
        let jitter = Vec2::new(
            rng.random_range(-tuning.perturbation..=tuning.perturbation),
            rng.random_range(-tuning.perturbation..=tuning.perturbation),
        );
        self.vel = bounce * tuning.peg_restitution * scale
            + tangential * tuning.tangent_friction
            + jitter;
        self.pos += n * (result.penetration + 0.01);

        self.peg_hits += 1;
        self.combo += peg.kind.combo_points();
        self.max_combo = self.max_combo.max(self.combo);
    }

    fn resolve_exit<R: Rng>(&self, width: f32, rewards: &RewardModel, rng: &mut R) -> BallExit {
        let half = (width / 2.0).max(f32::EPSILON);
        let edge = ((self.pos.x - half).abs() / half).clamp(0.0, 1.0);
        let speed = self.vel.length();
        let base_score = rewards.draw_base(rng);
        let reward = if self.reward_cooldown > 0 {
            0
        } else {
            rewards.exit_reward(base_score, speed, edge, self.combo)
        };
        BallExit {
            reward,
            base_score,
            jackpot: rewards.is_jackpot(base_score),
            edge,
            speed,
            combo: self.combo,
            max_combo: self.max_combo,
            peg_hits: self.peg_hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{FIELD_HEIGHT, FIELD_WIDTH};
    use crate::sim::peg::{PegKind, generate_layout};
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn model() -> RewardModel {
        RewardModel::new(RewardTuning::default(), BallTuning::default().speed_cap).unwrap()
    }

    #[test]
    fn test_in_play_returns_zero() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut ball = Ball::spawn(0, FIELD_WIDTH, &tuning, &mut rng);
        let step = ball.update(FIELD_WIDTH, FIELD_HEIGHT, &[], &tuning, &model(), &mut rng);
        assert_eq!(step, BallStep::InPlay);
        assert_eq!(step.reward(), 0);
    }

    #[test]
    fn test_gravity_pulls_down() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(2);
        let mut ball = Ball::new(0, Vec2::new(50.0, 10.0), tuning.radius);
        for _ in 0..10 {
            ball.update(FIELD_WIDTH, FIELD_HEIGHT, &[], &tuning, &model(), &mut rng);
        }
        assert!(ball.pos.y > 10.0);
        assert!(ball.vel.y > 0.0);
    }

    #[test]
    fn test_forced_exit_reward_in_documented_set() {
        let tuning = BallTuning::default();
        let rewards = model();
        let mut rng = Pcg32::seed_from_u64(5);
        for _ in 0..200 {
            let mut ball = Ball::new(
                0,
                Vec2::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT + tuning.radius + 1.0),
                tuning.radius,
            );
            let step = ball.update(FIELD_WIDTH, FIELD_HEIGHT, &[], &tuning, &rewards, &mut rng);
            let BallStep::Exited(exit) = step else {
                panic!("ball below the floor must exit");
            };
            assert!([0, 1, 2, 4, 8].contains(&exit.base_score));
            assert!(exit.reward <= exit.base_score);
            assert_eq!(exit.combo, 0);
        }
    }

    #[test]
    fn test_exit_reward_formula() {
        let rewards = model();
        // Zero speed, zero combo, dead center: floor(base × 0.5)
        assert_eq!(rewards.exit_reward(8, 0.0, 0.0, 0), 4);
        assert_eq!(rewards.exit_reward(1, 0.0, 0.0, 0), 0);
        // Full speed, capped combo, dead center doubles the base
        assert_eq!(rewards.exit_reward(8, 100.0, 0.0, 50), 16);
        // Edge exit loses half
        assert_eq!(rewards.exit_reward(8, 100.0, 1.0, 0), 4);
        // Negative combo never goes below factor 1.0
        assert_eq!(rewards.exit_reward(4, 100.0, 0.0, -10), 4);
        assert_eq!(rewards.exit_reward(0, 100.0, 0.0, 20), 0);
    }

    #[test]
    fn test_cooldown_exit_pays_nothing() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(9);
        let mut ball = Ball::new(0, Vec2::new(50.0, FIELD_HEIGHT + 5.0), tuning.radius);
        ball.reward_cooldown = 5;
        let step = ball.update(FIELD_WIDTH, FIELD_HEIGHT, &[], &tuning, &model(), &mut rng);
        assert!(matches!(step, BallStep::Exited(exit) if exit.reward == 0));
    }

    #[test]
    fn test_peg_hit_scores_combo() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(4);
        let mut pegs = vec![Peg::new(50.0, 20.0)];
        pegs[0].kind = PegKind::Gold;

        // Falling straight onto the peg
        let mut ball = Ball::new(0, Vec2::new(50.0, 16.0), tuning.radius);
        ball.vel = Vec2::new(0.0, 1.0);
        ball.update(FIELD_WIDTH, FIELD_HEIGHT, &pegs, &tuning, &model(), &mut rng);

        assert_eq!(ball.peg_hits, 1);
        assert_eq!(ball.combo, 3);
        assert_eq!(ball.max_combo, 3);
        assert!(ball.vel.y < 0.0, "ball should bounce back up");
        assert!(ball.pos.distance(pegs[0].pos) >= tuning.radius + tuning.peg_radius);
    }

    #[test]
    fn test_red_peg_lowers_combo_but_not_max() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(4);
        let mut pegs = vec![Peg::new(50.0, 20.0)];
        pegs[0].kind = PegKind::Red;

        let mut ball = Ball::new(0, Vec2::new(50.0, 16.0), tuning.radius);
        ball.vel = Vec2::new(0.0, 1.0);
        ball.combo = 5;
        ball.max_combo = 5;
        ball.update(FIELD_WIDTH, FIELD_HEIGHT, &pegs, &tuning, &model(), &mut rng);

        assert_eq!(ball.combo, 3);
        assert_eq!(ball.max_combo, 5);
    }

    #[test]
    fn test_wall_bounce_keeps_ball_inside() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(8);
        let mut ball = Ball::new(0, Vec2::new(FIELD_WIDTH - 2.5, 50.0), tuning.radius);
        ball.vel = Vec2::new(3.0, 0.0);
        ball.update(FIELD_WIDTH, FIELD_HEIGHT, &[], &tuning, &model(), &mut rng);
        assert!(ball.pos.x <= FIELD_WIDTH - tuning.radius);
        assert!(ball.vel.x < 0.0);
        assert!(ball.vel.x.abs() < 3.0, "wall hit must lose energy");
    }

    #[test]
    fn test_stalled_ball_gets_kicked() {
        let tuning = BallTuning::default();
        let mut rng = Pcg32::seed_from_u64(12);
        // Wedge the ball between three pegs with no velocity
        let pegs = vec![
            Peg::new(47.0, 53.0),
            Peg::new(53.0, 53.0),
            Peg::new(50.0, 55.0),
        ];
        let mut ball = Ball::new(0, Vec2::new(50.0, 50.0), tuning.radius);
        ball.update(FIELD_WIDTH, FIELD_HEIGHT, &pegs, &tuning, &model(), &mut rng);
        assert_eq!(ball.stall_kicks, 1);
        assert!(ball.vel.y < 0.0);
    }

    #[test]
    fn test_ball_always_reaches_floor() {
        let tuning = BallTuning::default();
        let rewards = model();
        let pegs = generate_layout(FIELD_WIDTH, FIELD_HEIGHT);
        let mut rng = Pcg32::seed_from_u64(77);
        for _ in 0..20 {
            let mut ball = Ball::spawn(0, FIELD_WIDTH, &tuning, &mut rng);
            let mut exited = false;
            for _ in 0..20_000 {
                if let BallStep::Exited(_) =
                    ball.update(FIELD_WIDTH, FIELD_HEIGHT, &pegs, &tuning, &rewards, &mut rng)
                {
                    exited = true;
                    break;
                }
            }
            assert!(exited, "ball stuck at {:?}", ball.pos);
        }
    }

    #[test]
    fn test_payout_units_bounded() {
        let rewards = model();
        let mut rng = Pcg32::seed_from_u64(21);
        let exit = BallExit {
            reward: 4,
            base_score: 8,
            jackpot: true,
            edge: 0.0,
            speed: 100.0,
            combo: 10,
            max_combo: 100,
            peg_hits: 500,
        };
        for _ in 0..100 {
            let units = rewards.payout_units(&exit, &mut rng);
            // 4 × 1.2 × 1.2 × 1.3 × 1.5 × 1.5 ≈ 16.8
            assert!((1..=17).contains(&units));
        }
        let nothing = BallExit { reward: 0, ..exit };
        assert_eq!(rewards.payout_units(&nothing, &mut rng), 0);
    }
}
