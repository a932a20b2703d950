//! Collision detection and response for the peg field
//!
//! Contact tests return a normal pointing toward the ball center so the
//! caller can reflect and push out along it. Degenerate geometry (zero
//! distance, zero speed) reports a miss rather than producing NaNs.

use glam::Vec2;

use super::peg::Peg;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Surface normal at collision (pointing toward ball center, for reflection)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Index and distance of the peg closest to `pos`
pub fn nearest_peg(pos: Vec2, pegs: &[Peg]) -> Option<(usize, f32)> {
    pegs.iter()
        .enumerate()
        .map(|(i, peg)| (i, peg.pos.distance_squared(pos)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, d2)| (i, d2.sqrt()))
}

/// Number of pegs within `radius` of `pos`
pub fn pegs_within(pos: Vec2, pegs: &[Peg], radius: f32) -> usize {
    let r2 = radius * radius;
    pegs.iter()
        .filter(|peg| peg.pos.distance_squared(pos) <= r2)
        .count()
}

/// Check overlap between the ball and a single peg
pub fn ball_peg_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    peg_pos: Vec2,
    peg_radius: f32,
) -> CollisionResult {
    let delta = ball_pos - peg_pos;
    let dist = delta.length();
    let contact = ball_radius + peg_radius;

    // Centers coincide: no usable normal
    if dist >= contact || dist < 1e-6 {
        return CollisionResult::miss();
    }

    CollisionResult {
        hit: true,
        normal: delta / dist,
        penetration: contact - dist,
    }
}

/// Check the ball against the side walls of a field of `width`
pub fn ball_wall_collision(ball_pos: Vec2, ball_radius: f32, width: f32) -> CollisionResult {
    if ball_pos.x - ball_radius < 0.0 {
        return CollisionResult {
            hit: true,
            normal: Vec2::X,
            penetration: ball_radius - ball_pos.x,
        };
    }
    if ball_pos.x + ball_radius > width {
        return CollisionResult {
            hit: true,
            normal: Vec2::NEG_X,
            penetration: ball_pos.x + ball_radius - width,
        };
    }
    CollisionResult::miss()
}

/// Mirror `velocity` across the contact plane with unit normal `n`
///
/// The normal component flips sign, the tangential one is untouched.
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// How head-on an impact is: 0 for grazing, 1 for straight into the surface
///
/// A stationary ball reports 0.
#[inline]
pub fn incidence(velocity: Vec2, normal: Vec2) -> f32 {
    let speed = velocity.length();
    if speed < 1e-6 {
        return 0.0;
    }
    (velocity.dot(normal).abs() / speed).clamp(0.0, 1.0)
}

/// Linear blend between grazing and head-on restitution
#[inline]
pub fn angle_damping(incidence: f32, grazing: f32, head_on: f32) -> f32 {
    grazing + (head_on - grazing) * incidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peg_collision_hit_and_normal() {
        let result = ball_peg_collision(Vec2::new(10.0, 8.0), 2.0, Vec2::new(10.0, 10.0), 1.5);
        assert!(result.hit);
        // Ball is above the peg, normal points up toward the ball
        assert!(result.normal.y < -0.99);
        assert!((result.penetration - 1.5).abs() < 1e-5);
    }

    #[test]
    fn test_peg_collision_miss_and_degenerate() {
        assert!(!ball_peg_collision(Vec2::new(0.0, 0.0), 2.0, Vec2::new(10.0, 0.0), 1.5).hit);
        // Exact overlap has no normal
        assert!(!ball_peg_collision(Vec2::new(5.0, 5.0), 2.0, Vec2::new(5.0, 5.0), 1.5).hit);
    }

    #[test]
    fn test_wall_collision() {
        let left = ball_wall_collision(Vec2::new(1.0, 50.0), 2.0, 100.0);
        assert!(left.hit);
        assert_eq!(left.normal, Vec2::X);

        let right = ball_wall_collision(Vec2::new(99.5, 50.0), 2.0, 100.0);
        assert!(right.hit);
        assert_eq!(right.normal, Vec2::NEG_X);

        assert!(!ball_wall_collision(Vec2::new(50.0, 50.0), 2.0, 100.0).hit);
    }

    #[test]
    fn test_reflect_off_peg_keeps_tangent() {
        // Falling ball landing on the upper-left shoulder of a peg
        let hit = ball_peg_collision(Vec2::new(10.0, 8.0), 2.0, Vec2::new(12.0, 10.0), 1.5);
        assert!(hit.hit);
        let v = Vec2::new(0.0, 2.0);
        let out = reflect_velocity(v, hit.normal);

        // Now moving away from the peg at the same speed
        assert!(out.dot(hit.normal) > 0.0);
        assert!((out.length() - v.length()).abs() < 1e-5);
        let tangent = hit.normal.perp();
        assert!((out.dot(tangent) - v.dot(tangent)).abs() < 1e-5);
    }

    #[test]
    fn test_incidence_and_damping() {
        assert!((incidence(Vec2::new(0.0, 3.0), Vec2::NEG_Y) - 1.0).abs() < 1e-6);
        assert!(incidence(Vec2::new(3.0, 0.0), Vec2::NEG_Y) < 1e-6);
        assert_eq!(incidence(Vec2::ZERO, Vec2::X), 0.0);

        assert!((angle_damping(0.0, 0.9, 0.6) - 0.9).abs() < 1e-6);
        assert!((angle_damping(1.0, 0.9, 0.6) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_and_cluster() {
        let pegs = vec![Peg::new(0.0, 0.0), Peg::new(5.0, 0.0), Peg::new(20.0, 0.0)];
        let (idx, dist) = nearest_peg(Vec2::new(4.0, 0.0), &pegs).unwrap();
        assert_eq!(idx, 1);
        assert!((dist - 1.0).abs() < 1e-5);
        assert_eq!(pegs_within(Vec2::new(2.5, 0.0), &pegs, 3.0), 2);
        assert!(nearest_peg(Vec2::ZERO, &[]).is_none());
    }
}
