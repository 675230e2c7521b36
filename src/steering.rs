//! Steering sub-behaviors blended by the stepper.
//!
//! Each behavior returns a steering force already limited to the agent's max
//! force; the stepper scales them by their weights and sums.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Behavior weights and geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub food_weight: f32,
    pub mate_weight: f32,
    pub wall_weight: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub wander_weight: f32,
    /// Distance from an edge where wall repulsion starts
    pub wall_margin: f32,
    /// Neighbors closer than this push each other apart
    pub separation_radius: f32,
    /// Speed tapers linearly inside this distance of the goal
    pub slow_radius: f32,
    /// Speed is zero inside this distance of the goal
    pub stop_radius: f32,
    /// Mean reversion rate of the wander process
    pub ou_theta: f32,
    /// Volatility of the wander process
    pub ou_sigma: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            food_weight: 1.0,
            mate_weight: 1.2,
            wall_weight: 2.0,
            separation_weight: 1.5,
            alignment_weight: 0.4,
            cohesion_weight: 0.3,
            wander_weight: 0.6,
            wall_margin: 40.0,
            separation_radius: 14.0,
            slow_radius: 30.0,
            stop_radius: 2.0,
            ou_theta: 1.2,
            ou_sigma: 0.8,
        }
    }
}

/// Clamp a vector's length to `max` (zero for non-positive limits).
#[inline]
pub fn limit(v: Vec2, max: f32) -> Vec2 {
    if !(max > 0.0) || !v.is_finite() {
        return Vec2::ZERO;
    }
    v.clamp_length_max(max)
}

/// Desired speed near a goal: full outside `slow`, linear taper inside, zero inside `stop`.
pub fn arrive_speed(distance: f32, max_speed: f32, slow: f32, stop: f32) -> f32 {
    if distance <= stop {
        0.0
    } else if distance < slow && slow > stop {
        max_speed * (distance - stop) / (slow - stop)
    } else {
        max_speed
    }
}

/// Seek a target at full speed
pub fn seek(pos: Vec2, vel: Vec2, target: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
    let desired = (target - pos).normalize_or_zero() * max_speed;
    limit(desired - vel, max_force)
}

/// Seek a target, slowing down on approach
pub fn arrive(
    pos: Vec2,
    vel: Vec2,
    target: Vec2,
    max_speed: f32,
    max_force: f32,
    slow: f32,
    stop: f32,
) -> Vec2 {
    let offset = target - pos;
    let speed = arrive_speed(offset.length(), max_speed, slow, stop);
    let desired = offset.normalize_or_zero() * speed;
    limit(desired - vel, max_force)
}

/// Repulsion from the arena edges, growing linearly inside `margin`
pub fn wall_avoidance(pos: Vec2, bounds: Vec2, margin: f32, max_force: f32) -> Vec2 {
    if !(margin > 0.0) {
        return Vec2::ZERO;
    }
    let mut push = Vec2::ZERO;
    if pos.x < margin {
        push.x += 1.0 - (pos.x.max(0.0) / margin);
    }
    if bounds.x - pos.x < margin {
        push.x -= 1.0 - ((bounds.x - pos.x).max(0.0) / margin);
    }
    if pos.y < margin {
        push.y += 1.0 - (pos.y.max(0.0) / margin);
    }
    if bounds.y - pos.y < margin {
        push.y -= 1.0 - ((bounds.y - pos.y).max(0.0) / margin);
    }
    limit(push * max_force, max_force)
}

/// Accumulated view of an agent's neighbors for the flocking terms
#[derive(Debug, Clone, Copy, Default)]
pub struct Neighborhood {
    pub count: usize,
    pub position_sum: Vec2,
    pub velocity_sum: Vec2,
    /// Sum of inverse-distance-weighted away vectors from close neighbors
    pub repulsion: Vec2,
}

impl Neighborhood {
    /// Record one neighbor seen from `pos`
    pub fn add(&mut self, pos: Vec2, other_pos: Vec2, other_vel: Vec2, separation_radius: f32) {
        self.count += 1;
        self.position_sum += other_pos;
        self.velocity_sum += other_vel;

        let away = pos - other_pos;
        let d = away.length();
        if d < separation_radius {
            if d > 1e-4 {
                self.repulsion += away / (d * d);
            } else {
                // Coincident agents: nudge along a fixed axis
                self.repulsion += Vec2::X;
            }
        }
    }

    /// Steer away from crowded neighbors
    pub fn separation(&self, vel: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
        if self.repulsion == Vec2::ZERO {
            return Vec2::ZERO;
        }
        let desired = self.repulsion.normalize_or_zero() * max_speed;
        limit(desired - vel, max_force)
    }

    /// Match the neighborhood's average heading
    pub fn alignment(&self, vel: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
        if self.count == 0 {
            return Vec2::ZERO;
        }
        let heading = (self.velocity_sum / self.count as f32).normalize_or_zero();
        if heading == Vec2::ZERO {
            return Vec2::ZERO;
        }
        limit(heading * max_speed - vel, max_force)
    }

    /// Steer toward the neighborhood centroid
    pub fn cohesion(&self, pos: Vec2, vel: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
        if self.count == 0 {
            return Vec2::ZERO;
        }
        let centroid = self.position_sum / self.count as f32;
        seek(pos, vel, centroid, max_speed, max_force)
    }
}

/// Standard normal sample via Box-Muller
pub fn gaussian(rng: &mut impl Rng) -> f32 {
    let u1: f32 = rng.gen::<f32>().max(f32::EPSILON);
    let u2: f32 = rng.gen::<f32>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

/// One Euler-Maruyama step of a zero-mean Ornstein-Uhlenbeck process per axis
pub fn ou_step(state: Vec2, theta: f32, sigma: f32, dt: f32, rng: &mut impl Rng) -> Vec2 {
    let noise = Vec2::new(gaussian(rng), gaussian(rng));
    let next = state - theta.max(0.0) * state * dt + sigma.max(0.0) * dt.max(0.0).sqrt() * noise;
    if next.is_finite() {
        next
    } else {
        Vec2::ZERO
    }
}

/// Keep a body inside `[0, bounds]`, reflecting the outward velocity component at half speed
pub fn confine(pos: Vec2, vel: Vec2, bounds: Vec2) -> (Vec2, Vec2) {
    let mut p = pos;
    let mut v = vel;
    if p.x < 0.0 {
        p.x = 0.0;
        v.x = v.x.abs() * 0.5;
    } else if p.x > bounds.x {
        p.x = bounds.x;
        v.x = -v.x.abs() * 0.5;
    }
    if p.y < 0.0 {
        p.y = 0.0;
        v.y = v.y.abs() * 0.5;
    } else if p.y > bounds.y {
        p.y = bounds.y;
        v.y = -v.y.abs() * 0.5;
    }
    (p, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_arrive_speed_profile() {
        assert_eq!(arrive_speed(100.0, 50.0, 30.0, 2.0), 50.0);
        assert_eq!(arrive_speed(1.0, 50.0, 30.0, 2.0), 0.0);
        assert!((arrive_speed(16.0, 50.0, 30.0, 2.0) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_seek_points_at_target() {
        let force = seek(Vec2::ZERO, Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0, 100.0);
        assert!(force.x > 0.0);
        assert!(force.y.abs() < 1e-6);
    }

    #[test]
    fn test_arrive_brakes_inside_stop_radius() {
        let vel = Vec2::new(3.0, 0.0);
        let force = arrive(Vec2::ZERO, vel, Vec2::new(1.0, 0.0), 5.0, 100.0, 30.0, 2.0);
        assert!(force.x < 0.0, "should decelerate, got {:?}", force);
    }

    #[test]
    fn test_wall_avoidance_pushes_inward() {
        let bounds = Vec2::new(100.0, 100.0);
        let f = wall_avoidance(Vec2::new(5.0, 50.0), bounds, 20.0, 10.0);
        assert!(f.x > 0.0);
        let f = wall_avoidance(Vec2::new(50.0, 98.0), bounds, 20.0, 10.0);
        assert!(f.y < 0.0);
        let f = wall_avoidance(Vec2::new(50.0, 50.0), bounds, 20.0, 10.0);
        assert_eq!(f, Vec2::ZERO);
    }

    #[test]
    fn test_flocking_terms() {
        let pos = Vec2::new(50.0, 50.0);
        let mut nb = Neighborhood::default();
        nb.add(pos, Vec2::new(55.0, 50.0), Vec2::new(0.0, 4.0), 14.0);
        nb.add(pos, Vec2::new(60.0, 50.0), Vec2::new(0.0, 4.0), 14.0);

        assert!(nb.separation(Vec2::ZERO, 5.0, 10.0).x < 0.0);
        assert!(nb.cohesion(pos, Vec2::ZERO, 5.0, 10.0).x > 0.0);
        assert!(nb.alignment(Vec2::ZERO, 5.0, 10.0).y > 0.0);
    }

    #[test]
    fn test_empty_neighborhood_is_inert() {
        let nb = Neighborhood::default();
        assert_eq!(nb.alignment(Vec2::ONE, 5.0, 10.0), Vec2::ZERO);
        assert_eq!(nb.cohesion(Vec2::ZERO, Vec2::ONE, 5.0, 10.0), Vec2::ZERO);
        assert_eq!(nb.separation(Vec2::ONE, 5.0, 10.0), Vec2::ZERO);
    }

    #[test]
    fn test_ou_mean_reverts() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut state = Vec2::new(10.0, -10.0);
        for _ in 0..600 {
            state = ou_step(state, 1.2, 0.0, 1.0 / 60.0, &mut rng);
        }
        assert!(state.length() < 0.01);
    }

    #[test]
    fn test_confine_clamps_and_reflects() {
        let bounds = Vec2::new(100.0, 100.0);
        let (p, v) = confine(Vec2::new(-3.0, 120.0), Vec2::new(-4.0, 6.0), bounds);
        assert_eq!(p, Vec2::new(0.0, 100.0));
        assert!(v.x > 0.0 && v.y < 0.0);
    }

    #[test]
    fn test_limit_handles_degenerate_input() {
        assert_eq!(limit(Vec2::new(f32::NAN, 1.0), 5.0), Vec2::ZERO);
        assert_eq!(limit(Vec2::new(3.0, 4.0), 0.0), Vec2::ZERO);
        assert!((limit(Vec2::new(30.0, 40.0), 5.0).length() - 5.0).abs() < 1e-4);
    }
}
