//! Force primitives and the integration step shared by every body.
//!
//! All functions are pure and total: coincident points fall back to the
//! fixed direction from [`direction_and_distance`] instead of producing
//! NaN.

use gitswarm_types::{Polar, Vec2, cart_to_polar, direction_and_distance, polar_to_cart};

use crate::config::PhysicsConfig;

/// Constant-magnitude pull from `src` toward `dst`.
///
/// Zero when the points coincide.
pub fn pull_toward(src: Vec2, dst: Vec2, factor: f64) -> Vec2 {
    let (dir, dist) = direction_and_distance(src, dst);
    if dist > 0.0 {
        dir.scale(factor)
    } else {
        Vec2::ZERO
    }
}

/// Contact force on a body at `src` from a body at `dst`.
///
/// Bodies repel once their distance drops below half their visible sizes
/// plus the minimum clearance. The magnitude is the (negative) overlap
/// times the repulsion constant, capped at `max_repulsion`, applied along
/// the direction toward the other body, so the result points away from it.
pub fn repulsive_contact_force(
    src: Vec2,
    dst: Vec2,
    src_size: f64,
    dst_size: f64,
    physics: &PhysicsConfig,
) -> Vec2 {
    let (toward_other, dist) = direction_and_distance(src, dst);
    let visible_distance = src_size / 2.0 + dst_size / 2.0 + physics.minimum_clearance;
    let overlap = dist - visible_distance;
    if overlap < 0.0 {
        toward_other.scale((physics.repulsion_constant * overlap).min(physics.max_repulsion))
    } else {
        Vec2::ZERO
    }
}

/// Advance a body by one step of `dt` milliseconds.
///
/// Returns the new `(position, speed)`. Friction works on the speed
/// magnitude in polar form: the dynamic part removes a fraction of the
/// speed, the static part a fixed amount, and the result never goes below
/// zero or flips direction.
pub fn integrate(
    pos: Vec2,
    speed: Vec2,
    acceleration: Vec2,
    dt: f64,
    physics: &PhysicsConfig,
) -> (Vec2, Vec2) {
    let polar = cart_to_polar(speed + acceleration.scale(dt));
    let static_friction = physics.speed_static_friction * dt;
    let r = (polar.r * (1.0 - physics.speed_dynamic_friction) - static_friction).max(0.0);
    let speed = polar_to_cart(Polar { a: polar.a, r });
    (pos + speed.scale(dt), speed)
}

/// Display scale of a project of the given size.
pub fn visible_project_scale(size: f64, max_project_size: f64) -> f64 {
    0.3 + size / max_project_size
}

/// Repulsion diameter of a project of the given size.
pub fn visible_project_size(size: f64, max_project_size: f64, physics: &PhysicsConfig) -> f64 {
    physics.project_size_base * visible_project_scale(size, max_project_size)
}
