//! Two-dimensional vector math for the simulation plane.
//!
//! Positions, velocities and forces all live in the same cartesian plane.
//! Polar form is used where the simulation reasons about bearings (fan-out
//! placement, radial pushes) or about speed magnitude (friction).

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A cartesian vector or point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

/// A vector in polar form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Polar {
    /// Angle in radians, in `(-PI, PI]`.
    pub a: f64,
    /// Magnitude, never negative.
    pub r: f64,
}

impl Vec2 {
    /// The origin / null vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector along the positive x axis.
    pub const UNIT_X: Self = Self { x: 1.0, y: 0.0 };

    /// Build a vector from its components.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Multiply both components by `factor`.
    pub fn scale(self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Whether both components are finite.
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

/// Convert a cartesian vector to polar form.
pub fn cart_to_polar(v: Vec2) -> Polar {
    Polar {
        a: v.y.atan2(v.x),
        r: v.length(),
    }
}

/// Convert a polar vector to cartesian form.
pub fn polar_to_cart(p: Polar) -> Vec2 {
    Vec2 {
        x: p.r * p.a.cos(),
        y: p.r * p.a.sin(),
    }
}

/// Unit vector pointing from `src` to `dst`, and the distance between them.
///
/// Coincident points have no direction; they yield [`Vec2::UNIT_X`] and a
/// distance of zero instead of dividing by zero.
pub fn direction_and_distance(src: Vec2, dst: Vec2) -> (Vec2, f64) {
    let delta = dst - src;
    let dist = delta.length();
    if dist > 0.0 {
        (delta.scale(dist.recip()), dist)
    } else {
        (Vec2::UNIT_X, 0.0)
    }
}
