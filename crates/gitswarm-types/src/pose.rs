//! 4x4 affine transforms handed to the renderer.
//!
//! Matrices are stored column-major, the layout WebGL renderers expect, so a
//! [`Pose`] can be uploaded as-is. Composition multiplies left to right:
//! `compose(&[a, b])` applies `b` first, then `a`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A column-major 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Pose {
    /// Matrix elements, column-major.
    pub m: [f64; 16],
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity transform.
    pub const fn identity() -> Self {
        Self {
            m: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub const fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            m: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                dx, dy, dz, 1.0,
            ],
        }
    }

    /// Per-axis scaling.
    pub const fn scaling(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            m: [
                sx, 0.0, 0.0, 0.0, //
                0.0, sy, 0.0, 0.0, //
                0.0, 0.0, sz, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    /// Uniform scaling by `s`.
    pub const fn uniform_scaling(s: f64) -> Self {
        Self::scaling(s, s, s)
    }

    /// Rotation of `angle` radians around `axis`.
    ///
    /// The axis does not need to be normalized. A zero axis yields the
    /// identity.
    pub fn rotation(axis: [f64; 3], angle: f64) -> Self {
        let [ax, ay, az] = axis;
        let len = ax.hypot(ay).hypot(az);
        if len <= 0.0 {
            return Self::identity();
        }
        let half = angle / 2.0;
        let s = half.sin() / len;
        let (x, y, z, w) = (ax * s, ay * s, az * s, half.cos());

        let (x2, y2, z2) = (x + x, y + y, z + z);
        let (xx, xy, xz) = (x * x2, x * y2, x * z2);
        let (yy, yz, zz) = (y * y2, y * z2, z * z2);
        let (wx, wy, wz) = (w * x2, w * y2, w * z2);

        Self {
            m: [
                1.0 - (yy + zz),
                xy + wz,
                xz - wy,
                0.0,
                xy - wz,
                1.0 - (xx + zz),
                yz + wx,
                0.0,
                xz + wy,
                yz - wx,
                1.0 - (xx + yy),
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }

    /// Matrix product `self * rhs`.
    #[allow(clippy::indexing_slicing)]
    pub fn multiply(&self, rhs: &Self) -> Self {
        // Indices stay within 0..16 for every (row, col, k) in 0..4.
        let m = std::array::from_fn(|idx| {
            let (row, col) = (idx % 4, idx / 4);
            (0..4)
                .map(|k| self.m[k * 4 + row] * rhs.m[col * 4 + k])
                .sum()
        });
        Self { m }
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        let [x, y, z] = p;
        [
            m[0] * x + m[4] * y + m[8] * z + m[12],
            m[1] * x + m[5] * y + m[9] * z + m[13],
            m[2] * x + m[6] * y + m[10] * z + m[14],
        ]
    }

    /// The translation part of the transform.
    pub const fn origin(&self) -> [f64; 3] {
        [self.m[12], self.m[13], self.m[14]]
    }
}

/// Multiply `poses` left to right, starting from the identity.
pub fn compose(poses: &[Pose]) -> Pose {
    poses
        .iter()
        .fold(Pose::identity(), |acc, pose| acc.multiply(pose))
}
