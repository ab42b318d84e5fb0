//! Render frames: what the renderer sees of a world snapshot.
//!
//! The renderer builds a scene object the first time a key appears, updates
//! its pose on every frame where the key is present, and releases it when
//! the key is listed in [`RenderFrame::removed`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::pose::Pose;

/// What kind of body a visible object stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ObjectKind {
    /// An author sphere.
    Author,
    /// A project sphere.
    Project,
    /// A contribution particle.
    Contribution,
}

/// Recipe the renderer uses to build an object on first appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ObjectBlueprint {
    /// Body kind.
    pub kind: ObjectKind,
    /// Sphere radius before the pose scale is applied.
    pub radius: f64,
    /// Project whose colour tints the object, if any.
    pub color_of: Option<String>,
    /// Avatar texture name for authors.
    pub avatar: Option<String>,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
}

/// One object of a render frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VisibleObject {
    /// Stable identity; the same key across frames is the same object.
    pub key: String,
    /// Build recipe, only meaningful the first time the key is seen.
    pub blueprint: ObjectBlueprint,
    /// Full transform for this frame.
    pub pose: Pose,
    /// Label to display next to the object.
    pub text: Option<String>,
}

/// Everything the renderer needs for one tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RenderFrame {
    /// Simulation time of the underlying snapshot.
    pub tick_ms: u64,
    /// Source timestamp of the snapshot, for the date display.
    pub real_world_ts: Option<i64>,
    /// Objects alive this tick.
    pub objects: Vec<VisibleObject>,
    /// Keys present in an earlier frame and gone from this one.
    pub removed: Vec<String>,
}
