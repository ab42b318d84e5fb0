//! Shared type definitions for the gitswarm simulation.
//!
//! This crate is the single source of truth for the values that cross crate
//! and process boundaries: the event log entries, the world snapshots and the
//! render frames. Types flow downstream to `TypeScript` via `ts-rs` for the
//! browser renderer.
//!
//! # Modules
//!
//! - [`vector`] -- 2D cartesian/polar vector math
//! - [`pose`] -- Column-major 4x4 transforms for render poses
//! - [`event`] -- Contribution events and paced tick batches
//! - [`world`] -- World snapshot, authors, projects, contributions
//! - [`frame`] -- Render frames and visible objects
//! - [`info`] -- Run metadata served to the renderer

pub mod event;
pub mod frame;
pub mod info;
pub mod pose;
pub mod vector;
pub mod world;

// Re-export all public types at crate root for convenience.
pub use event::{ContributionEvent, TickBatch};
pub use frame::{ObjectBlueprint, ObjectKind, RenderFrame, VisibleObject};
pub use info::{InfoPayload, ProjectInfo};
pub use pose::{Pose, compose};
pub use vector::{Polar, Vec2, cart_to_polar, direction_and_distance, polar_to_cart};
pub use world::{Author, Contribution, Project, World};
