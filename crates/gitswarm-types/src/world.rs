//! World entity model: authors, projects and in-flight contributions.
//!
//! A [`World`] is an immutable snapshot. The tick transition builds a new
//! value from the previous one; nothing here is mutated after publication.
//! All timestamps are simulation milliseconds since the run started, except
//! [`World::real_world_ts`] which is a source (epoch) timestamp.
//!
//! Render keys share one namespace across entity kinds. Each key starts
//! with the kind and quotes the names, so no two entities can map to the
//! same key whatever characters their names contain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::vector::Vec2;

/// A transient particle travelling from an author to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Contribution {
    /// Render key, see [`Contribution::render_key`].
    pub key: String,
    /// Name of the contributing author (lookup only).
    pub author: String,
    /// Name of the receiving project (lookup only).
    pub project: String,
    /// Number of coalesced events, in `[1, max_contribution_size]`.
    pub size: u32,
    /// Tick time at which the contribution was created.
    pub started: u64,
}

impl Contribution {
    /// Build a contribution created at `started`.
    pub fn new(author: &str, project: &str, size: u32, started: u64) -> Self {
        Self {
            key: Self::render_key(author, project, started),
            author: author.to_owned(),
            project: project.to_owned(),
            size,
            started,
        }
    }

    /// Key of the contribution from `author` to `project` created at
    /// `started`: `contribution:"{author}":"{project}":{started}`.
    pub fn render_key(author: &str, project: &str, started: u64) -> String {
        format!("contribution:{author:?}:{project:?}:{started}")
    }

    /// Age of the contribution at simulation time `now`.
    pub const fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.started)
    }
}

/// A contributor moving around the project cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Author {
    /// Render key, see [`Author::render_key`].
    pub key: String,
    /// Display name; the map key in [`World::authors`].
    pub name: String,
    /// Position in the simulation plane.
    pub pos: Vec2,
    /// Velocity per millisecond.
    pub speed: Vec2,
    /// Scalar speed budget in `[0, max_author_momentum]`.
    pub momentum: f64,
    /// Accumulated spin, grows by the momentum every tick.
    pub rotation: f64,
    /// Most recent contributions, oldest first.
    pub last_contributions: Vec<Contribution>,
    /// Last tick at which the author still had momentum.
    pub last_active_at: u64,
    /// Tick at which the author first appeared.
    pub started: u64,
}

impl Author {
    /// Key of author `name` first seen at `started`.
    pub fn render_key(name: &str, started: u64) -> String {
        format!("author:{name:?}:{started}")
    }

    /// The project of the author's latest contribution, if any.
    pub fn latest_project(&self) -> Option<&str> {
        self.last_contributions.last().map(|c| c.project.as_str())
    }
}

/// A project body; grows with contributions and shrinks every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Project {
    /// Render key, see [`Project::render_key`].
    pub key: String,
    /// Project name; the map key in [`World::projects`].
    pub name: String,
    /// Position in the simulation plane.
    pub pos: Vec2,
    /// Velocity per millisecond.
    pub speed: Vec2,
    /// Activity size in `[0, max_project_size]`.
    pub size: f64,
    /// Last tick at which the project still had a positive size.
    pub last_active_at: u64,
    /// Tick at which the project first appeared.
    pub started: u64,
}

impl Project {
    /// Key of project `name` first seen at `started`.
    pub fn render_key(name: &str, started: u64) -> String {
        format!("project:{name:?}:{started}")
    }
}

/// The simulation root aggregate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct World {
    /// Live authors keyed by name.
    pub authors: BTreeMap<String, Author>,
    /// Every project ever seen, keyed by name. Projects are never removed.
    pub projects: BTreeMap<String, Project>,
    /// Live contributions in arrival order.
    pub contributions: Vec<Contribution>,
    /// Simulation time of this snapshot.
    pub ts: u64,
    /// Source timestamp of the latest event applied, if any.
    pub real_world_ts: Option<i64>,
}

impl World {
    /// An empty world at time zero.
    pub fn new() -> Self {
        Self::default()
    }
}
