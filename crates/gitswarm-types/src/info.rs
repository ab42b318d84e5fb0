//! Static run information served to the renderer at startup.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Display metadata of one configured project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProjectInfo {
    /// Project name as it appears in events.
    pub name: String,
    /// CSS colour used for the project and its contributions.
    pub color: String,
}

/// Payload of `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InfoPayload {
    /// Title shown by the renderer.
    pub title: String,
    /// Distinct author display names, used to preload avatars.
    pub authors: Vec<String>,
    /// Configured projects.
    pub projects: Vec<ProjectInfo>,
}
