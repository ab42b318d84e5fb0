//! Contribution events and the paced batches built from them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One recorded contribution: `author` touched something in `project`.
///
/// This is the unit carried by the event log (`events.stream`, one JSON
/// object per line) and by the flow-controlled event stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ContributionEvent {
    /// Source timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
    /// Project identifier.
    pub project: String,
    /// Author display name.
    pub author: String,
}

impl ContributionEvent {
    /// Build an event.
    pub fn new(author: impl Into<String>, project: impl Into<String>, ts: i64) -> Self {
        Self {
            ts,
            project: project.into(),
            author: author.into(),
        }
    }
}

/// Events released by the scheduler for a single tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickBatch {
    /// Events in arrival order. May be empty.
    pub events: Vec<ContributionEvent>,
    /// Simulation time of this tick, in milliseconds since simulation start.
    pub elapsed_ms: u64,
    /// Source timestamp of the most recently released event.
    pub real_world_ts: i64,
}
