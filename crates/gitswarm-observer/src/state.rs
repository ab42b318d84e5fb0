//! Shared application state for the Observer server.
//!
//! [`AppState`] holds the frame broadcast channel, the receiving end of
//! the world snapshot channel, and the static run information loaded from
//! the work directory.

use std::path::PathBuf;
use std::sync::Arc;

use gitswarm_core::runner::SimulationEndReason;
use gitswarm_core::scheduler::StreamProgress;
use gitswarm_core::tick::TickSummary;
use gitswarm_types::{InfoPayload, RenderFrame, World};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast, watch};

/// Capacity of the broadcast channel for render frames.
///
/// A subscriber that falls behind by more than this many frames receives
/// [`broadcast::error::RecvError::Lagged`] and skips to the newest frame.
const BROADCAST_CAPACITY: usize = 256;

/// Progress of the simulation, served by `GET /api/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationStatus {
    /// Whether the simulation loop is still running.
    pub running: bool,
    /// World ticks applied so far.
    pub ticks: u64,
    /// Simulation time of the latest snapshot.
    pub elapsed_ms: u64,
    /// Source timestamp of the latest snapshot.
    pub real_world_ts: Option<i64>,
    /// Summary of the latest tick.
    pub last_tick: Option<TickSummary>,
    /// Event stream pacing and credit totals.
    pub stream: Option<StreamProgress>,
    /// Why the run ended, once it has.
    pub end_reason: Option<SimulationEndReason>,
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for render frames.
    pub frames: broadcast::Sender<RenderFrame>,
    /// Latest published world snapshot.
    pub world: watch::Receiver<Arc<World>>,
    /// Simulation progress, updated each tick.
    pub status: Arc<RwLock<SimulationStatus>>,
    /// Run metadata from the work directory.
    pub info: InfoPayload,
    /// Event log replayed by `/ws/events`.
    pub event_log: PathBuf,
    /// Directory served under `/avatars`.
    pub avatars_dir: PathBuf,
}

impl AppState {
    /// Create the state for a run.
    pub fn new(
        info: InfoPayload,
        event_log: PathBuf,
        avatars_dir: PathBuf,
        world: watch::Receiver<Arc<World>>,
    ) -> Self {
        let (frames, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            frames,
            world,
            status: Arc::new(RwLock::new(SimulationStatus {
                running: true,
                ..SimulationStatus::default()
            })),
            info,
            event_log,
            avatars_dir,
        }
    }

    /// Subscribe to the frame broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<RenderFrame> {
        self.frames.subscribe()
    }

    /// Publish a frame to all connected clients.
    ///
    /// Returns the number of receivers. Zero when no client is connected,
    /// which is not an error.
    pub fn broadcast(&self, frame: RenderFrame) -> usize {
        self.frames.send(frame).unwrap_or(0)
    }

    /// The latest world snapshot.
    pub fn current_world(&self) -> Arc<World> {
        Arc::clone(&self.world.borrow())
    }
}
