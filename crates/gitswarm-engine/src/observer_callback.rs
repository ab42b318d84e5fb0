//! Tick callback that feeds the Observer.
//!
//! After each tick this callback renders the snapshot into a frame for the
//! `/ws/frames` clients and refreshes the status served by `/api/status`.

use std::sync::Arc;

use gitswarm_core::render::RenderSession;
use gitswarm_core::runner::TickCallback;
use gitswarm_core::scheduler::StreamProgress;
use gitswarm_core::tick::TickSummary;
use gitswarm_observer::state::AppState;
use gitswarm_types::World;
use tracing::debug;

/// Callback that bridges the tick loop to the Observer.
pub struct ObserverCallback {
    state: Arc<AppState>,
    session: RenderSession,
    ticks: u64,
}

impl ObserverCallback {
    /// Create a callback publishing into `state`.
    pub const fn new(state: Arc<AppState>, session: RenderSession) -> Self {
        Self {
            state,
            session,
            ticks: 0,
        }
    }
}

impl TickCallback for ObserverCallback {
    fn on_tick(&mut self, summary: &TickSummary, world: &Arc<World>) {
        self.ticks = self.ticks.saturating_add(1);

        let frame = self.session.frame(world);
        let removed = frame.removed.len();
        let receivers = self.state.broadcast(frame);
        debug!(
            elapsed_ms = summary.elapsed_ms,
            receivers,
            removed,
            "Frame broadcast sent"
        );

        // Skip the update if a handler holds the lock; the next tick
        // catches up.
        if let Ok(mut status) = self.state.status.try_write() {
            status.ticks = self.ticks;
            status.elapsed_ms = world.ts;
            status.real_world_ts = world.real_world_ts;
            status.last_tick = Some(summary.clone());
        }
    }

    fn on_stream(&mut self, progress: &StreamProgress) {
        if let Ok(mut status) = self.state.status.try_write() {
            status.stream = Some(*progress);
        }
    }
}
