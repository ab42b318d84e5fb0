//! Simulation loop: drives the scheduler clock and applies tick batches.
//!
//! [`run_simulation`] multiplexes two inputs with `tokio::select!`:
//!
//! - **Source messages** -- readiness, events and completion, fed straight
//!   into the [`EventScheduler`]
//! - **The tick interval** -- every `tick_interval_ms` the scheduler is asked
//!   for a batch, which [`tick::advance`] turns into the next snapshot
//!
//! Each snapshot is published as an `Arc<World>` through a `watch` channel
//! and handed to a [`TickCallback`]. The loop ends when the scheduler
//! reaches its terminal state.

use std::sync::Arc;
use std::time::Duration;

use gitswarm_types::World;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::scheduler::{EventScheduler, SchedulerError, SchedulerState, StreamProgress};
use crate::source::{SourceLink, SourceMessage};
use crate::tick::{self, TickSummary};

/// Errors that end a simulation run early.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The source broke the event protocol.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationEndReason {
    /// The source completed and every buffered event was applied.
    StreamCompleted,
    /// The source went away without completing; buffered events were still
    /// applied.
    SourceClosed,
}

/// Outcome of a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// Why the run ended.
    pub end_reason: SimulationEndReason,
    /// Number of world ticks applied.
    pub total_ticks: u64,
    /// The last snapshot.
    pub final_world: Arc<World>,
    /// Summary of the last applied tick, if any.
    pub final_summary: Option<TickSummary>,
}

/// Callback invoked after each world tick.
///
/// Used by the engine to render frames and update the observer.
pub trait TickCallback: Send {
    /// Called with the summary and the freshly published snapshot.
    fn on_tick(&mut self, summary: &TickSummary, world: &Arc<World>);

    /// Called after every scheduler tick, including ticks without a batch.
    fn on_stream(&mut self, _progress: &StreamProgress) {}

    /// Called once when the run ends.
    fn on_end(&mut self, _result: &SimulationResult) {}
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _world: &Arc<World>) {}
}

/// Run the simulation until the event stream is exhausted.
///
/// # Errors
///
/// Returns [`RunnerError`] if the source violates the credit protocol.
pub async fn run_simulation(
    config: &SimulationConfig,
    mut link: SourceLink,
    snapshots: &watch::Sender<Arc<World>>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut scheduler = EventScheduler::new(config.stream.clone());
    let mut world = Arc::new(World::new());
    let mut final_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut source_open = true;
    let mut end_reason = SimulationEndReason::StreamCompleted;

    let period = Duration::from_millis(config.world.tick_interval_ms.max(1));
    let start = Instant::now();
    let mut interval = tokio::time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_interval_ms = config.world.tick_interval_ms,
        speedup = config.stream.events_speedup_factor,
        "Simulation starting"
    );

    loop {
        tokio::select! {
            biased;
            message = link.messages.recv(), if source_open => match message {
                Some(SourceMessage::Ready) => {
                    if let Some(credits) = scheduler.on_source_ready() {
                        request(&link, credits).await;
                    }
                }
                Some(SourceMessage::Event(event)) => scheduler.on_event(event)?,
                Some(SourceMessage::Completed) => scheduler.on_source_completed(),
                None => {
                    source_open = false;
                    if matches!(
                        scheduler.state(),
                        SchedulerState::WaitingForReady | SchedulerState::Streaming
                    ) {
                        warn!(
                            buffered = scheduler.buffered(),
                            "Event source closed without completing"
                        );
                        end_reason = SimulationEndReason::SourceClosed;
                        scheduler.on_source_completed();
                    }
                }
            },
            _ = interval.tick() => {
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                let outcome = scheduler.tick(elapsed_ms)?;
                callback.on_stream(&scheduler.progress());

                if let Some(credits) = outcome.request {
                    request(&link, credits).await;
                }
                if outcome.completed {
                    break;
                }
                if let Some(batch) = outcome.batch {
                    let result = tick::advance(&world, &batch, config);
                    world = Arc::new(result.world);
                    snapshots.send_replace(Arc::clone(&world));
                    callback.on_tick(&result.summary, &world);
                    total_ticks = total_ticks.saturating_add(1);

                    if total_ticks % 500 == 0 {
                        info!(
                            total_ticks,
                            elapsed_ms,
                            authors = result.summary.authors,
                            projects = result.summary.projects,
                            contributions = result.summary.contributions,
                            "Simulation progress"
                        );
                    }
                    final_summary = Some(result.summary);
                }
            }
        }
    }

    let result = SimulationResult {
        end_reason,
        total_ticks,
        final_world: world,
        final_summary,
    };
    callback.on_end(&result);
    Ok(result)
}

async fn request(link: &SourceLink, credits: u64) {
    if link.requests.send(credits).await.is_err() {
        debug!(credits, "Source gone, credit request dropped");
    }
}

/// Log the simulation end.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_ts = result.final_world.ts,
        authors = result.final_world.authors.len(),
        projects = result.final_world.projects.len(),
        "Simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use futures::stream;
    use gitswarm_types::ContributionEvent;
    use tokio::sync::mpsc;

    use super::*;
    use crate::source::{ControlledStream, spawn_source};

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.stream.events_speedup_factor = 1_000.0;
        config
    }

    fn link(events: Vec<ContributionEvent>) -> SourceLink {
        spawn_source(ControlledStream::new(stream::iter(events)), 16)
    }

    struct Recorder {
        ticks: Vec<u64>,
        ended: bool,
    }

    impl TickCallback for Recorder {
        fn on_tick(&mut self, summary: &TickSummary, world: &Arc<World>) {
            assert_eq!(summary.elapsed_ms, world.ts);
            self.ticks.push(world.ts);
        }

        fn on_end(&mut self, _result: &SimulationResult) {
            self.ended = true;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replays_log_to_completion() {
        let events = vec![
            ContributionEvent::new("a", "p", 0),
            ContributionEvent::new("a", "p", 1),
            ContributionEvent::new("b", "p", 2),
        ];
        let (tx, rx) = watch::channel(Arc::new(World::new()));
        let mut recorder = Recorder {
            ticks: Vec::new(),
            ended: false,
        };

        let result = run_simulation(&config(), link(events), &tx, &mut recorder)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::StreamCompleted);
        assert!(result.total_ticks >= 1);
        assert!(recorder.ended);
        assert_eq!(recorder.ticks.len() as u64, result.total_ticks);
        assert!(recorder.ticks.windows(2).all(|w| w[0] < w[1]));

        let world = &result.final_world;
        assert_eq!(world.projects.len(), 1);
        assert!(world.authors.contains_key("a"));
        assert!(world.authors.contains_key("b"));
        assert_eq!(rx.borrow().ts, world.ts);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_events_by_timestamp() {
        // The second event is due 100 ms into the run.
        let events = vec![
            ContributionEvent::new("a", "p", 0),
            ContributionEvent::new("b", "q", 100_000),
        ];
        let (tx, _rx) = watch::channel(Arc::new(World::new()));

        let result = run_simulation(&config(), link(events), &tx, &mut NoOpCallback)
            .await
            .unwrap();

        let world = &result.final_world;
        assert!(world.ts >= 100);
        assert_eq!(world.projects.len(), 2);
        assert_eq!(world.authors["b"].started, world.projects["q"].started);
        assert!(world.authors["b"].started >= 100);
        assert!(world.authors["a"].started < 100);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_source_ends_run() {
        let (requests, _request_rx) = mpsc::channel(1);
        let (message_tx, messages) = mpsc::channel(1);
        drop(message_tx);
        let link = SourceLink {
            requests,
            messages,
            task: tokio::spawn(async {}),
        };
        let (tx, _rx) = watch::channel(Arc::new(World::new()));

        let result = run_simulation(&config(), link, &tx, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::SourceClosed);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn event_before_ready_is_a_protocol_error() {
        let (requests, _request_rx) = mpsc::channel(1);
        let (message_tx, messages) = mpsc::channel(4);
        message_tx
            .send(SourceMessage::Event(ContributionEvent::new("a", "p", 0)))
            .await
            .unwrap();
        let link = SourceLink {
            requests,
            messages,
            task: tokio::spawn(async {}),
        };
        let (tx, _rx) = watch::channel(Arc::new(World::new()));

        let result = run_simulation(&config(), link, &tx, &mut NoOpCallback).await;
        assert!(matches!(result, Err(RunnerError::Scheduler { .. })));
    }
}
