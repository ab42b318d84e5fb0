//! Event pacing: turns a source-timestamped event log into per-tick batches.
//!
//! The scheduler is a clock-free state machine. The runner feeds it source
//! messages as they arrive and calls [`EventScheduler::tick`] with the
//! elapsed simulation time at every tick. Event timestamps are rebased onto
//! the simulation clock as
//!
//! `(event.ts - first_event_ts) / speedup_factor`
//!
//! and released once that offset is reached. Credits are requested from the
//! source ahead of consumption, at most one chunk per tick and only while
//! the source is actually delivering.
//!
//! ```text
//! WaitingForReady -> Streaming -> Draining -> Completed
//! ```

use std::collections::VecDeque;

use gitswarm_types::{ContributionEvent, TickBatch};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::flow::{CreditLedger, FlowControlError};

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// The source has not signalled readiness yet.
    WaitingForReady,
    /// Credits granted, events flowing.
    Streaming,
    /// The source is exhausted; buffered events are still being released.
    Draining,
    /// Everything released. Terminal.
    Completed,
}

/// Protocol violations observed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A source message arrived in a state that cannot accept it.
    #[error("unexpected {message} while {state:?}")]
    UnexpectedMessage {
        /// What arrived.
        message: &'static str,
        /// State at the time.
        state: SchedulerState,
    },

    /// The credit contract was broken.
    #[error(transparent)]
    FlowControl(#[from] FlowControlError),
}

/// What one scheduler tick produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Batch for the world, absent until the first event has been released.
    pub batch: Option<TickBatch>,
    /// Credits to request from the source.
    pub request: Option<u64>,
    /// The stream has ended; no further batches will follow.
    pub completed: bool,
}

/// Point-in-time view of the scheduler, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamProgress {
    /// Lifecycle state.
    pub state: SchedulerState,
    /// Consumer-side credit totals.
    pub credits: CreditLedger,
    /// Events waiting for their release time.
    pub buffered: usize,
}

/// Paces buffered events into tick batches under a credit contract.
#[derive(Debug, Clone)]
pub struct EventScheduler {
    config: StreamConfig,
    state: SchedulerState,
    buffer: VecDeque<ContributionEvent>,
    ledger: CreditLedger,
    first_event_ts: Option<i64>,
    real_world_ts: Option<i64>,
    arriving: bool,
}

impl EventScheduler {
    /// A scheduler waiting for its source.
    pub const fn new(config: StreamConfig) -> Self {
        Self {
            config,
            state: SchedulerState::WaitingForReady,
            buffer: VecDeque::new(),
            ledger: CreditLedger::new(),
            first_event_ts: None,
            real_world_ts: None,
            arriving: false,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Credit totals on the consumer side.
    pub const fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    /// Events received but not yet released.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Snapshot of state, credits and buffer depth.
    pub fn progress(&self) -> StreamProgress {
        StreamProgress {
            state: self.state,
            credits: self.ledger,
            buffered: self.buffer.len(),
        }
    }

    /// The source is ready. Returns the initial credit request.
    ///
    /// Repeated readiness signals are ignored.
    pub fn on_source_ready(&mut self) -> Option<u64> {
        if self.state != SchedulerState::WaitingForReady {
            return None;
        }
        self.state = SchedulerState::Streaming;
        let initial = self
            .config
            .events_buffer_allowance
            .saturating_add(self.config.events_buffer_chunk_size);
        self.ledger.grant(initial);
        info!(credits = initial, "Event source ready");
        Some(initial)
    }

    /// Buffer one delivered event.
    pub fn on_event(&mut self, event: ContributionEvent) -> Result<(), SchedulerError> {
        if self.state != SchedulerState::Streaming {
            return Err(SchedulerError::UnexpectedMessage {
                message: "event",
                state: self.state,
            });
        }
        self.ledger.record_received()?;
        self.first_event_ts.get_or_insert(event.ts);
        self.buffer.push_back(event);
        self.arriving = true;
        Ok(())
    }

    /// The source will send nothing more.
    pub fn on_source_completed(&mut self) {
        match self.state {
            SchedulerState::WaitingForReady | SchedulerState::Streaming => {
                info!(buffered = self.buffer.len(), "Event source completed");
                self.state = SchedulerState::Draining;
            }
            SchedulerState::Draining | SchedulerState::Completed => {}
        }
    }

    /// Release every event due at `elapsed_ms` and decide on a credit request.
    pub fn tick(&mut self, elapsed_ms: u64) -> Result<TickOutcome, SchedulerError> {
        if self.state == SchedulerState::Completed {
            return Ok(TickOutcome {
                completed: true,
                ..TickOutcome::default()
            });
        }
        if self.state == SchedulerState::Draining && self.buffer.is_empty() {
            self.state = SchedulerState::Completed;
            info!(
                elapsed_ms,
                consumed = self.ledger.consumed(),
                "Event stream completed"
            );
            return Ok(TickOutcome {
                completed: true,
                ..TickOutcome::default()
            });
        }

        let events = self.drain_due(elapsed_ms);
        self.ledger.record_consumed(events.len() as u64)?;
        if let Some(last) = events.last() {
            self.real_world_ts = Some(last.ts);
        }

        let batch = self.real_world_ts.map(|real_world_ts| TickBatch {
            events,
            elapsed_ms,
            real_world_ts,
        });

        let mut request = None;
        let below_allowance = self
            .ledger
            .consumed()
            .saturating_add(self.config.events_buffer_allowance)
            > self.ledger.requested();
        if self.state == SchedulerState::Streaming && below_allowance && self.arriving {
            let chunk = self.config.events_buffer_chunk_size;
            self.ledger.grant(chunk);
            self.arriving = false;
            debug!(
                elapsed_ms,
                chunk,
                requested = self.ledger.requested(),
                consumed = self.ledger.consumed(),
                "Requesting more events"
            );
            request = Some(chunk);
        }

        Ok(TickOutcome {
            batch,
            request,
            completed: false,
        })
    }

    /// Pop the buffered events whose rebased offset is at most `elapsed_ms`.
    fn drain_due(&mut self, elapsed_ms: u64) -> Vec<ContributionEvent> {
        let Some(first) = self.first_event_ts else {
            return Vec::new();
        };
        let speedup = self.config.events_speedup_factor;
        let now = elapsed_ms as f64;
        let mut due = Vec::new();
        while let Some(event) = self.buffer.front() {
            let offset = event.ts.saturating_sub(first) as f64 / speedup;
            if offset > now {
                break;
            }
            if let Some(event) = self.buffer.pop_front() {
                due.push(event);
            }
        }
        due
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn config() -> StreamConfig {
        StreamConfig {
            events_speedup_factor: 1_000.0,
            events_buffer_allowance: 10,
            events_buffer_chunk_size: 5,
        }
    }

    fn event(ts: i64) -> ContributionEvent {
        ContributionEvent::new("ada", "core", ts)
    }

    #[test]
    fn initial_request_is_allowance_plus_chunk() {
        let mut scheduler = EventScheduler::new(config());
        assert_eq!(scheduler.state(), SchedulerState::WaitingForReady);
        assert_eq!(scheduler.on_source_ready(), Some(15));
        assert_eq!(scheduler.on_source_ready(), None);
        assert_eq!(scheduler.state(), SchedulerState::Streaming);
        assert_eq!(scheduler.ledger().requested(), 15);
    }

    #[test]
    fn progress_reports_buffer_and_credits() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        scheduler.on_event(event(0)).unwrap();
        scheduler.on_event(event(1_000_000)).unwrap();

        let progress = scheduler.progress();
        assert_eq!(progress.state, SchedulerState::Streaming);
        assert_eq!(progress.buffered, 2);
        assert_eq!(progress.credits.received(), 2);
        assert_eq!(progress.credits.consumed(), 0);
    }

    #[test]
    fn no_batch_before_first_event() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        let outcome = scheduler.tick(20).unwrap();
        assert_eq!(outcome.batch, None);
        assert_eq!(outcome.request, None);
        assert!(!outcome.completed);
    }

    #[test]
    fn releases_events_by_rebased_time() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        // Offsets 0, 20 and 40 ms at speedup 1000.
        for ts in [5_000, 25_000, 45_000] {
            scheduler.on_event(event(ts)).unwrap();
        }

        let first = scheduler.tick(0).unwrap().batch.unwrap();
        assert_eq!(first.events, vec![event(5_000)]);
        assert_eq!(first.real_world_ts, 5_000);

        // The boundary is inclusive.
        let second = scheduler.tick(20).unwrap().batch.unwrap();
        assert_eq!(second.events, vec![event(25_000)]);

        // Empty batches keep the last real-world timestamp.
        let third = scheduler.tick(39).unwrap().batch.unwrap();
        assert!(third.events.is_empty());
        assert_eq!(third.real_world_ts, 25_000);
        assert_eq!(third.elapsed_ms, 39);
    }

    #[test]
    fn burst_is_released_in_arrival_order() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        let burst: Vec<_> = (0..5)
            .map(|i| ContributionEvent::new(format!("a{i}"), "p", 100))
            .collect();
        for e in &burst {
            scheduler.on_event(e.clone()).unwrap();
        }
        let batch = scheduler.tick(0).unwrap().batch.unwrap();
        assert_eq!(batch.events, burst);
    }

    #[test]
    fn requests_chunk_once_margin_is_spent_and_events_arrive() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        for _ in 0..6 {
            scheduler.on_event(event(0)).unwrap();
        }
        // consumed 6 > 15 - 10.
        let outcome = scheduler.tick(0).unwrap();
        assert_eq!(outcome.request, Some(5));
        assert_eq!(scheduler.ledger().requested(), 20);

        // Nothing new arrived since the request.
        let outcome = scheduler.tick(20).unwrap();
        assert_eq!(outcome.request, None);
    }

    #[test]
    fn no_request_while_margin_remains() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        for _ in 0..5 {
            scheduler.on_event(event(0)).unwrap();
        }
        // consumed 5 is not above 15 - 10.
        assert_eq!(scheduler.tick(0).unwrap().request, None);
    }

    #[test]
    fn drains_after_source_completion() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        scheduler.on_event(event(0)).unwrap();
        scheduler.on_event(event(100_000)).unwrap();
        scheduler.on_source_completed();
        assert_eq!(scheduler.state(), SchedulerState::Draining);

        let outcome = scheduler.tick(0).unwrap();
        assert_eq!(outcome.batch.unwrap().events.len(), 1);
        assert!(!outcome.completed);

        // The second event is due at 100 ms; nothing is dropped.
        let outcome = scheduler.tick(100).unwrap();
        assert_eq!(outcome.batch.unwrap().events, vec![event(100_000)]);
        assert_eq!(outcome.request, None);

        let outcome = scheduler.tick(120).unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.batch, None);
        assert_eq!(scheduler.state(), SchedulerState::Completed);

        // Terminal.
        let outcome = scheduler.tick(140).unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.batch, None);
    }

    #[test]
    fn rejects_events_outside_streaming() {
        let mut scheduler = EventScheduler::new(config());
        assert!(matches!(
            scheduler.on_event(event(0)),
            Err(SchedulerError::UnexpectedMessage { .. })
        ));
        scheduler.on_source_ready();
        scheduler.on_source_completed();
        assert!(scheduler.on_event(event(0)).is_err());
    }

    #[test]
    fn rejects_events_beyond_credit() {
        let mut scheduler = EventScheduler::new(config());
        scheduler.on_source_ready();
        for _ in 0..15 {
            scheduler.on_event(event(0)).unwrap();
        }
        assert!(matches!(
            scheduler.on_event(event(0)),
            Err(SchedulerError::FlowControl(FlowControlError::CreditExceeded { .. }))
        ));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Deliver(u8),
        Tick(u8),
    }

    fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
        proptest::collection::vec(
            prop_oneof![
                (0..20u8).prop_map(Step::Deliver),
                (0..50u8).prop_map(Step::Tick),
            ],
            1..200,
        )
    }

    proptest! {
        #[test]
        fn credit_balance_never_goes_negative(steps in arb_steps()) {
            let cfg = config();
            let mut scheduler = EventScheduler::new(cfg.clone());
            scheduler.on_source_ready();
            let mut granted = scheduler.ledger().requested();
            let mut sent = 0_u64;
            let mut elapsed = 0_u64;
            let mut ts = 0_i64;

            for step in steps {
                match step {
                    Step::Deliver(n) => {
                        // A well-behaved source stops at its credit.
                        for _ in 0..n {
                            if sent < granted {
                                ts += 7_000;
                                scheduler.on_event(event(ts)).unwrap();
                                sent += 1;
                            }
                        }
                    }
                    Step::Tick(dt) => {
                        elapsed += u64::from(dt);
                        let before = *scheduler.ledger();
                        let outcome = scheduler.tick(elapsed).unwrap();
                        if let Some(chunk) = outcome.request {
                            prop_assert_eq!(chunk, cfg.events_buffer_chunk_size);
                            prop_assert!(
                                scheduler.ledger().consumed() + cfg.events_buffer_allowance
                                    > before.requested()
                            );
                            granted += chunk;
                        }
                    }
                }
                let ledger = scheduler.ledger();
                prop_assert!(ledger.consumed() <= ledger.received());
                prop_assert!(ledger.received() <= ledger.requested());
                prop_assert_eq!(ledger.requested(), granted);
                prop_assert_eq!(scheduler.buffered() as u64, ledger.buffered());
            }
        }
    }
}
