//! Event source: the replayable event log behind a credit-controlled stream.
//!
//! [`read_event_log`] turns an `events.stream` file (one JSON event per
//! line) into a stream of events. [`ControlledStream`] puts any such stream
//! behind a credit counter, and [`spawn_source`] runs it as an in-process
//! transport task speaking the same protocol as the `/ws/events` endpoint:
//! requests flow in as credit counts, events flow out one message each.

use std::path::{Path, PathBuf};

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use gitswarm_types::ContributionEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::flow::{CreditLedger, FlowControlError};

/// Errors opening an event source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The event log could not be opened.
    #[error("failed to open event log {path}: {source}")]
    Open {
        /// Path of the log.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Messages from the source to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMessage {
    /// The source accepts credit requests.
    Ready,
    /// One event, sent against previously granted credit.
    Event(ContributionEvent),
    /// End of log. Nothing follows.
    Completed,
}

/// A stream that yields items only against granted credit.
#[derive(Debug)]
pub struct ControlledStream<S> {
    inner: S,
    ledger: CreditLedger,
    exhausted: bool,
}

impl<S> ControlledStream<S>
where
    S: Stream<Item = ContributionEvent> + Unpin,
{
    /// Wrap `inner` with zero credit.
    pub const fn new(inner: S) -> Self {
        Self {
            inner,
            ledger: CreditLedger::new(),
            exhausted: false,
        }
    }

    /// Grant `n` more items.
    pub const fn request(&mut self, n: u64) {
        self.ledger.grant(n);
    }

    /// Credit not yet used.
    pub const fn outstanding(&self) -> u64 {
        self.ledger.outstanding()
    }

    /// Whether the underlying stream has ended.
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next item, spending one credit. `Ok(None)` at end of stream.
    ///
    /// Cancel safe: an item is only counted once it has been taken from the
    /// underlying stream.
    pub async fn next_granted(&mut self) -> Result<Option<ContributionEvent>, FlowControlError> {
        if self.exhausted {
            return Ok(None);
        }
        if self.ledger.outstanding() == 0 {
            return Err(FlowControlError::CreditExceeded {
                received: self.ledger.received().saturating_add(1),
                requested: self.ledger.requested(),
            });
        }
        match self.inner.next().await {
            Some(event) => {
                self.ledger.record_received()?;
                Ok(Some(event))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

/// Open an `events.stream` file as a stream of events.
///
/// Blank lines are ignored. Lines that are not a valid event are logged
/// and skipped; a read error ends the stream.
pub async fn read_event_log(path: &Path) -> Result<BoxStream<'static, ContributionEvent>, SourceError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let lines = BufReader::new(file).lines();
    let path = path.to_path_buf();

    let events = stream::unfold((lines, 0_u64, path), |(mut lines, mut line_no, path)| async move {
        loop {
            line_no = line_no.saturating_add(1);
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(error) => {
                    warn!(path = %path.display(), line_no, %error, "Event log read failed, ending stream");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ContributionEvent>(&line) {
                Ok(event) => return Some((event, (lines, line_no, path))),
                Err(error) => {
                    warn!(path = %path.display(), line_no, %error, "Skipping malformed event line");
                }
            }
        }
    });
    Ok(events.boxed())
}

/// Consumer end of a spawned source.
#[derive(Debug)]
pub struct SourceLink {
    /// Credit requests to the source.
    pub requests: mpsc::Sender<u64>,
    /// Messages from the source.
    pub messages: mpsc::Receiver<SourceMessage>,
    /// The transport task.
    pub task: JoinHandle<()>,
}

/// Run `stream` as a transport task and return the consumer end.
///
/// The task announces [`SourceMessage::Ready`], then sends one event per
/// granted credit and [`SourceMessage::Completed`] at end of log. It stops
/// when the consumer hangs up.
pub fn spawn_source<S>(mut stream: ControlledStream<S>, capacity: usize) -> SourceLink
where
    S: Stream<Item = ContributionEvent> + Unpin + Send + 'static,
{
    let (request_tx, mut request_rx) = mpsc::channel::<u64>(capacity.max(1));
    let (message_tx, message_rx) = mpsc::channel::<SourceMessage>(capacity.max(1));

    let task = tokio::spawn(async move {
        if message_tx.send(SourceMessage::Ready).await.is_err() {
            return;
        }
        let mut sent = 0_u64;
        loop {
            if stream.outstanding() == 0 {
                match request_rx.recv().await {
                    Some(n) => stream.request(n),
                    None => break,
                }
                continue;
            }

            tokio::select! {
                biased;
                request = request_rx.recv() => match request {
                    Some(n) => stream.request(n),
                    None => break,
                },
                next = stream.next_granted() => match next {
                    Ok(Some(event)) => {
                        if message_tx.send(SourceMessage::Event(event)).await.is_err() {
                            break;
                        }
                        sent = sent.saturating_add(1);
                    }
                    Ok(None) => {
                        debug!(sent, "Event log exhausted");
                        let _ = message_tx.send(SourceMessage::Completed).await;
                        break;
                    }
                    Err(error) => {
                        warn!(%error, "Source credit accounting failed");
                        break;
                    }
                },
            }
        }
    });

    SourceLink {
        requests: request_tx,
        messages: message_rx,
        task,
    }
}
