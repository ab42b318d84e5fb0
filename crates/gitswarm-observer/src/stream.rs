//! `WebSocket` transport of the event log under the credit protocol.
//!
//! Each client connecting to `GET /ws/events` gets its own replay of the
//! work directory's `events.stream`:
//!
//! - client -> server: a text message holding a decimal credit count
//! - server -> client: one JSON event per text message, never more than
//!   the cumulative credit
//! - end of log: the server sends a close frame
//!
//! The replay runs as a core source task; this module only bridges its
//! channels to the socket.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, Stream, StreamExt};
use gitswarm_core::source::{
    ControlledStream, SourceLink, SourceMessage, read_event_log, spawn_source,
};
use tracing::{debug, info, warn};

use crate::socket::{Inbound, classify, close, send_json};
use crate::state::AppState;

/// Capacity of the per-client channels between socket and source task.
const CHANNEL_CAPACITY: usize = 64;

/// Parse a client credit message.
pub fn parse_credit(text: &str) -> Option<u64> {
    text.trim().parse().ok()
}

/// Upgrade to a `WebSocket` and replay the event log.
///
/// # Route
///
/// `GET /ws/events`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_events(socket, state))
}

async fn handle_events(socket: WebSocket, state: Arc<AppState>) {
    info!("Event stream client connected");
    let (mut tx, rx) = socket.split();

    let events = match read_event_log(&state.event_log).await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, "Cannot replay event log");
            close(&mut tx).await;
            return;
        }
    };
    let link = spawn_source(ControlledStream::new(events), CHANNEL_CAPACITY);
    bridge(tx, rx, link).await;
}

/// Relay credit from the client to the source and events back, until
/// either side ends. Returns the number of events sent.
async fn bridge<Tx, Rx, E>(mut tx: Tx, mut rx: Rx, mut link: SourceLink) -> u64
where
    Tx: Sink<Message> + Unpin,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut sent = 0_u64;

    loop {
        tokio::select! {
            message = link.messages.recv() => match message {
                Some(SourceMessage::Ready) => {}
                Some(SourceMessage::Event(event)) => {
                    if !send_json(&mut tx, &event).await {
                        debug!(sent, "Event stream client disconnected (send failed)");
                        break;
                    }
                    sent = sent.saturating_add(1);
                }
                Some(SourceMessage::Completed) | None => {
                    info!(sent, "Event log replayed, closing stream");
                    close(&mut tx).await;
                    break;
                }
            },
            inbound = rx.next() => match classify(inbound) {
                Inbound::Text(text) => match parse_credit(&text) {
                    Some(credits) => {
                        debug!(credits, "Client requested more events");
                        if link.requests.send(credits).await.is_err() {
                            break;
                        }
                    }
                    None => warn!(message = %text, "Ignoring non-numeric credit message"),
                },
                Inbound::Closed => {
                    debug!(sent, "Event stream client disconnected");
                    break;
                }
                Inbound::Ignored => {}
            },
        }
    }

    link.task.abort();
    sent
}
