//! Plumbing shared by the `WebSocket` handlers.
//!
//! Handlers split the socket into a sink and a stream and drive them
//! through these helpers, so the forwarding loops can be exercised with
//! in-memory channels.

use std::fmt::Display;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use serde::Serialize;
use tracing::{debug, warn};

/// What a client sent, as far as the handlers care.
pub(crate) enum Inbound {
    /// A text message.
    Text(String),
    /// The client is gone.
    Closed,
    /// Anything else. Pings are answered by the transport.
    Ignored,
}

/// Classify the next item of the client stream.
pub(crate) fn classify<E: Display>(item: Option<Result<Message, E>>) -> Inbound {
    match item {
        Some(Ok(Message::Text(text))) => Inbound::Text(text.as_str().to_owned()),
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Err(e)) => {
            debug!("WebSocket error: {e}");
            Inbound::Closed
        }
        Some(Ok(_)) => Inbound::Ignored,
    }
}

/// Send `value` as one JSON text message.
///
/// Returns `false` once the client can no longer be written to. A value
/// that fails to serialize is logged and skipped.
pub(crate) async fn send_json<Tx, T>(tx: &mut Tx, value: &T) -> bool
where
    Tx: Sink<Message> + Unpin,
    T: Serialize,
{
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize message: {e}");
            return true;
        }
    };
    tx.send(Message::Text(json.into())).await.is_ok()
}

/// Send a close frame, ignoring a client that is already gone.
pub(crate) async fn close<Tx>(tx: &mut Tx)
where
    Tx: Sink<Message> + Unpin,
{
    let _ = tx.send(Message::Close(None)).await;
}
