//! `WebSocket` handler for the render frame stream.
//!
//! Clients connect to `GET /ws/frames` and receive one JSON-encoded
//! [`RenderFrame`] per tick. A client that falls behind skips ahead to the
//! newest frame; the `removed` lists of the skipped frames are lost, so
//! such a client should drop any object it does not see in the next frame.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, Stream, StreamExt};
use gitswarm_types::RenderFrame;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::socket::{Inbound, classify, close, send_json};
use crate::state::AppState;

/// Upgrade to a `WebSocket` and stream render frames.
///
/// # Route
///
/// `GET /ws/frames`
pub async fn ws_frames(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        debug!("Frame client connected");
        let (tx, rx) = socket.split();
        let sent = forward_frames(tx, rx, state.subscribe()).await;
        debug!(sent, "Frame client done");
    })
}

/// Forward broadcast frames to the client until it leaves or the
/// simulation drops the channel. Returns the number of frames sent.
async fn forward_frames<Tx, Rx, E>(
    mut tx: Tx,
    mut rx: Rx,
    mut frames: broadcast::Receiver<RenderFrame>,
) -> u64
where
    Tx: Sink<Message> + Unpin,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut sent = 0_u64;
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if !send_json(&mut tx, &frame).await {
                        return sent;
                    }
                    sent = sent.saturating_add(1);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Frame client lagged, skipping ahead");
                }
                Err(RecvError::Closed) => {
                    close(&mut tx).await;
                    return sent;
                }
            },
            inbound = rx.next() => match classify(inbound) {
                Inbound::Closed => return sent,
                Inbound::Text(_) | Inbound::Ignored => {}
            },
        }
    }
}
