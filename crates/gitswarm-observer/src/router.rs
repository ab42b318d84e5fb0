//! Axum router construction for the Observer server.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, stream, ws};

/// Build the complete Axum router for the Observer server.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /info` -- title, authors and project colours
/// - `GET /api/world` -- current world snapshot
/// - `GET /api/status` -- simulation progress
/// - `GET /ws/frames` -- `WebSocket` render frame stream
/// - `GET /ws/events` -- `WebSocket` credit-controlled event log
/// - `GET /avatars/*` -- avatar images from the work directory
///
/// CORS allows any origin so a renderer served elsewhere can connect.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/frames", get(ws::ws_frames))
        .route("/ws/events", get(stream::ws_events))
        // REST API
        .route("/info", get(handlers::get_info))
        .route("/api/world", get(handlers::get_world))
        .route("/api/status", get(handlers::get_status))
        // Static files
        .nest_service("/avatars", ServeDir::new(&state.avatars_dir))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
