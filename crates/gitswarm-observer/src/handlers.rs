//! HTTP endpoint handlers for the Observer server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/info` | Title, author names, project colours |
//! | `GET` | `/api/world` | Current world snapshot |
//! | `GET` | `/api/status` | Simulation progress |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::Uri;
use axum::response::{Html, IntoResponse};
use chrono::DateTime;
use gitswarm_types::{InfoPayload, World};

use crate::error::ObserverError;
use crate::state::{AppState, SimulationStatus};

/// Calendar date of a source timestamp, for display.
fn format_real_world_ts(ts: Option<i64>) -> String {
    ts.and_then(DateTime::from_timestamp_millis)
        .map_or_else(|| String::from("--"), |dt| dt.format("%Y-%m-%d").to_string())
}

/// Escape text for inclusion in HTML.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the run status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status.read().await.clone();
    let world = state.current_world();
    let title = escape_html(&state.info.title);
    let run_state = if status.running { "RUNNING" } else { "FINISHED" };
    let date = format_real_world_ts(world.real_world_ts);
    let ticks = status.ticks;
    let authors = world.authors.len();
    let projects = world.projects.len();
    let contributions = world.contributions.len();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        ul {{ list-style: none; padding: 0; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>Status: <strong>{run_state}</strong></p>
    <div>
        <div class="metric"><div class="label">Date</div><div class="value">{date}</div></div>
        <div class="metric"><div class="label">Ticks</div><div class="value">{ticks}</div></div>
        <div class="metric"><div class="label">Authors</div><div class="value">{authors}</div></div>
        <div class="metric"><div class="label">Projects</div><div class="value">{projects}</div></div>
        <div class="metric"><div class="label">Contributions</div><div class="value">{contributions}</div></div>
    </div>
    <ul>
        <li><a href="/info">/info</a></li>
        <li><a href="/api/world">/api/world</a></li>
        <li><a href="/api/status">/api/status</a></li>
        <li>/ws/frames (WebSocket)</li>
        <li>/ws/events (WebSocket)</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /info
// ---------------------------------------------------------------------------

/// Title, distinct author names and project colours.
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoPayload> {
    Json(state.info.clone())
}

// ---------------------------------------------------------------------------
// GET /api/world
// ---------------------------------------------------------------------------

/// The latest world snapshot.
///
/// Answers 503 until the first batch has been applied.
pub async fn get_world(State(state): State<Arc<AppState>>) -> Result<Json<World>, ObserverError> {
    let world = state.current_world();
    if world.real_world_ts.is_none() {
        return Err(ObserverError::NotReady(String::from(
            "no events have been applied yet",
        )));
    }
    Ok(Json(World::clone(&world)))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Simulation progress.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SimulationStatus> {
    Json(state.status.read().await.clone())
}

/// JSON 404 for unknown routes.
pub async fn not_found(uri: Uri) -> ObserverError {
    ObserverError::NotFound(format!("no route for {}", uri.path()))
}
