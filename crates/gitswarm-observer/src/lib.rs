//! Observer server for the gitswarm simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` frame stream** (`/ws/frames`) pushing one render frame
//!   per tick via [`tokio::sync::broadcast`]
//! - **`WebSocket` event stream** (`/ws/events`) replaying the work
//!   directory's event log under the credit protocol
//! - **REST endpoints** for run metadata, the current world snapshot and
//!   the simulation status
//! - **Avatars** served from the work directory
//! - **Minimal HTML status page** (`GET /`)
//!
//! # Architecture
//!
//! The simulation publishes each snapshot through a `watch` channel; REST
//! reads borrow the latest value and never block the tick loop. Frame
//! clients share a broadcast channel with automatic lag handling. Each
//! event-stream client gets its own source task and credit ledger.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
mod socket;
pub mod state;
pub mod stream;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, spawn_observer, start_server};
pub use state::{AppState, SimulationStatus};
