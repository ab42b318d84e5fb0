//! Event pacing, world transition and simulation loop for gitswarm.
//!
//! This crate owns the simulation core: a credit-controlled event pipeline
//! that replays a recorded contribution log at a compressed real-time
//! cadence, and the deterministic tick transition that turns each paced
//! batch into the next world snapshot.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `gitswarm-config.yaml` into
//!   strongly-typed structs.
//! - [`physics`] -- Pull, contact repulsion and friction integration.
//! - [`tick`] -- The staged world transition [`advance`](tick::advance).
//! - [`flow`] -- Credit ledger shared by both ends of the event stream.
//! - [`scheduler`] -- Rebases event timestamps and paces them into batches.
//! - [`source`] -- Event log reader and credit-controlled source task.
//! - [`runner`] -- The async simulation loop.
//! - [`render`] -- Keyed render frames and the generation-tagged object cache.
//! - [`workdir`] -- Work directory layout and `config.json`.

pub mod config;
pub mod flow;
pub mod physics;
pub mod render;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod tick;
pub mod workdir;
