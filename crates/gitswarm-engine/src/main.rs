//! Simulation engine binary for gitswarm.
//!
//! Wires the event log, the simulation loop and the Observer together:
//! the work directory's `events.stream` is replayed through a credit-
//! controlled source, paced into tick batches, applied to the world, and
//! published as render frames.
//!
//! # Startup Sequence
//!
//! 1. Parse the command line
//! 2. Load configuration from `gitswarm-config.yaml` (defaults if absent)
//! 3. Initialize structured logging (tracing)
//! 4. Open the work directory
//! 5. Start the event source task
//! 6. Start the Observer server
//! 7. Run the simulation loop until the log is exhausted
//! 8. Keep serving until Ctrl-C

mod error;
mod observer_callback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use gitswarm_core::config::{LoggingConfig, SimulationConfig};
use gitswarm_core::render::RenderSession;
use gitswarm_core::runner;
use gitswarm_core::source::{ControlledStream, read_event_log, spawn_source};
use gitswarm_core::workdir::WorkDir;
use gitswarm_observer::state::AppState;
use gitswarm_types::World;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer_callback::ObserverCallback;

/// Capacity of the channels between the simulation and its source task.
const SOURCE_CHANNEL_CAPACITY: usize = 1024;

/// Replay a contribution log as a live force-directed simulation.
#[derive(Debug, Parser)]
#[command(name = "gitswarm-engine", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "gitswarm-config.yaml")]
    config: PathBuf,

    /// Work directory with `config.json` and `events.stream`.
    work_dir: Option<PathBuf>,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Parse the command line.
    let cli = Cli::parse();

    // 2. Load configuration.
    let mut config = load_config(&cli.config)?;
    if let Some(dir) = cli.work_dir {
        config.server.work_dir = Some(dir);
    }

    // 3. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        tick_interval_ms = config.world.tick_interval_ms,
        speedup = config.stream.events_speedup_factor,
        port = config.server.port,
        "gitswarm-engine starting"
    );

    // 4. Open the work directory.
    let root = config
        .server
        .work_dir
        .clone()
        .ok_or(EngineError::MissingWorkDir)?;
    let work_dir = WorkDir::open(&root).map_err(EngineError::from)?;
    info!(
        work_dir = %work_dir.root().display(),
        projects = work_dir.config().projects.len(),
        "Work directory opened"
    );

    // 5. Start the event source.
    let events = read_event_log(&work_dir.events_path())
        .await
        .map_err(EngineError::from)?;
    let link = spawn_source(ControlledStream::new(events), SOURCE_CHANNEL_CAPACITY);

    // 6. Start the Observer.
    let (world_tx, world_rx) = watch::channel(Arc::new(World::new()));
    let app_state = Arc::new(AppState::new(
        work_dir.info(),
        work_dir.events_path(),
        work_dir.avatars_path(),
        world_rx,
    ));
    let observer = gitswarm_observer::spawn_observer(&config.server, Arc::clone(&app_state))
        .await
        .map_err(EngineError::from)?;

    // 7. Run the simulation.
    let mut callback =
        ObserverCallback::new(Arc::clone(&app_state), RenderSession::new(config.clone()));
    let result = runner::run_simulation(&config, link, &world_tx, &mut callback)
        .await
        .map_err(EngineError::from)?;
    runner::log_simulation_end(&result);
    {
        let mut status = app_state.status.write().await;
        status.running = false;
        status.end_reason = Some(result.end_reason);
    }

    // 8. Keep serving the final state.
    info!("Replay finished, observer still serving; press Ctrl-C to exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, shutting down");
    }
    observer.abort();
    info!(total_ticks = result.total_ticks, "gitswarm-engine shutdown complete");

    Ok(())
}

/// Load configuration from `path`, or defaults when the file is absent.
///
/// Environment overrides apply in both cases.
fn load_config(path: &Path) -> Result<SimulationConfig, EngineError> {
    if path.exists() {
        return Ok(SimulationConfig::from_file(path)?);
    }
    let mut config = SimulationConfig::default();
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
