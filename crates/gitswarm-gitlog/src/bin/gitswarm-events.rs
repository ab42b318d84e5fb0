//! `gitswarm-events`: maintain a work directory's repositories and event log.
//!
//! ```text
//! gitswarm-events <WORK_DIR> update-repos
//! gitswarm-events <WORK_DIR> write-events
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gitswarm_core::workdir::WorkDir;
use gitswarm_gitlog::{SystemGit, collect_events, update_repos, write_event_stream};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gitswarm-events", version, about = "Build the gitswarm event log from git history")]
struct Cli {
    /// Work directory with `config.json`.
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read every configured repository and write `events.stream`.
    WriteEvents,
    /// Pull existing checkouts and clone missing repositories.
    UpdateRepos,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let work_dir = WorkDir::open(&cli.work_dir)
        .with_context(|| format!("invalid work directory {}", cli.work_dir.display()))?;

    match cli.command {
        Commands::UpdateRepos => {
            let summary = update_repos(&work_dir, &SystemGit)?;
            info!(pulled = summary.pulled, cloned = summary.cloned, "Repositories updated");
        }
        Commands::WriteEvents => {
            let collected = collect_events(&work_dir, &SystemGit)?;
            if !collected.missing_authors.is_empty() {
                warn!(
                    count = collected.missing_authors.len(),
                    "Authors missing from userMap"
                );
                println!("\nMissing authors:\n");
                for author in &collected.missing_authors {
                    println!("{}", serde_json::to_string(author)?);
                }
                println!("\nPlease add them to config.json");
            }
            write_event_stream(&work_dir.events_path(), &collected.events)
                .context("failed to write events.stream")?;
        }
    }
    Ok(())
}
