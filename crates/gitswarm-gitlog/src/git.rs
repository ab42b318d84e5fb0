//! Git invocation.
//!
//! Collection talks to git through [`GitRunner`] so it can be exercised
//! without a git binary or real checkouts.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::GitLogError;
use crate::parse::LOG_FORMAT;

/// The git operations event production needs.
pub trait GitRunner {
    /// Full `--name-status` history of every branch, in the
    /// [`LOG_FORMAT`] layout.
    fn log(&self, repo: &Path) -> Result<String, GitLogError>;

    /// Update an existing checkout.
    fn pull(&self, repo: &Path) -> Result<(), GitLogError>;

    /// Clone `url` into a new directory under `parent`.
    fn clone_repo(&self, parent: &Path, url: &str) -> Result<(), GitLogError>;
}

/// [`GitRunner`] backed by the `git` executable on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGit;

impl SystemGit {
    fn run(dir: &Path, args: &[&str]) -> Result<String, GitLogError> {
        debug!(dir = %dir.display(), ?args, "Running git");
        let output = Command::new("git").args(args).current_dir(dir).output()?;
        if !output.status.success() {
            return Err(GitLogError::Git {
                command: args.first().copied().unwrap_or_default().to_owned(),
                dir: dir.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitRunner for SystemGit {
    fn log(&self, repo: &Path) -> Result<String, GitLogError> {
        let pretty = format!("--pretty=format:{LOG_FORMAT}");
        Self::run(repo, &["log", "--name-status", "--all", &pretty])
    }

    fn pull(&self, repo: &Path) -> Result<(), GitLogError> {
        Self::run(repo, &["pull"]).map(drop)
    }

    fn clone_repo(&self, parent: &Path, url: &str) -> Result<(), GitLogError> {
        Self::run(parent, &["clone", url]).map(drop)
    }
}
