//! Error types for event log production.

use std::path::PathBuf;

use gitswarm_core::workdir::WorkDirError;

/// Errors raised while collecting or writing events.
#[derive(Debug, thiserror::Error)]
pub enum GitLogError {
    /// A git command exited unsuccessfully.
    #[error("`git {command}` failed in {dir}: {stderr}")]
    Git {
        /// The git subcommand that was run.
        command: String,
        /// Directory it ran in.
        dir: PathBuf,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// No configured repos dir holds a checkout of the repository.
    #[error("cannot find a checkout of {repo}")]
    RepoNotFound {
        /// Repository as `owner/name`.
        repo: String,
    },

    /// A clone was needed but `reposDirs` is empty.
    #[error("no reposDirs configured to clone {repo} into")]
    NoReposDir {
        /// Repository as `owner/name`.
        repo: String,
    },

    /// Spawning git or writing the event log failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The work directory is invalid.
    #[error(transparent)]
    WorkDir(#[from] WorkDirError),
}
