//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error so `main` can propagate
/// with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: gitswarm_core::config::ConfigError,
    },

    /// Neither the command line, the config file nor the environment named
    /// a work directory.
    #[error("missing work directory: pass it as an argument or set GITSWARM_WORK_DIR")]
    MissingWorkDir,

    /// The work directory is invalid.
    #[error("work directory error: {source}")]
    WorkDir {
        /// The underlying work directory error.
        #[from]
        source: gitswarm_core::workdir::WorkDirError,
    },

    /// The event log could not be opened.
    #[error("event source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: gitswarm_core::source::SourceError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: gitswarm_core::runner::RunnerError,
    },

    /// Observer server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: gitswarm_observer::ServerError,
    },
}
