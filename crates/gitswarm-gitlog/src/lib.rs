//! Event log production from git history.
//!
//! Reads every repository configured in a work directory's `config.json`,
//! turns each changed path of each commit into a [`ContributionEvent`],
//! and writes the timestamp-sorted result to `events.stream`, the log the
//! engine replays.
//!
//! [`ContributionEvent`]: gitswarm_types::ContributionEvent

pub mod collect;
pub mod error;
pub mod git;
pub mod parse;

pub use collect::{Collected, UpdateSummary, collect_events, update_repos, write_event_stream};
pub use error::GitLogError;
pub use git::{GitRunner, SystemGit};
pub use parse::{FileChange, parse_git_log};
