//! Turning repository histories into the event log.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gitswarm_core::workdir::{WorkDir, WorkDirConfig};
use gitswarm_types::ContributionEvent;
use tracing::info;

use crate::error::GitLogError;
use crate::git::GitRunner;
use crate::parse::parse_git_log;

/// A configured repository and the project it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoRef<'a> {
    /// Repository as `owner/name`.
    pub name: &'a str,
    /// Project the repository's changes are attributed to.
    pub project: &'a str,
}

/// Every configured repository, in project order.
pub fn iter_repos(config: &WorkDirConfig) -> impl Iterator<Item = RepoRef<'_>> {
    config.projects.iter().flat_map(|project| {
        project.repos.iter().map(move |name| RepoRef {
            name,
            project: &project.name,
        })
    })
}

/// Locate the checkout of `repo` in the configured repos dirs.
///
/// Only the last segment of `owner/name` is used as the directory name.
pub fn find_repo_path(config: &WorkDirConfig, repo: &str) -> Option<PathBuf> {
    let dir_name = repo.rsplit('/').next().unwrap_or(repo);
    config
        .repos_dirs
        .iter()
        .map(|dir| dir.join(dir_name))
        .find(|candidate| candidate.exists())
}

/// Events collected from every repository.
#[derive(Debug, Default)]
pub struct Collected {
    /// Events sorted by timestamp; equal timestamps keep collection order.
    pub events: Vec<ContributionEvent>,
    /// Git identities missing from `userMap`, kept verbatim in `events`.
    pub missing_authors: BTreeSet<String>,
}

/// Collect one event per changed path across all configured repositories.
pub fn collect_events(work_dir: &WorkDir, git: &dyn GitRunner) -> Result<Collected, GitLogError> {
    let config = work_dir.config();
    let repos: Vec<RepoRef<'_>> = iter_repos(config).collect();
    let total = repos.len();
    let mut collected = Collected::default();

    for (idx, repo) in repos.iter().enumerate() {
        info!(repo = repo.name, idx = idx.saturating_add(1), total, "Reading history");
        let path = find_repo_path(config, repo.name).ok_or_else(|| GitLogError::RepoNotFound {
            repo: repo.name.to_owned(),
        })?;

        for change in parse_git_log(&git.log(&path)?) {
            if config
                .ignore_if_containing
                .iter()
                .any(|text| change.path.contains(text.as_str()))
            {
                continue;
            }
            let author = match config.user_map.get(&change.author) {
                Some(name) => name.clone(),
                None => {
                    collected.missing_authors.insert(change.author.clone());
                    change.author
                }
            };
            collected
                .events
                .push(ContributionEvent::new(author, repo.project, change.ts));
        }
    }

    collected.events.sort_by_key(|event| event.ts);
    Ok(collected)
}

/// Write `events` as JSON lines, replacing `path`.
pub fn write_event_stream(path: &Path, events: &[ContributionEvent]) -> Result<(), GitLogError> {
    let mut out = BufWriter::new(File::create(path)?);
    for event in events {
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    info!(path = %path.display(), events = events.len(), "Event log written");
    Ok(())
}

/// What [`update_repos`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Existing checkouts pulled.
    pub pulled: usize,
    /// Repositories cloned.
    pub cloned: usize,
}

/// Pull every existing checkout and clone the missing ones from GitHub
/// into the first repos dir.
pub fn update_repos(work_dir: &WorkDir, git: &dyn GitRunner) -> Result<UpdateSummary, GitLogError> {
    let config = work_dir.config();
    let repos: Vec<RepoRef<'_>> = iter_repos(config).collect();
    let total = repos.len();
    let mut summary = UpdateSummary::default();

    for (idx, repo) in repos.iter().enumerate() {
        let idx = idx.saturating_add(1);
        if let Some(path) = find_repo_path(config, repo.name) {
            info!(repo = repo.name, idx, total, path = %path.display(), "git pull");
            git.pull(&path)?;
            summary.pulled = summary.pulled.saturating_add(1);
        } else {
            let parent = config
                .repos_dirs
                .first()
                .ok_or_else(|| GitLogError::NoReposDir {
                    repo: repo.name.to_owned(),
                })?;
            let url = format!("https://github.com/{}.git", repo.name);
            info!(repo = repo.name, idx, total, %url, "git clone");
            git.clone_repo(parent, &url)?;
            summary.cloned = summary.cloned.saturating_add(1);
        }
    }
    Ok(summary)
}
