//! Work directory: the on-disk home of one visualisation.
//!
//! ```text
//! <work_dir>/
//!   config.json     title, user map, projects, repo locations
//!   events.stream   one JSON event per line, sorted by timestamp
//!   avatars/        <author>.jpg, served to the renderer
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use gitswarm_types::{InfoPayload, ProjectInfo};
use serde::{Deserialize, Serialize};

/// Name of the work directory configuration file.
pub const CONFIG_FILE: &str = "config.json";

/// Name of the event log.
pub const EVENTS_FILE: &str = "events.stream";

/// Name of the avatar directory.
pub const AVATARS_DIR: &str = "avatars";

/// Errors opening a work directory.
#[derive(Debug, thiserror::Error)]
pub enum WorkDirError {
    /// The path does not exist.
    #[error("path {path} does not exist")]
    Missing {
        /// The offending path.
        path: PathBuf,
    },

    /// The path is not a directory.
    #[error("path {path} is not a directory")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// `config.json` could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// `config.json` is not valid.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// Path of the config file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// One project and the repositories that feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name used in events.
    pub name: String,
    /// CSS colour.
    pub color: String,
    /// Repositories as `owner/name`.
    #[serde(default)]
    pub repos: Vec<String>,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDirConfig {
    /// Title shown by the renderer.
    #[serde(default)]
    pub title: String,
    /// Git identity (email) to display name.
    #[serde(default)]
    pub user_map: BTreeMap<String, String>,
    /// Configured projects.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    /// Directories searched for repository checkouts, first one receives clones.
    #[serde(default)]
    pub repos_dirs: Vec<PathBuf>,
    /// Changed paths containing any of these substrings are ignored.
    #[serde(default)]
    pub ignore_if_containing: Vec<String>,
}

/// An opened, validated work directory.
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
    config: WorkDirConfig,
}

impl WorkDir {
    /// Validate `root` and load its `config.json`.
    pub fn open(root: &Path) -> Result<Self, WorkDirError> {
        if !root.exists() {
            return Err(WorkDirError::Missing {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(WorkDirError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        let path = root.join(CONFIG_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| WorkDirError::Io {
            path: path.clone(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| WorkDirError::Json { path, source })?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// The directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parsed `config.json`.
    pub const fn config(&self) -> &WorkDirConfig {
        &self.config
    }

    /// Path of the event log.
    pub fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    /// Path of the avatar directory.
    pub fn avatars_path(&self) -> PathBuf {
        self.root.join(AVATARS_DIR)
    }

    /// Run metadata for the renderer.
    pub fn info(&self) -> InfoPayload {
        let authors: BTreeSet<&String> = self.config.user_map.values().collect();
        InfoPayload {
            title: self.config.title.clone(),
            authors: authors.into_iter().cloned().collect(),
            projects: self
                .config
                .projects
                .iter()
                .map(|p| ProjectInfo {
                    name: p.name.clone(),
                    color: p.color.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const CONFIG: &str = r##"{
        "title": "Open source at Example",
        "userMap": {
            "ada@example.com": "ada",
            "ada@home.example": "ada",
            "bob@example.com": "bob"
        },
        "projects": [
            {"name": "core", "color": "#ff0000", "repos": ["example/core", "example/core-extras"]},
            {"name": "web", "color": "#00ff00", "repos": ["example/web"]}
        ],
        "reposDirs": ["/srv/repos"],
        "ignoreIfContaining": ["vendor/", ".min.js"]
    }"##;

    fn work_dir(config: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), config).unwrap();
        dir
    }

    #[test]
    fn loads_config_and_builds_info() {
        let dir = work_dir(CONFIG);
        let wd = WorkDir::open(dir.path()).unwrap();

        assert_eq!(wd.config().repos_dirs, vec![PathBuf::from("/srv/repos")]);
        assert_eq!(wd.config().projects[0].repos.len(), 2);
        assert_eq!(wd.events_path(), dir.path().join("events.stream"));
        assert_eq!(wd.avatars_path(), dir.path().join("avatars"));

        let info = wd.info();
        assert_eq!(info.title, "Open source at Example");
        assert_eq!(info.authors, vec!["ada".to_owned(), "bob".to_owned()]);
        assert_eq!(
            info.projects,
            vec![
                ProjectInfo {
                    name: "core".into(),
                    color: "#ff0000".into()
                },
                ProjectInfo {
                    name: "web".into(),
                    color: "#00ff00".into()
                },
            ]
        );
    }

    #[test]
    fn optional_sections_default() {
        let dir = work_dir(r#"{"title": "t"}"#);
        let wd = WorkDir::open(dir.path()).unwrap();
        assert!(wd.config().projects.is_empty());
        assert!(wd.info().authors.is_empty());
    }

    #[test]
    fn rejects_missing_and_non_directories() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(WorkDir::open(&missing), Err(WorkDirError::Missing { .. })));

        let file = dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(WorkDir::open(&file), Err(WorkDirError::NotADirectory { .. })));
    }

    #[test]
    fn reports_missing_or_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(WorkDir::open(dir.path()), Err(WorkDirError::Io { .. })));

        let dir = work_dir("{ not json");
        assert!(matches!(WorkDir::open(dir.path()), Err(WorkDirError::Json { .. })));
    }
}
