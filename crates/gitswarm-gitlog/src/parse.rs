//! Parser for `git log --name-status` output in the separator format.
//!
//! [`LOG_FORMAT`] makes git print every commit as
//!
//! ```text
//! ------------------------------------------------------------------------
//! r1a2b3c4 | ada@example.com | 2014-05-13 18:53:20 +0200 (Tue, 13 May 2014 18:53:20 +0200) | x lines
//! Changed paths:
//! M	src/lib.rs
//! A	README.md
//! ```
//!
//! followed by a blank line. Each listed path becomes one [`FileChange`].

use chrono::DateTime;
use tracing::warn;

/// Line separating commits.
pub const LOG_SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// `--pretty` format producing the layout [`parse_git_log`] reads.
pub const LOG_FORMAT: &str = "%n------------------------------------------------------------------------%nr%h | %ae | %ai (%aD) | x lines%nChanged paths:";

/// One path touched by one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the repository root.
    pub path: String,
    /// Author date in milliseconds since the Unix epoch.
    pub ts: i64,
    /// Author identity (email) as recorded by git.
    pub author: String,
}

/// Parse the author date of a revision line (`2014-05-13 18:53:20 +0200`).
fn parse_author_date(field: &str) -> Option<i64> {
    let mut parts = field.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let offset = parts.next()?;
    DateTime::parse_from_str(&format!("{date} {time} {offset}"), "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Path of a `--name-status` line.
///
/// The last tab-separated field is the path, which for renames and
/// copies is the new name. Quotes that git adds around unusual names are
/// dropped.
fn parse_status_line(line: &str) -> Option<String> {
    let (_, path) = line.rsplit_once('\t')?;
    let path = path.trim().replace('"', "");
    (!path.is_empty()).then_some(path)
}

/// Parse a full log into file changes, in log order.
///
/// Revisions with a malformed header or date are skipped with a warning.
pub fn parse_git_log(log: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    let mut lines = log.lines().peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with(LOG_SEPARATOR) {
            continue;
        }
        let Some(rev_line) = lines.next() else { break };
        if rev_line.len() < 2 {
            break;
        }

        let fields: Vec<&str> = rev_line.split(" | ").collect();
        let (Some(author), Some(date_field)) = (fields.get(1), fields.get(2)) else {
            warn!(line = rev_line, "Skipping bad revision line");
            continue;
        };
        let Some(ts) = parse_author_date(date_field) else {
            warn!(date = *date_field, "Skipping revision with malformed date");
            continue;
        };

        // "Changed paths:"
        lines.next();

        while let Some(path_line) = lines.next_if(|l| !l.trim().is_empty()) {
            if let Some(path) = parse_status_line(path_line) {
                changes.push(FileChange {
                    path,
                    ts,
                    author: (*author).to_owned(),
                });
            }
        }
    }
    changes
}
