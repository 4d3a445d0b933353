//! Directory snapshots: which regular files exist in the working directory.
//!
//! A snapshot taken before processing and one taken after differ by exactly
//! the files the processing step created, provided nothing else writes the
//! directory in between. The agent assumes it is the only writer; there is
//! no filesystem-level locking.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::telemetry::metrics;

/// Names of the regular files in a directory at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    files: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// List the regular files in `dir`.
    ///
    /// Directories, symlinks, entries whose metadata can't be read and names
    /// that aren't valid UTF-8 are left out. An unreadable directory yields an
    /// empty snapshot. Never fails.
    pub fn capture(dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Self::default();
        };

        let files = entries
            .filter_map(|entry| entry.ok())
            // file_type doesn't follow links, so a link to a file is skipped
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();

        Self { files }
    }

    /// Files present in `after` but not in `before`.
    pub fn diff(before: &Self, after: &Self) -> BTreeSet<String> {
        after.files.difference(&before.files).cloned().collect()
    }

    /// Delete every file in `dir` that isn't part of `baseline`.
    ///
    /// Best-effort: a file that can't be removed (already gone, permissions)
    /// is skipped silently. Nothing is reported back and callers must not
    /// branch on the outcome.
    pub fn cleanup(dir: &Path, baseline: &Self) {
        let current = Self::capture(dir);
        let mut removed = 0u64;
        for name in Self::diff(baseline, &current) {
            if std::fs::remove_file(dir.join(&name)).is_ok() {
                removed += 1;
                debug!(file = %name, "removed stray file");
            }
        }
        if removed > 0 {
            metrics::files_cleaned().add(removed, &[]);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }
}

/// Full paths for a set of file names inside `dir`.
pub fn paths_in(dir: &Path, names: &BTreeSet<String>) -> Vec<PathBuf> {
    names.iter().map(|name| dir.join(name)).collect()
}
