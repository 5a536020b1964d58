pub mod storage;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::git;
use storage::HistoryStore;

/// One `taskmill` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistoryEntry {
    pub timestamp: DateTime<Local>,
    pub targets: Vec<String>,
    pub duration: f64,
    pub success: bool,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub failure: Option<String>,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
}

impl RunHistoryEntry {
    pub fn new(targets: Vec<String>, root: &Path) -> Self {
        Self {
            timestamp: Local::now(),
            targets,
            duration: 0.0,
            success: false,
            exit_code: None,
            failure: None,
            git_commit: git::commit(root),
            git_branch: git::branch(root),
        }
    }

    pub fn succeeded(mut self, duration: f64) -> Self {
        self.duration = duration;
        self.success = true;
        self
    }

    pub fn failed(mut self, duration: f64, exit_code: i32, failure: impl Into<String>) -> Self {
        self.duration = duration;
        self.success = false;
        self.exit_code = Some(exit_code);
        self.failure = Some(failure.into());
        self
    }

    /// First eight characters of the commit.
    pub fn short_commit(&self) -> Option<&str> {
        self.git_commit.as_deref().map(|commit| {
            match commit.char_indices().nth(8) {
                Some((end, _)) => &commit[..end],
                None => commit,
            }
        })
    }
}

pub struct RunHistory {
    entries: Vec<RunHistoryEntry>,
    store: HistoryStore,
    max_entries: usize,
}

impl RunHistory {
    pub fn new(storage_path: PathBuf, max_entries: usize) -> anyhow::Result<Self> {
        let store = HistoryStore::new(storage_path);
        let entries = store.load()?;
        Ok(Self {
            entries,
            store,
            max_entries,
        })
    }

    /// Appends `entry`, dropping the oldest entries beyond the cap, and saves.
    pub fn add_entry(&mut self, entry: RunHistoryEntry) -> anyhow::Result<()> {
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }

        self.store.save(&self.entries)
    }

    pub fn entries(&self) -> &[RunHistoryEntry] {
        &self.entries
    }

    /// Most recent first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &RunHistoryEntry> {
        self.entries.iter().rev().take(count)
    }

    /// Drops every entry and returns how many there were.
    pub fn clear(&mut self) -> anyhow::Result<usize> {
        let cleared = self.entries.len();
        self.entries.clear();
        self.store.save(&self.entries)?;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(target: &str) -> RunHistoryEntry {
        RunHistoryEntry {
            timestamp: Local::now(),
            targets: vec![target.to_string()],
            duration: 1.5,
            success: true,
            exit_code: None,
            failure: None,
            git_commit: Some("0123456789abcdef".to_string()),
            git_branch: Some("main".to_string()),
        }
    }

    #[test]
    fn test_history_is_capped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let mut history = RunHistory::new(path.clone(), 3).unwrap();
        for target in ["build", "test", "lint", "format", "ci"] {
            history.add_entry(entry(target)).unwrap();
        }

        let reloaded = RunHistory::new(path, 3).unwrap();
        let targets: Vec<&str> = reloaded
            .entries()
            .iter()
            .map(|e| e.targets[0].as_str())
            .collect();
        assert_eq!(targets, vec!["lint", "format", "ci"]);

        let recent: Vec<&str> = reloaded.recent(2).map(|e| e.targets[0].as_str()).collect();
        assert_eq!(recent, vec!["ci", "format"]);
    }

    #[test]
    fn test_failed_entry_records_cause() {
        let failed = entry("ci").failed(4.0, 2, "lint failed: exit code 2");

        assert!(!failed.success);
        assert_eq!(failed.exit_code, Some(2));
        assert_eq!(failed.failure.as_deref(), Some("lint failed: exit code 2"));
        assert_eq!(failed.short_commit(), Some("01234567"));
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = RunHistory::new(path.clone(), 10).unwrap();
        history.add_entry(entry("build")).unwrap();
        history.add_entry(entry("test")).unwrap();
        assert_eq!(history.clear().unwrap(), 2);

        assert!(RunHistory::new(path, 10).unwrap().entries().is_empty());
    }

    #[test]
    fn test_short_commit_respects_char_boundaries() {
        let mut entry = entry("build");

        entry.git_commit = Some("abcdefgé123".to_string());
        assert_eq!(entry.short_commit(), Some("abcdefgé"));

        entry.git_commit = Some("abc".to_string());
        assert_eq!(entry.short_commit(), Some("abc"));

        entry.git_commit = None;
        assert_eq!(entry.short_commit(), None);
    }
}
