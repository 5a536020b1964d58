use super::RunHistoryEntry;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The JSON file backing [`super::RunHistory`].
///
/// Saves go to a sibling `.tmp` file that is then renamed over the real one,
/// so an interrupted run leaves either the old history or the new one.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or blank file is an empty history.
    pub fn load(&self) -> anyhow::Result<Vec<RunHistoryEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read history file: {}", self.path.display())
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))
    }

    pub fn save(&self, entries: &[RunHistoryEntry]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create history directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_vec_pretty(entries).context("Failed to serialize history entries")?;

        let staging = self.staging_path();
        let mut file = fs::File::create(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;
        file.write_all(&content)
            .and_then(|()| file.sync_all())
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        drop(file);

        fs::rename(&staging, &self.path).with_context(|| {
            format!("Failed to replace history file: {}", self.path.display())
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_or_empty_file_is_empty_history() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());

        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_reports_path() {
        let (_dir, store) = store();
        fs::write(store.path(), "{not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(format!("{:#}", err).contains("history.json"));
    }

    #[test]
    fn test_save_replaces_file_without_leaving_staging_copy() {
        let (dir, store) = store();
        fs::write(store.path(), "{not json").unwrap();

        let entry = RunHistoryEntry {
            timestamp: Local::now(),
            targets: vec!["lint".to_string()],
            duration: 0.3,
            success: true,
            exit_code: None,
            failure: None,
            git_commit: None,
            git_branch: None,
        };
        store.save(&[entry]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].targets, vec!["lint"]);
        assert!(!dir.path().join("history.json.tmp").exists());
    }
}
