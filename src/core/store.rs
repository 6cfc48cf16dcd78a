//! Store abstraction for Molt's durable state.
//!
//! A Store is a handle to one memory workspace on disk. Every operation in the
//! crate takes an explicit `&Store` rather than reaching for a well-known home
//! path, so tests can isolate themselves with temporary roots.

use crate::core::error::MoltError;
use std::fs;
use std::path::{Path, PathBuf};

/// Handle to a Molt state workspace.
///
/// Layout under `root`:
/// - `memory/skills.jsonl`: the skill collection (line-oriented)
/// - `memory/digest.json`: cross-session rolling digest (single document)
/// - `evolution/proposals.jsonl`: proposal collection (rewritten on status change)
/// - `evolution/history.jsonl`: append-only change history
/// - `evolution/backups/`: timestamped pre-mutation snapshots
/// - `audit.events.jsonl`: append-only mutation audit log
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    /// Open a store rooted at `root`, creating the directory tree if needed.
    pub fn open(root: &Path) -> Result<Self, MoltError> {
        fs::create_dir_all(root.join("memory")).map_err(MoltError::IoError)?;
        fs::create_dir_all(root.join("evolution").join("backups"))
            .map_err(MoltError::IoError)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn skills_path(&self) -> PathBuf {
        self.root.join("memory").join("skills.jsonl")
    }

    pub fn digest_path(&self) -> PathBuf {
        self.root.join("memory").join("digest.json")
    }

    pub fn proposals_path(&self) -> PathBuf {
        self.root.join("evolution").join("proposals.jsonl")
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join("evolution").join("history.jsonl")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("evolution").join("backups")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(&tmp.path().join("data")).unwrap();
        assert!(store.root.join("memory").is_dir());
        assert!(store.backups_dir().is_dir());
    }
}
