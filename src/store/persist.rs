//! Durable local copy of the state tree.
//!
//! The whole tree is serialized as JSON into one file. Durability is
//! best-effort: an unreadable or corrupt file reads as "no data", and a
//! failed write keeps the in-memory tree authoritative for this process.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: `<data_dir>/restrosync/state.json`, falling back to
    /// the current directory if no platform data dir exists.
    pub fn default_path() -> PathBuf {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        data_dir.join("restrosync").join("state.json")
    }

    /// Read the saved tree back, or `None` when nothing usable is on disk.
    pub fn load(&self) -> Option<Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return None,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "state file unreadable; using seed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(tree) => Some(tree),
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "state file corrupt; using seed");
                None
            }
        }
    }

    /// Persist the whole tree. Failures are logged and otherwise ignored.
    pub fn save(&self, tree: &Value) {
        if let Some(parent) = self.path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                tracing::warn!(path = %self.path.display(), %error, "state dir creation failed; write skipped");
                return;
            }
        }
        let raw = match serde_json::to_string_pretty(tree) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(%error, "state tree failed to serialize; write skipped");
                return;
            }
        };
        if let Err(error) = fs::write(&self.path, raw) {
            tracing::warn!(path = %self.path.display(), %error, "state write failed; in-memory copy stays current");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
