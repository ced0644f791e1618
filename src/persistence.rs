//! Snapshot persistence across restarts
//!
//! The daemon writes one JSON snapshot when it is asked to terminate and reads
//! it back on the next start. Neither direction is allowed to stop the
//! process: a missing or corrupt snapshot means a cold start, and a failed
//! write is only logged by the caller.

use crate::alerts::AlertState;
use crate::error::PersistenceError;
use crate::readings::Reading;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Persisted state of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub alert: AlertState,
    /// History slots, oldest first; empty slots are `null`
    pub history: Vec<Option<Reading>>,
}

/// Persisted state of all units, keyed by unit id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub units: BTreeMap<String, UnitSnapshot>,
}

/// Reads and writes the snapshot file
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    path: PathBuf,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no snapshot exists yet
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Read` if the file exists but cannot be read
    /// or parsed.
    pub fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.read_error(e)),
        };

        let snapshot = serde_json::from_str(&content).map_err(|e| self.read_error(e))?;
        info!("Loaded snapshot from {}", self.path.display());
        Ok(Some(snapshot))
    }

    /// Write the snapshot, creating the parent directory if needed
    ///
    /// The snapshot is written to a temporary sibling file first and renamed
    /// over the old one, so readers never see a partial file.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Write` if any filesystem step fails.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| self.write_error(e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| self.write_error(e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.write_error(e))?;

        info!("Saved snapshot to {}", self.path.display());
        Ok(())
    }

    fn read_error(&self, reason: impl ToString) -> PersistenceError {
        PersistenceError::Read {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
