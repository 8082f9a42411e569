//! Snapshot of the state that survives a restart: connection profiles, the
//! project tree, and the project folder and name.
//!
//! Snapshots live in a small JSON key/value file. Each key holds an
//! envelope `{"state": {...}, "version": N}`; other keys in the file are
//! left alone.

use crate::{AppSettings, ConnectionProfile, ErMakerError, ProjectFile, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Envelope version written by this build.
pub const SNAPSHOT_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub connections: Vec<ConnectionProfile>,
    pub project_files: Vec<ProjectFile>,
    pub project_path: Option<PathBuf>,
    pub project_name: String,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            project_files: Vec::new(),
            project_path: None,
            project_name: crate::core::project::DEFAULT_PROJECT_NAME.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    state: Snapshot,
    #[serde(default)]
    version: u32,
}

/// Reads and writes one [`Snapshot`] under a namespaced key.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    key: String,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(&settings.storage_file, &settings.storage_key)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn read_records(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Reads the snapshot, surfacing parse errors. `Ok(None)` means nothing
    /// has been saved under this key yet.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let mut records = self.read_records()?;
        let Some(value) = records.remove(&self.key) else {
            return Ok(None);
        };
        let envelope: Envelope = serde_json::from_value(value)?;
        if envelope.version != SNAPSHOT_VERSION {
            log::info!(
                "Reading snapshot version {} with version {SNAPSHOT_VERSION} layout",
                envelope.version
            );
        }
        Ok(Some(envelope.state))
    }

    /// Reads the snapshot, falling back to [`Snapshot::default`] when it is
    /// missing or unreadable. Never fails.
    pub fn load_or_default(&self) -> Snapshot {
        match self.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::debug!("No snapshot under '{}', starting fresh", self.key);
                Snapshot::default()
            }
            Err(e) => {
                log::warn!("Ignoring unreadable snapshot in {}: {e}", self.path.display());
                Snapshot::default()
            }
        }
    }

    /// Writes the snapshot through a temporary file and a rename, keeping
    /// any other keys already in the file.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut records = self.read_records().unwrap_or_else(|e| {
            log::warn!("Overwriting unreadable storage file {}: {e}", self.path.display());
            Map::new()
        });
        let envelope = Envelope {
            state: snapshot.clone(),
            version: SNAPSHOT_VERSION,
        };
        records.insert(self.key.clone(), serde_json::to_value(envelope)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ErMakerError::gateway("create storage directory", parent.display().to_string(), e)
            })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&records)?)
            .map_err(|e| ErMakerError::gateway("write snapshot", tmp.display().to_string(), e))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ErMakerError::gateway("write snapshot", self.path.display().to_string(), e))?;
        Ok(())
    }
}
