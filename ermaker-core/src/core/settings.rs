//! Application settings for ERMaker.
//!
//! Stores where snapshots live, how new project files are named and seeded,
//! and how often the local server is polled, in a JSON file at an
//! OS-appropriate location.

use crate::{ErMakerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Namespaced key the application snapshot is stored under.
pub const DEFAULT_STORAGE_KEY: &str = "sql-ide-storage";

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Key the snapshot record is stored under inside `storage_file`.
    pub storage_key: String,
    /// JSON key/value file that holds snapshot records.
    pub storage_file: PathBuf,
    /// Directory new numbered project folders are allocated in.
    pub projects_directory: PathBuf,
    /// Extension appended to new file names, without the leading dot.
    pub file_extension: String,
    /// Content written to a freshly created project file.
    pub new_file_template: String,
    /// Interval between local server status polls, in milliseconds.
    pub status_poll_interval_ms: u64,
    /// Interval between log polls while a server operation is running, in milliseconds.
    pub log_poll_interval_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_file: default_config_directory().join("storage.json"),
            projects_directory: default_projects_directory(),
            file_extension: "sql".to_string(),
            new_file_template: "-- New SQL query\n".to_string(),
            status_poll_interval_ms: 5_000,
            log_poll_interval_ms: 1_000,
        }
    }
}

impl AppSettings {
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms)
    }
}

/// Returns the directory ERMaker keeps its own files in.
///
/// - macOS / Linux: `~/.config/ermaker`
/// - Windows: `%APPDATA%/ERMaker`
pub fn default_config_directory() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("ERMaker")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("ermaker")
    }
}

/// Returns the path to the settings JSON file.
pub fn settings_file_path() -> PathBuf {
    default_config_directory().join("settings.json")
}

/// Returns the default projects directory: `~/Documents/ERMaker`.
pub fn default_projects_directory() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ERMaker")
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable settings at {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Loads settings from the default location.
pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_file_path())
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ErMakerError::gateway("create settings directory", parent.display().to_string(), e))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)
        .map_err(|e| ErMakerError::gateway("write settings", path.display().to_string(), e))?;
    Ok(())
}

/// Saves settings to the default location.
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(&settings_file_path(), settings)
}
