//! Filesystem gateway: the asynchronous boundary through which the core
//! touches real files and directories.
//!
//! The core never calls `std::fs` for project files directly. Every
//! create/rename/delete/write goes through [`FileSystemGateway`], and the
//! matching in-memory tree mutation is only applied after the gateway call
//! has succeeded.

use crate::{ErMakerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Upper bound on `ProjectN` folder numbers tried when allocating a new project.
pub const MAX_PROJECT_FOLDERS: u32 = 1000;

/// One entry returned by [`FileSystemGateway::list_directory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
}

/// Fallible asynchronous filesystem primitives consumed by the core.
#[async_trait]
pub trait FileSystemGateway: Send + Sync {
    /// Creates `path` and any missing parents.
    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Writes `content` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Removes a file, or a directory together with everything below it.
    async fn delete_path(&self, path: &Path) -> Result<()>;

    /// Renames or moves a file or directory. Fails if `new_path` exists,
    /// unless it differs from `old_path` only in letter case.
    async fn rename_path(&self, old_path: &Path, new_path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Entries directly inside `path`, sorted by name.
    async fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>>;

    async fn path_exists(&self, path: &Path) -> bool;

    /// Directory new projects are created in.
    async fn default_project_root(&self) -> Result<PathBuf>;

    /// Creates and returns the first free `ProjectN` folder under `base_path`.
    async fn allocate_project_folder(&self, base_path: &Path) -> Result<PathBuf>;
}

/// Name of the `n`th sequentially allocated project folder.
pub fn project_folder_name(n: u32) -> String {
    format!("Project{n}")
}

/// [`FileSystemGateway`] backed by the local disk through `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    projects_directory: PathBuf,
}

impl LocalFileSystem {
    pub fn new(projects_directory: impl Into<PathBuf>) -> Self {
        Self {
            projects_directory: projects_directory.into(),
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// `q1.sql` to `Q1.sql`: on a case-insensitive filesystem the target already
/// "exists" because it is the source itself.
fn is_case_only_rename(old_path: &Path, new_path: &Path) -> bool {
    old_path != new_path
        && old_path.parent() == new_path.parent()
        && old_path.to_string_lossy().to_lowercase() == new_path.to_string_lossy().to_lowercase()
}

#[async_trait]
impl FileSystemGateway for LocalFileSystem {
    async fn create_directory(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| ErMakerError::gateway("create directory", display(path), e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| ErMakerError::gateway("save file", display(path), e))
    }

    async fn delete_path(&self, path: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ErMakerError::gateway("delete", display(path), e))?;
        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(|e| ErMakerError::gateway("delete", display(path), e))
    }

    async fn rename_path(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        if !is_case_only_rename(old_path, new_path)
            && tokio::fs::try_exists(new_path).await.unwrap_or(false)
        {
            return Err(ErMakerError::gateway(
                "rename",
                display(old_path),
                format!("{} already exists", new_path.display()),
            ));
        }
        tokio::fs::rename(old_path, new_path)
            .await
            .map_err(|e| ErMakerError::gateway("rename", display(old_path), e))
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ErMakerError::gateway("read file", display(path), e))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>> {
        let mut read_dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| ErMakerError::gateway("read directory", display(path), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ErMakerError::gateway("read directory", display(path), e))?
        {
            let is_directory = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_directory,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn default_project_root(&self) -> Result<PathBuf> {
        Ok(self.projects_directory.clone())
    }

    async fn allocate_project_folder(&self, base_path: &Path) -> Result<PathBuf> {
        self.create_directory(base_path).await?;

        for n in 1..=MAX_PROJECT_FOLDERS {
            let candidate = base_path.join(project_folder_name(n));
            if !self.path_exists(&candidate).await {
                self.create_directory(&candidate).await?;
                log::info!("Allocated project folder {}", candidate.display());
                return Ok(candidate);
            }
        }
        Err(ErMakerError::gateway(
            "allocate project folder",
            display(base_path),
            "Too many projects",
        ))
    }
}
