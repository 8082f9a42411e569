//! In-memory [`FileSystemGateway`] used by unit tests.

use crate::core::gateway::project_folder_name;
use crate::{ErMakerError, FileEntry, FileSystemGateway, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MemEntry {
    Dir,
    File(String),
}

/// Path-keyed fake filesystem. Operations named in `fail_ops` return a
/// gateway error without touching the entries.
#[derive(Debug, Default)]
pub(crate) struct MemoryFileSystem {
    entries: Mutex<BTreeMap<PathBuf, MemEntry>>,
    fail_ops: Mutex<HashSet<&'static str>>,
    projects_directory: PathBuf,
}

impl MemoryFileSystem {
    pub(crate) fn new(projects_directory: impl Into<PathBuf>) -> Self {
        Self {
            projects_directory: projects_directory.into(),
            ..Self::default()
        }
    }

    /// Makes every subsequent call of `op` fail until [`Self::heal`] is called.
    pub(crate) fn fail(&self, op: &'static str) {
        self.fail_ops.lock().unwrap().insert(op);
    }

    pub(crate) fn heal(&self) {
        self.fail_ops.lock().unwrap().clear();
    }

    pub(crate) fn entry(&self, path: &Path) -> Option<MemEntry> {
        self.entries.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn file_content(&self, path: &Path) -> Option<String> {
        match self.entry(path) {
            Some(MemEntry::File(content)) => Some(content),
            _ => None,
        }
    }

    pub(crate) fn exists(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    fn check(&self, op: &'static str, path: &Path) -> Result<()> {
        if self.fail_ops.lock().unwrap().contains(op) {
            return Err(ErMakerError::gateway(op, path.display().to_string(), "injected failure"));
        }
        Ok(())
    }

    fn insert_dir_all(entries: &mut BTreeMap<PathBuf, MemEntry>, path: &Path) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            entries.entry(ancestor.to_path_buf()).or_insert(MemEntry::Dir);
        }
    }
}

#[async_trait]
impl FileSystemGateway for MemoryFileSystem {
    async fn create_directory(&self, path: &Path) -> Result<()> {
        self.check("create directory", path)?;
        let mut entries = self.entries.lock().unwrap();
        if let Some(MemEntry::File(_)) = entries.get(path) {
            return Err(ErMakerError::gateway("create directory", path.display().to_string(), "is a file"));
        }
        Self::insert_dir_all(&mut entries, path);
        Ok(())
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        self.check("save file", path)?;
        let mut entries = self.entries.lock().unwrap();
        let parent_ok = path
            .parent()
            .map_or(true, |p| matches!(entries.get(p), Some(MemEntry::Dir)));
        if !parent_ok {
            return Err(ErMakerError::gateway("save file", path.display().to_string(), "parent directory missing"));
        }
        entries.insert(path.to_path_buf(), MemEntry::File(content.to_string()));
        Ok(())
    }

    async fn delete_path(&self, path: &Path) -> Result<()> {
        self.check("delete", path)?;
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(path) {
            return Err(ErMakerError::gateway("delete", path.display().to_string(), "not found"));
        }
        entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn rename_path(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        self.check("rename", old_path)?;
        let mut entries = self.entries.lock().unwrap();
        if !entries.contains_key(old_path) {
            return Err(ErMakerError::gateway("rename", old_path.display().to_string(), "not found"));
        }
        if entries.contains_key(new_path) {
            return Err(ErMakerError::gateway("rename", old_path.display().to_string(), "target exists"));
        }
        let moved: Vec<(PathBuf, MemEntry)> = entries
            .iter()
            .filter(|(p, _)| p.starts_with(old_path))
            .map(|(p, e)| (p.clone(), e.clone()))
            .collect();
        for (path, entry) in moved {
            entries.remove(&path);
            let suffix = path.strip_prefix(old_path).unwrap_or(Path::new(""));
            let target = if suffix.as_os_str().is_empty() {
                new_path.to_path_buf()
            } else {
                new_path.join(suffix)
            };
            entries.insert(target, entry);
        }
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        self.check("read file", path)?;
        self.file_content(path)
            .ok_or_else(|| ErMakerError::gateway("read file", path.display().to_string(), "not found"))
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<FileEntry>> {
        self.check("read directory", path)?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, e)| FileEntry {
                name: p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
                path: p.clone(),
                is_directory: *e == MemEntry::Dir,
            })
            .collect())
    }

    async fn path_exists(&self, path: &Path) -> bool {
        self.exists(path)
    }

    async fn default_project_root(&self) -> Result<PathBuf> {
        Ok(self.projects_directory.clone())
    }

    async fn allocate_project_folder(&self, base_path: &Path) -> Result<PathBuf> {
        self.create_directory(base_path).await?;
        for n in 1..=crate::core::gateway::MAX_PROJECT_FOLDERS {
            let candidate = base_path.join(project_folder_name(n));
            if !self.exists(&candidate) {
                self.create_directory(&candidate).await?;
                return Ok(candidate);
            }
        }
        Err(ErMakerError::gateway("allocate project folder", base_path.display().to_string(), "Too many projects"))
    }
}
