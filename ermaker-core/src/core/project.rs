//! The open project: a [`WorkspaceTree`] mirrored onto a directory on disk.
//!
//! Every structural change is a pair of a gateway call and a tree mutation.
//! The pair is ordered disk-first: all structural checks run against the
//! tree up front, then the gateway call is made, and the tree is only
//! touched once it has succeeded. A failed gateway call therefore leaves
//! the tree exactly as it was.

use crate::core::path::validate_name;
use crate::{
    DeleteResult, ErMakerError, FileSystemGateway, NewNode, NodeKind, NodeUpdate, PathResolver,
    ProjectFile, Result, WorkspaceTree,
};
use std::path::{Path, PathBuf};

/// Display name used until a project folder has been chosen.
pub const DEFAULT_PROJECT_NAME: &str = "Project";

/// An open project: its tree, root directory and display name.
#[derive(Debug, Clone)]
pub struct Project {
    tree: WorkspaceTree,
    root: Option<PathBuf>,
    name: String,
    extension: String,
    new_file_template: String,
}

impl Project {
    pub fn new(extension: impl Into<String>, new_file_template: impl Into<String>) -> Self {
        Self {
            tree: WorkspaceTree::new(),
            root: None,
            name: DEFAULT_PROJECT_NAME.to_string(),
            extension: extension.into(),
            new_file_template: new_file_template.into(),
        }
    }

    /// Replaces the tree wholesale, e.g. when restoring a snapshot.
    pub fn with_tree(mut self, tree: WorkspaceTree) -> Self {
        self.tree = tree;
        self
    }

    pub fn tree(&self) -> &WorkspaceTree {
        &self.tree
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = Some(root.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns a resolver bound to the project root.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::ValidationFailed`] if no project folder is set.
    pub fn resolver(&self) -> Result<PathResolver<'_>> {
        let root = self
            .root
            .as_deref()
            .ok_or_else(|| ErMakerError::ValidationFailed("No project folder is open".to_string()))?;
        Ok(PathResolver::new(root, &self.extension))
    }

    /// Absolute disk path of node `id`.
    pub fn resolve_path(&self, id: &str) -> Result<PathBuf> {
        self.resolver()?.resolve_path(&self.tree, id)
    }

    pub fn to_records(&self) -> Vec<ProjectFile> {
        self.tree.to_records()
    }

    /// Points the project at a fresh `ProjectN` folder if it has no root yet.
    ///
    /// The display name becomes the folder's last path component.
    pub async fn initialize(&mut self, gateway: &dyn FileSystemGateway) -> Result<()> {
        if self.root.is_some() {
            return Ok(());
        }
        let base = gateway.default_project_root().await?;
        let root = gateway.allocate_project_folder(&base).await?;
        self.name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        log::info!("Project '{}' initialised at {}", self.name, root.display());
        self.root = Some(root);
        Ok(())
    }

    /// Creates a file under `parent` on disk, seeded with the new-file
    /// template, then adds it to the tree. The extension is appended first.
    ///
    /// Returns the new node's ID.
    pub async fn create_file(
        &mut self,
        gateway: &dyn FileSystemGateway,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let resolver = self.resolver()?;
        let name = resolver.normalize_file_name(&validate_name(name)?);
        self.tree.check_insert(parent, &name)?;

        let parent_path = resolver.parent_path(&self.tree, parent)?;
        let path = parent_path.join(&name);
        gateway.create_directory(&parent_path).await?;
        gateway.write_file(&path, &self.new_file_template).await?;

        let content = self.new_file_template.clone();
        self.commit_insert(gateway, parent, NewNode::file(name, content), &path)
            .await
    }

    /// Creates a folder under `parent` on disk, then adds it to the tree.
    pub async fn create_folder(
        &mut self,
        gateway: &dyn FileSystemGateway,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let resolver = self.resolver()?;
        let name = validate_name(name)?;
        self.tree.check_insert(parent, &name)?;

        let path = resolver.child_path(&self.tree, parent, &name)?;
        gateway.create_directory(&path).await?;

        self.commit_insert(gateway, parent, NewNode::folder(name), &path)
            .await
    }

    async fn commit_insert(
        &mut self,
        gateway: &dyn FileSystemGateway,
        parent: Option<&str>,
        node: NewNode,
        path: &Path,
    ) -> Result<String> {
        match self.tree.insert(parent, node) {
            Ok(id) => Ok(id),
            Err(e) => {
                log::warn!("Tree insert failed after creating {}; removing it: {e}", path.display());
                if let Err(cleanup) = gateway.delete_path(path).await {
                    log::error!("Could not remove {}: {cleanup}", path.display());
                }
                Err(e)
            }
        }
    }

    /// Renames node `id` on disk, then in the tree. Files keep the
    /// registered extension.
    ///
    /// Returns the node's new path.
    pub async fn rename(
        &mut self,
        gateway: &dyn FileSystemGateway,
        id: &str,
        new_name: &str,
    ) -> Result<PathBuf> {
        let resolver = self.resolver()?;
        let node = self.tree.get(id)?;
        let new_name = match node.kind() {
            NodeKind::File => resolver.normalize_file_name(&validate_name(new_name)?),
            NodeKind::Folder => validate_name(new_name)?,
        };
        let old_path = resolver.resolve_path(&self.tree, id)?;
        if node.name == new_name {
            return Ok(old_path);
        }
        if self
            .tree
            .find_child_by_name(node.parent_id.as_deref(), &new_name)
            .is_some()
        {
            return Err(ErMakerError::NameExists(new_name));
        }

        let new_path = old_path.with_file_name(&new_name);
        gateway.rename_path(&old_path, &new_path).await?;
        self.tree.update(id, NodeUpdate::rename(new_name))?;
        Ok(new_path)
    }

    /// Moves node `id` under `new_parent` on disk, then in the tree.
    ///
    /// Cycle, parent-kind and name-collision checks run before the disk is
    /// touched. Returns the node's new path.
    pub async fn move_node(
        &mut self,
        gateway: &dyn FileSystemGateway,
        id: &str,
        new_parent: Option<&str>,
    ) -> Result<PathBuf> {
        self.tree.check_move(id, new_parent)?;

        let resolver = self.resolver()?;
        let node = self.tree.get(id)?;
        let old_path = resolver.resolve_path(&self.tree, id)?;
        if node.parent_id.as_deref() == new_parent {
            return Ok(old_path);
        }
        let new_path = resolver.child_path(&self.tree, new_parent, &node.name)?;

        gateway.rename_path(&old_path, &new_path).await?;
        self.tree.move_node(id, new_parent)?;
        Ok(new_path)
    }

    /// Deletes node `id` and its subtree from disk, then from the tree.
    pub async fn delete(&mut self, gateway: &dyn FileSystemGateway, id: &str) -> Result<DeleteResult> {
        let path = self.resolve_path(id)?;
        gateway.delete_path(&path).await?;
        self.tree.delete(id)
    }

    /// Writes `content` to file node `id` and stores it on the node.
    ///
    /// Returns the path written.
    pub async fn write_content(
        &mut self,
        gateway: &dyn FileSystemGateway,
        id: &str,
        content: &str,
    ) -> Result<PathBuf> {
        if !self.tree.get(id)?.is_file() {
            return Err(ErMakerError::ValidationFailed(
                "Folders have no content".to_string(),
            ));
        }
        let path = self.resolve_path(id)?;
        if let Some(parent) = path.parent() {
            gateway.create_directory(parent).await?;
        }
        gateway.write_file(&path, content).await?;
        self.tree.update(id, NodeUpdate::content(content))?;
        Ok(path)
    }
}
