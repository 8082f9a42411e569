//! Maps workspace nodes to absolute paths under the project root.
//!
//! Every create, rename, move, delete and save computes its disk path here,
//! so the in-memory tree and the directory on disk stay in the same shape.

use crate::{ErMakerError, Result, WorkspaceTree};
use std::path::{Path, PathBuf};

/// Resolves node paths against a project root and applies the file-name
/// extension policy.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    root: &'a Path,
    extension: &'a str,
}

impl<'a> PathResolver<'a> {
    /// `extension` is given without the leading dot (e.g. `"sql"`).
    pub fn new(root: &'a Path, extension: &'a str) -> Self {
        Self { root, extension }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    /// Appends the registered extension unless `name` already ends with it
    /// (compared case-insensitively).
    pub fn normalize_file_name(&self, name: &str) -> String {
        let suffix = format!(".{}", self.extension);
        let has_suffix = name.len() > suffix.len()
            && name
                .get(name.len() - suffix.len()..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(&suffix));
        if has_suffix || self.extension.is_empty() {
            name.to_string()
        } else {
            format!("{name}{suffix}")
        }
    }

    /// Walks the ancestor chain of `id` and joins the names onto the root.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::NodeNotFound`] if `id` is not in `tree`.
    pub fn resolve_path(&self, tree: &WorkspaceTree, id: &str) -> Result<PathBuf> {
        let mut path = self.root.to_path_buf();
        for node in tree.ancestry(id)? {
            path.push(&node.name);
        }
        Ok(path)
    }

    /// Directory that holds the children of `parent`, or the root for `None`.
    pub fn parent_path(&self, tree: &WorkspaceTree, parent: Option<&str>) -> Result<PathBuf> {
        match parent {
            Some(pid) => self.resolve_path(tree, pid),
            None => Ok(self.root.to_path_buf()),
        }
    }

    /// Path a child called `name` would have under `parent`.
    pub fn child_path(&self, tree: &WorkspaceTree, parent: Option<&str>, name: &str) -> Result<PathBuf> {
        Ok(self.parent_path(tree, parent)?.join(name))
    }
}

/// Trims `name` and rejects anything that cannot be a single path component.
///
/// # Errors
///
/// Returns [`ErMakerError::ValidationFailed`] for empty names, `.`/`..`, or
/// names containing a path separator.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ErMakerError::ValidationFailed("Name is required".to_string()));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(ErMakerError::ValidationFailed(format!("'{trimmed}' is not a valid name")));
    }
    if trimmed.contains(&['/', '\\'][..]) {
        return Err(ErMakerError::ValidationFailed(
            "Names cannot contain path separators".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewNode;

    #[test]
    fn test_normalize_appends_missing_extension() {
        let root = PathBuf::from("/projects/Project1");
        let resolver = PathResolver::new(&root, "sql");
        assert_eq!(resolver.normalize_file_name("q1"), "q1.sql");
        assert_eq!(resolver.normalize_file_name("q1.sql"), "q1.sql");
        assert_eq!(resolver.normalize_file_name("Q1.SQL"), "Q1.SQL");
        assert_eq!(resolver.normalize_file_name("notes.txt"), "notes.txt.sql");
        assert_eq!(resolver.normalize_file_name(".sql"), ".sql.sql");
    }

    #[test]
    fn test_resolve_nested_file_path() {
        let root = PathBuf::from("/root");
        let resolver = PathResolver::new(&root, "sql");
        let mut tree = WorkspaceTree::new();
        let a = tree.insert(None, NewNode::folder("A")).unwrap();
        let name = resolver.normalize_file_name("q1");
        let x = tree.insert(Some(&a), NewNode::file(name, "")).unwrap();

        assert_eq!(resolver.resolve_path(&tree, &a).unwrap(), PathBuf::from("/root/A"));
        assert_eq!(resolver.resolve_path(&tree, &x).unwrap(), PathBuf::from("/root/A/q1.sql"));
    }

    #[test]
    fn test_parent_path_of_root_level_is_project_root() {
        let root = PathBuf::from("/root");
        let resolver = PathResolver::new(&root, "sql");
        let tree = WorkspaceTree::new();
        assert_eq!(resolver.parent_path(&tree, None).unwrap(), root);
        assert_eq!(
            resolver.child_path(&tree, None, "top.sql").unwrap(),
            PathBuf::from("/root/top.sql")
        );
    }

    #[test]
    fn test_resolve_missing_node() {
        let root = PathBuf::from("/root");
        let resolver = PathResolver::new(&root, "sql");
        let result = resolver.resolve_path(&WorkspaceTree::new(), "ghost");
        assert!(matches!(result, Err(ErMakerError::NodeNotFound(_))));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  q1  ").unwrap(), "q1");
        assert!(validate_name("   ").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }
}
