//! Arena-backed workspace tree.
//!
//! Nodes live in a flat map keyed by ID. Each node records its parent ID and,
//! for folders, the ordered list of child IDs; the root level is a separate
//! ordered list. Lookup is O(1) and ancestor walks are O(depth), so no
//! operation has to re-scan sibling subtrees.

use crate::{
    DeleteResult, ErMakerError, NewNode, NodeBody, NodeKind, NodeUpdate, ProjectFile, Result,
    WorkspaceNode,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// The in-memory hierarchy of project files and folders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceTree {
    nodes: HashMap<String, WorkspaceNode>,
    roots: Vec<String>,
}

impl WorkspaceTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` names a node at any depth.
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// IDs of the root-level nodes in display order.
    pub fn root_ids(&self) -> &[String] {
        &self.roots
    }

    /// Looks up a node by ID anywhere in the tree.
    pub fn find_by_id(&self, id: &str) -> Option<&WorkspaceNode> {
        self.nodes.get(id)
    }

    /// Like [`Self::find_by_id`] but reports a missing ID as
    /// [`ErMakerError::NodeNotFound`].
    pub fn get(&self, id: &str) -> Result<&WorkspaceNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| ErMakerError::NodeNotFound(id.to_string()))
    }

    /// Returns the ordered child list of `parent`, or the root list for `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::InvalidParent`] if `parent` is absent or is a file.
    fn sibling_ids(&self, parent: Option<&str>) -> Result<&[String]> {
        let Some(pid) = parent else {
            return Ok(&self.roots);
        };
        let node = self
            .nodes
            .get(pid)
            .ok_or_else(|| ErMakerError::InvalidParent(format!("'{pid}' does not exist")))?;
        match &node.body {
            NodeBody::Folder { children } => Ok(children),
            NodeBody::File { .. } => Err(ErMakerError::InvalidParent(format!(
                "'{}' is a file",
                node.name
            ))),
        }
    }

    /// Returns the ordered children of `parent`, or the root-level nodes for `None`.
    pub fn children(&self, parent: Option<&str>) -> Result<Vec<&WorkspaceNode>> {
        Ok(self
            .sibling_ids(parent)?
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect())
    }

    /// Finds the child of `parent` (or root-level node) called `name`.
    pub fn find_child_by_name(&self, parent: Option<&str>, name: &str) -> Option<&WorkspaceNode> {
        self.sibling_ids(parent)
            .ok()?
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|node| node.name == name)
    }

    /// Checks that a node called `name` could be inserted under `parent`
    /// without touching the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::InvalidParent`] if `parent` is not a folder, or
    /// [`ErMakerError::NameExists`] if a sibling already uses `name`.
    pub fn check_insert(&self, parent: Option<&str>, name: &str) -> Result<()> {
        self.sibling_ids(parent)?;
        if self.find_child_by_name(parent, name).is_some() {
            return Err(ErMakerError::NameExists(name.to_string()));
        }
        Ok(())
    }

    /// Creates a node and appends it to `parent`'s children (or the root list).
    ///
    /// Returns the ID of the new node.
    ///
    /// # Errors
    ///
    /// See [`Self::check_insert`].
    pub fn insert(&mut self, parent: Option<&str>, new_node: NewNode) -> Result<String> {
        self.check_insert(parent, &new_node.name)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let body = match new_node.kind {
            NodeKind::File => NodeBody::File {
                content: new_node.content.unwrap_or_default(),
            },
            NodeKind::Folder => NodeBody::Folder {
                children: Vec::new(),
            },
        };
        self.nodes.insert(
            id.clone(),
            WorkspaceNode {
                id: id.clone(),
                name: new_node.name,
                parent_id: parent.map(str::to_string),
                body,
                created_at: now,
                updated_at: now,
            },
        );
        self.attach(parent, id.clone());
        Ok(id)
    }

    /// Merges `update` into the node and refreshes its `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::NodeNotFound`] for an unknown ID,
    /// [`ErMakerError::NameExists`] if a rename collides with a sibling, or
    /// [`ErMakerError::ValidationFailed`] when setting content on a folder.
    pub fn update(&mut self, id: &str, update: NodeUpdate) -> Result<()> {
        let (parent, is_folder) = {
            let node = self.get(id)?;
            (node.parent_id.clone(), node.is_folder())
        };
        if update.content.is_some() && is_folder {
            return Err(ErMakerError::ValidationFailed(
                "Folders have no content".to_string(),
            ));
        }
        if let Some(name) = &update.name {
            if let Some(existing) = self.find_child_by_name(parent.as_deref(), name) {
                if existing.id != id {
                    return Err(ErMakerError::NameExists(name.clone()));
                }
            }
        }

        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| ErMakerError::NodeNotFound(id.to_string()))?;
        if let Some(name) = update.name {
            node.name = name;
        }
        if let (Some(new_content), NodeBody::File { content }) = (update.content, &mut node.body) {
            *content = new_content;
        }
        node.updated_at = Utc::now();
        Ok(())
    }

    /// Removes `id` and its entire subtree.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::NodeNotFound`] for an unknown ID.
    pub fn delete(&mut self, id: &str) -> Result<DeleteResult> {
        let parent = self.get(id)?.parent_id.clone();
        let affected_ids = self.subtree_ids(id);

        self.detach(parent.as_deref(), id);
        for removed in &affected_ids {
            self.nodes.remove(removed);
        }

        Ok(DeleteResult {
            deleted_count: affected_ids.len(),
            affected_ids,
        })
    }

    /// Checks that `id` could be moved under `new_parent` without touching the tree.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::InvalidMove`] if `new_parent` is `id` itself or
    /// one of its descendants, [`ErMakerError::InvalidParent`] if
    /// `new_parent` is not a folder, or [`ErMakerError::NameExists`] if the
    /// target already has a child with the same name.
    pub fn check_move(&self, id: &str, new_parent: Option<&str>) -> Result<()> {
        let node = self.get(id)?;

        if new_parent == Some(id) {
            return Err(ErMakerError::InvalidMove(
                "A folder cannot be moved into itself".to_string(),
            ));
        }
        if let Some(target) = new_parent {
            if self.is_ancestor(id, target) {
                return Err(ErMakerError::InvalidMove(
                    "Move would create a cycle".to_string(),
                ));
            }
        }
        self.sibling_ids(new_parent)?;

        if node.parent_id.as_deref() == new_parent {
            return Ok(());
        }
        if self.find_child_by_name(new_parent, &node.name).is_some() {
            return Err(ErMakerError::NameExists(node.name.clone()));
        }
        Ok(())
    }

    /// Detaches the subtree rooted at `id` and appends it to `new_parent`.
    ///
    /// Moving a node to the parent it already has is a no-op.
    ///
    /// # Errors
    ///
    /// See [`Self::check_move`]. On error the tree is unchanged.
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> Result<()> {
        self.check_move(id, new_parent)?;

        let old_parent = self.get(id)?.parent_id.clone();
        if old_parent.as_deref() == new_parent {
            return Ok(());
        }

        self.detach(old_parent.as_deref(), id);
        self.attach(new_parent, id.to_string());
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent_id = new_parent.map(str::to_string);
            node.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Returns the chain of nodes from the root level down to `id` inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::NodeNotFound`] if `id` or any recorded ancestor
    /// is missing.
    pub fn ancestry(&self, id: &str) -> Result<Vec<&WorkspaceNode>> {
        let mut chain = Vec::new();
        let mut current = Some(id.to_string());
        while let Some(cur) = current {
            if chain.len() > self.nodes.len() {
                return Err(ErMakerError::InvalidMove(format!(
                    "Ancestor chain of '{id}' does not terminate"
                )));
            }
            let node = self.get(&cur)?;
            current = node.parent_id.clone();
            chain.push(node);
        }
        chain.reverse();
        Ok(chain)
    }

    /// IDs of every node strictly below `id`, in depth-first display order.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let mut ids = self.subtree_ids(id);
        if !ids.is_empty() {
            ids.remove(0);
        }
        ids
    }

    /// Returns `true` if `ancestor` appears on the parent chain of `node`.
    pub fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent_id.as_deref());
        let mut steps = 0;
        while let Some(pid) = current {
            if pid == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            current = self.nodes.get(pid).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.child_ids().iter().rev().cloned());
                ids.push(current);
            }
        }
        ids
    }

    fn attach(&mut self, parent: Option<&str>, id: String) {
        let siblings = match parent {
            None => Some(&mut self.roots),
            Some(pid) => match self.nodes.get_mut(pid).map(|n| &mut n.body) {
                Some(NodeBody::Folder { children }) => Some(children),
                _ => None,
            },
        };
        if let Some(siblings) = siblings {
            siblings.push(id);
        }
    }

    fn detach(&mut self, parent: Option<&str>, id: &str) {
        let siblings = match parent {
            None => Some(&mut self.roots),
            Some(pid) => match self.nodes.get_mut(pid).map(|n| &mut n.body) {
                Some(NodeBody::Folder { children }) => Some(children),
                _ => None,
            },
        };
        if let Some(siblings) = siblings {
            siblings.retain(|child| child != id);
        }
    }

    /// Converts the arena into the nested record form used by snapshots.
    pub fn to_records(&self) -> Vec<ProjectFile> {
        self.roots
            .iter()
            .filter_map(|id| self.record_for(id))
            .collect()
    }

    fn record_for(&self, id: &str) -> Option<ProjectFile> {
        let node = self.nodes.get(id)?;
        let (content, children) = match &node.body {
            NodeBody::File { content } => (Some(content.clone()), None),
            NodeBody::Folder { children } => (
                None,
                Some(
                    children
                        .iter()
                        .filter_map(|child| self.record_for(child))
                        .collect(),
                ),
            ),
        };
        Some(ProjectFile {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind(),
            content,
            children,
            parent_id: node.parent_id.clone(),
            created_at: node.created_at,
            updated_at: node.updated_at,
        })
    }

    /// Rebuilds a tree from nested snapshot records.
    ///
    /// Parent links are taken from the nesting, not from the stored
    /// `parentId` fields.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::ValidationFailed`] if an ID repeats, a file
    /// carries children, or a folder carries content.
    pub fn from_records(records: &[ProjectFile]) -> Result<Self> {
        let mut tree = Self::new();
        let mut seen = HashSet::new();
        for record in records {
            let id = tree.load_record(record, None, &mut seen)?;
            tree.roots.push(id);
        }
        Ok(tree)
    }

    fn load_record(
        &mut self,
        record: &ProjectFile,
        parent: Option<&str>,
        seen: &mut HashSet<String>,
    ) -> Result<String> {
        if !seen.insert(record.id.clone()) {
            return Err(ErMakerError::ValidationFailed(format!(
                "Duplicate node id '{}'",
                record.id
            )));
        }
        if record.parent_id.as_deref() != parent {
            log::warn!(
                "Node '{}' records parent {:?} but is nested under {:?}; using the nesting",
                record.id,
                record.parent_id,
                parent
            );
        }

        let body = match record.kind {
            NodeKind::File => {
                if record.children.as_ref().is_some_and(|c| !c.is_empty()) {
                    return Err(ErMakerError::ValidationFailed(format!(
                        "File '{}' has children",
                        record.name
                    )));
                }
                NodeBody::File {
                    content: record.content.clone().unwrap_or_default(),
                }
            }
            NodeKind::Folder => {
                if record.content.is_some() {
                    return Err(ErMakerError::ValidationFailed(format!(
                        "Folder '{}' has content",
                        record.name
                    )));
                }
                let mut children = Vec::new();
                for child in record.children.iter().flatten() {
                    children.push(self.load_record(child, Some(&record.id), seen)?);
                }
                NodeBody::Folder { children }
            }
        };

        self.nodes.insert(
            record.id.clone(),
            WorkspaceNode {
                id: record.id.clone(),
                name: record.name.clone(),
                parent_id: parent.map(str::to_string),
                body,
                created_at: record.created_at,
                updated_at: record.updated_at,
            },
        );
        Ok(record.id.clone())
    }
}
