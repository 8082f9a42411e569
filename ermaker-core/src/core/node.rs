//! Workspace node types: the in-memory entry for a project file or folder and
//! the nested record form it takes inside a persisted snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a node is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// Kind-specific payload of a node.
///
/// Files carry content and folders carry an ordered child list; no node
/// carries both.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    File { content: String },
    Folder { children: Vec<String> },
}

/// A single file or folder in the workspace tree.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceNode {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub body: NodeBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkspaceNode {
    pub fn kind(&self) -> NodeKind {
        match self.body {
            NodeBody::File { .. } => NodeKind::File,
            NodeBody::Folder { .. } => NodeKind::Folder,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind() == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == NodeKind::Folder
    }

    /// File content, or `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            NodeBody::File { content } => Some(content),
            NodeBody::Folder { .. } => None,
        }
    }

    /// Ordered child IDs; empty for files.
    pub fn child_ids(&self) -> &[String] {
        match &self.body {
            NodeBody::Folder { children } => children,
            NodeBody::File { .. } => &[],
        }
    }
}

/// Describes a node to be inserted into the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub name: String,
    pub kind: NodeKind,
    /// Initial content for files. Ignored for folders.
    pub content: Option<String>,
}

impl NewNode {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            content: None,
        }
    }
}

/// Partial update merged into an existing node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub content: Option<String>,
}

impl NodeUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            content: None,
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content: Some(content.into()),
        }
    }
}

/// Nested, serializable form of a node as stored in the `projectFiles`
/// array of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ProjectFile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_node_accessors() {
        let now = Utc::now();
        let node = WorkspaceNode {
            id: "n1".to_string(),
            name: "q1.sql".to_string(),
            parent_id: None,
            body: NodeBody::File {
                content: "SELECT 1;".to_string(),
            },
            created_at: now,
            updated_at: now,
        };

        assert!(node.is_file());
        assert_eq!(node.content(), Some("SELECT 1;"));
        assert!(node.child_ids().is_empty());
    }

    #[test]
    fn test_project_file_serializes_type_tag() {
        let now = Utc::now();
        let record = ProjectFile {
            id: "f".to_string(),
            name: "queries".to_string(),
            kind: NodeKind::Folder,
            content: None,
            children: Some(vec![]),
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "folder");
        assert!(json.get("content").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
