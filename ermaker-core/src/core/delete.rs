//! Result type for node removal.
//!
//! Deleting a node always removes its whole subtree. [`DeleteResult`] reports
//! every removed ID so that callers can close editor tabs bound to them.
//!
//! ```rust
//! use ermaker_core::DeleteResult;
//!
//! let result = DeleteResult {
//!     deleted_count: 2,
//!     affected_ids: vec!["folder".to_string(), "file".to_string()],
//! };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("deletedCount"));
//! assert!(json.contains("affectedIds"));
//! ```

use serde::{Deserialize, Serialize};

/// The outcome of deleting a node from the workspace tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// The total number of nodes that were removed.
    pub deleted_count: usize,

    /// IDs of every removed node, the deleted root first.
    pub affected_ids: Vec<String>,
}
